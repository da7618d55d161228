// ABOUTME: Shared fixtures for broker integration tests.
// ABOUTME: In-process tonic servers for the broker and scripted handler processes.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use botfunc::{ChatFunc, FuncService};
use botrpc::messaging_server::MessagingServer;
use botrpc::registration_server::RegistrationServer;
use botrpc::ChatMessage;
use chatbot::broker::{MessagingService, RegistrationService};
use chatbot::dispatch::{DispatchConfig, Dispatcher};
use chatbot::registry::Registry;

/// Serve a handler function on an ephemeral port, returning its address.
pub async fn spawn_handler<F: ChatFunc>(func: F) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        Server::builder()
            .add_service(MessagingServer::new(FuncService::new(func)))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    addr
}

/// Serve a full broker (both RPC surfaces) on an ephemeral port.
pub async fn spawn_broker(
    registry: Arc<Registry>,
    config: DispatchConfig,
    shutdown: CancellationToken,
) -> SocketAddr {
    let dispatcher = Arc::new(Dispatcher::new(registry.clone(), config, shutdown));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        Server::builder()
            .add_service(RegistrationServer::new(RegistrationService::new(registry)))
            .add_service(MessagingServer::new(MessagingService::new(dispatcher)))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    addr
}

/// An address with nothing listening on it.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn descriptor(name: &str, trigger: &str, address: SocketAddr) -> botrpc::Handler {
    botrpc::Handler {
        name: name.to_string(),
        trigger: trigger.to_string(),
        address: address.to_string(),
        usage: format!("test handler {name}"),
    }
}

pub fn chat(body: &str) -> ChatMessage {
    ChatMessage {
        body: body.to_string(),
        user: "u".to_string(),
        channel: "c".to_string(),
        handler_name: String::new(),
    }
}

/// Replies "hey there" once, copying user and channel.
pub struct HelloFunc;

#[async_trait]
impl ChatFunc for HelloFunc {
    async fn handle(&self, message: ChatMessage, replies: mpsc::Sender<ChatMessage>) {
        let _ = replies
            .send(ChatMessage {
                body: "hey there".to_string(),
                user: message.user,
                channel: message.channel,
                handler_name: String::new(),
            })
            .await;
    }
}

/// Replies with a fixed sequence of bodies, in order.
pub struct ScriptedFunc {
    pub bodies: Vec<String>,
}

impl ScriptedFunc {
    pub fn new(bodies: &[&str]) -> Self {
        Self {
            bodies: bodies.iter().map(|b| b.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ChatFunc for ScriptedFunc {
    async fn handle(&self, message: ChatMessage, replies: mpsc::Sender<ChatMessage>) {
        for body in &self.bodies {
            let reply = ChatMessage {
                body: body.clone(),
                user: message.user.clone(),
                channel: message.channel.clone(),
                handler_name: String::new(),
            };
            if replies.send(reply).await.is_err() {
                return;
            }
        }
    }
}

/// Echoes back the handler_name the broker tagged the message with.
pub struct EchoTagFunc;

#[async_trait]
impl ChatFunc for EchoTagFunc {
    async fn handle(&self, message: ChatMessage, replies: mpsc::Sender<ChatMessage>) {
        let _ = replies
            .send(ChatMessage {
                body: message.handler_name.clone(),
                user: message.user,
                channel: message.channel,
                handler_name: String::new(),
            })
            .await;
    }
}

/// Sends one reply, then wedges forever without closing its stream.
pub struct HangAfterOneFunc;

#[async_trait]
impl ChatFunc for HangAfterOneFunc {
    async fn handle(&self, message: ChatMessage, replies: mpsc::Sender<ChatMessage>) {
        let _ = replies
            .send(ChatMessage {
                body: "first".to_string(),
                user: message.user,
                channel: message.channel,
                handler_name: String::new(),
            })
            .await;
        std::future::pending::<()>().await;
    }
}

/// Never replies and never closes its stream.
pub struct HangSilentlyFunc;

#[async_trait]
impl ChatFunc for HangSilentlyFunc {
    async fn handle(&self, _message: ChatMessage, _replies: mpsc::Sender<ChatMessage>) {
        std::future::pending::<()>().await;
    }
}
