// ABOUTME: Library for writing chatbot handler processes.
// ABOUTME: Registers a handler with the broker and serves its streaming dispatch endpoint.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use botrpc::messaging_server::{Messaging, MessagingServer};
use botrpc::registration_client::RegistrationClient;
use botrpc::registration_status::Code;
use botrpc::{ChatMessage, Handler};

/// Failures reaching or being refused by the broker.
#[derive(Debug, Error)]
pub enum FuncError {
    #[error("failed to reach broker: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("registration call failed: {0}")]
    Call(#[from] tonic::Status),

    #[error("registration rejected: {0}")]
    Rejected(String),
}

/// One chat capability. Receives a dispatched message and emits zero or
/// more replies into `replies`; dropping the sender signals end-of-stream.
#[async_trait]
pub trait ChatFunc: Send + Sync + 'static {
    async fn handle(&self, message: ChatMessage, replies: mpsc::Sender<ChatMessage>);
}

/// Register this handler with the broker's registration endpoint.
///
/// Call once at startup. `handler.address` is what the broker will dial, so
/// it must be reachable from the broker's host, not a loopback guess.
pub async fn register(broker_addr: &str, handler: Handler) -> Result<(), FuncError> {
    let name = handler.name.clone();
    let mut client = RegistrationClient::connect(broker_addr.to_string()).await?;
    let status = client.add(handler).await?.into_inner();

    match status.code() {
        Code::Accepted => {
            tracing::info!(handler = %name, broker = %broker_addr, "Registered with broker");
            Ok(())
        }
        _ => Err(FuncError::Rejected(status.detail)),
    }
}

/// tonic adapter exposing a [`ChatFunc`] as a `Messaging` server.
pub struct FuncService<F> {
    func: Arc<F>,
}

impl<F: ChatFunc> FuncService<F> {
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
        }
    }
}

#[tonic::async_trait]
impl<F: ChatFunc> Messaging for FuncService<F> {
    type SendMessageStream = Pin<Box<dyn Stream<Item = Result<ChatMessage, Status>> + Send>>;

    async fn send_message(
        &self,
        request: Request<ChatMessage>,
    ) -> Result<Response<Self::SendMessageStream>, Status> {
        let message = request.into_inner();
        tracing::debug!(
            handler = %message.handler_name,
            user = %message.user,
            channel = %message.channel,
            "Dispatched message received"
        );

        let (tx, rx) = mpsc::channel(16);
        let func = self.func.clone();
        tokio::spawn(async move {
            // The sender drops when handle returns, ending the reply stream.
            func.handle(message, tx).await;
        });

        let replies = ReceiverStream::new(rx).map(Ok);
        Ok(Response::new(Box::pin(replies)))
    }
}

/// Register with the broker, then serve the handler's dispatch endpoint
/// until ctrl-c.
pub async fn run<F: ChatFunc>(
    listen: SocketAddr,
    broker_addr: &str,
    handler: Handler,
    func: F,
) -> Result<(), FuncError> {
    register(broker_addr, handler).await?;

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
        let _ = tx.send(());
    });

    tracing::info!(listen = %listen, "Serving dispatch endpoint");
    Server::builder()
        .add_service(MessagingServer::new(FuncService::new(func)))
        .serve_with_shutdown(listen, async {
            rx.await.ok();
        })
        .await?;

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
