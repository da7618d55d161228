// ABOUTME: Demo handler process: replies "hey there" to messages matching "hello".
// ABOUTME: Registers itself with the broker at startup, then serves dispatches until ctrl-c.

use std::net::SocketAddr;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use botfunc::ChatFunc;
use botrpc::{ChatMessage, Handler};

#[derive(Parser)]
#[command(name = "hellobot", about = "Friendly demo handler for the chatbot broker")]
struct Args {
    /// Address to serve the dispatch endpoint on
    #[arg(long, default_value = "0.0.0.0:8081")]
    listen: SocketAddr,

    /// Address the broker should dial to reach this handler
    #[arg(long, default_value = "127.0.0.1:8081")]
    advertise: String,

    /// Broker registration endpoint
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    broker: String,
}

struct HelloBot;

#[async_trait]
impl ChatFunc for HelloBot {
    async fn handle(&self, message: ChatMessage, replies: mpsc::Sender<ChatMessage>) {
        let reply = ChatMessage {
            body: "hey there".to_string(),
            user: message.user,
            channel: message.channel,
            handler_name: String::new(),
        };
        let _ = replies.send(reply).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let descriptor = Handler {
        name: "hello".to_string(),
        trigger: "hello".to_string(),
        address: args.advertise.clone(),
        usage: "say hello and hellobot says hey there".to_string(),
    };

    botfunc::run(args.listen, &args.broker, descriptor, HelloBot).await?;
    Ok(())
}
