// ABOUTME: Demo integration client: reads chat lines from stdin, dispatches via the broker.
// ABOUTME: Prints every streamed reply tagged with its channel.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use botrpc::messaging_client::MessagingClient;
use botrpc::ChatMessage;

#[derive(Parser)]
#[command(name = "console", about = "Console chat integration for the chatbot broker")]
struct Args {
    /// Broker dispatch endpoint
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    broker: String,

    /// User name attached to outgoing messages
    #[arg(short, long, default_value = "console")]
    user: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut client = MessagingClient::connect(args.broker.clone())
        .await
        .with_context(|| format!("connecting to broker at {}", args.broker))?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let message = ChatMessage {
            body: line,
            user: args.user.clone(),
            channel: "console".to_string(),
            handler_name: String::new(),
        };

        let mut replies = client.send_message(message).await?.into_inner();
        while let Some(reply) = replies.message().await? {
            println!("[{}] {}", reply.channel, reply.body);
        }
    }

    Ok(())
}
