// ABOUTME: Fan-out/fan-in dispatcher routing one chat message to all trigger-matched handlers.
// ABOUTME: One branch task per matched handler; replies merge into the session's reply sink.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use botrpc::messaging_client::MessagingClient;
use botrpc::ChatMessage;

use crate::registry::{Entry, Registry};

/// Failure of a single dispatch branch. Contained: logged at the branch,
/// never propagated to sibling branches or the integration session.
#[derive(Debug, Error)]
enum BranchError {
    #[error("handler unreachable: {0}")]
    Unreachable(#[from] tonic::transport::Error),

    #[error("handler stream error: {0}")]
    Stream(#[from] tonic::Status),
}

/// Dispatcher tuning beyond the registry itself.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Optional upper bound on one handler branch. When unset, a wedged
    /// handler may stall its own branch indefinitely without being killed.
    pub handler_timeout: Option<Duration>,
}

/// Routes inbound messages to every trigger-matched handler concurrently.
pub struct Dispatcher {
    registry: Arc<Registry>,
    config: DispatchConfig,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, config: DispatchConfig, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            config,
            shutdown,
        }
    }

    /// Dispatch one inbound message, forwarding every streamed handler reply
    /// into `replies` as it arrives. No cross-branch buffering or reordering;
    /// replies from one handler keep that handler's send order.
    ///
    /// Returns the number of branches opened, only after every branch has
    /// reached end-of-stream, failed, or been abandoned by shutdown.
    pub async fn dispatch(&self, message: ChatMessage, replies: mpsc::Sender<ChatMessage>) -> usize {
        let matched: Vec<Arc<Entry>> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|entry| entry.matches(&message.body))
            .collect();

        if matched.is_empty() {
            tracing::debug!(
                user = %message.user,
                channel = %message.channel,
                "No handler matched message"
            );
            return 0;
        }

        let opened = matched.len();
        tracing::info!(
            matched = opened,
            channel = %message.channel,
            "Dispatching message to matched handlers"
        );

        let mut branches = JoinSet::new();
        for entry in matched {
            let mut tagged = message.clone();
            tagged.handler_name = entry.name.clone();
            branches.spawn(run_branch(
                entry,
                tagged,
                replies.clone(),
                self.config.handler_timeout,
                self.shutdown.clone(),
            ));
        }
        drop(replies);

        // Per-message work is complete only when every branch has finished.
        while branches.join_next().await.is_some() {}
        opened
    }
}

/// One dispatch branch: dial, send, forward the reply stream, log the outcome.
async fn run_branch(
    entry: Arc<Entry>,
    message: ChatMessage,
    replies: mpsc::Sender<ChatMessage>,
    timeout: Option<Duration>,
    shutdown: CancellationToken,
) {
    let outcome = match timeout {
        Some(limit) => {
            match tokio::time::timeout(limit, stream_replies(&entry, message, &replies, &shutdown))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(handler = %entry.name, ?limit, "Handler branch timed out");
                    return;
                }
            }
        }
        None => stream_replies(&entry, message, &replies, &shutdown).await,
    };

    match outcome {
        Ok(forwarded) => {
            tracing::debug!(handler = %entry.name, forwarded, "Handler branch complete");
        }
        Err(BranchError::Unreachable(e)) => {
            tracing::warn!(
                handler = %entry.name,
                address = %entry.address,
                error = %e,
                "Handler unreachable"
            );
        }
        Err(BranchError::Stream(status)) => {
            tracing::warn!(handler = %entry.name, error = %status, "Handler stream error");
        }
    }
}

/// Dial the handler, send the tagged message, and forward its reply stream
/// until end-of-stream. The connection lives exactly as long as this call;
/// dropping the client on any exit path releases it.
async fn stream_replies(
    entry: &Entry,
    message: ChatMessage,
    replies: &mpsc::Sender<ChatMessage>,
    shutdown: &CancellationToken,
) -> Result<u64, BranchError> {
    let mut client = tokio::select! {
        _ = shutdown.cancelled() => return Ok(0),
        connected = MessagingClient::connect(endpoint_uri(&entry.address)) => connected?,
    };

    let mut stream = tokio::select! {
        _ = shutdown.cancelled() => return Ok(0),
        response = client.send_message(message) => response?.into_inner(),
    };

    let mut forwarded = 0u64;
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!(handler = %entry.name, "Branch abandoned by shutdown");
                break;
            }
            next = stream.message() => next?,
        };

        let Some(reply) = next else {
            break;
        };

        tokio::select! {
            _ = shutdown.cancelled() => break,
            sent = replies.send(reply) => {
                if sent.is_err() {
                    // The integration session is gone; stop delivering.
                    tracing::warn!(
                        handler = %entry.name,
                        "Integration session closed, dropping remaining replies"
                    );
                    break;
                }
                forwarded += 1;
            }
        }
    }

    Ok(forwarded)
}

/// Registered addresses may omit the URI scheme; dial plain host:port as http.
fn endpoint_uri(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

// =============================================================================
// Tests
// =============================================================================
