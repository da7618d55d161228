// ABOUTME: tonic service implementations for the broker's two RPC surfaces.
// ABOUTME: Messaging (integration-facing dispatch) and Registration (handler add/remove).

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};

use botrpc::messaging_server::Messaging;
use botrpc::registration_server::Registration;
use botrpc::registration_status::Code;
use botrpc::{ChatMessage, Handler, RegistrationStatus, RemoveRequest};

use crate::dispatch::Dispatcher;
use crate::registry::Registry;

/// Replies buffered per integration session before backpressure applies.
const REPLY_BUFFER: usize = 64;

/// Integration-facing dispatch surface: one inbound chat event per call,
/// replies streamed back until every matched handler completes.
pub struct MessagingService {
    dispatcher: Arc<Dispatcher>,
}

impl MessagingService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[tonic::async_trait]
impl Messaging for MessagingService {
    type SendMessageStream = Pin<Box<dyn Stream<Item = Result<ChatMessage, Status>> + Send>>;

    async fn send_message(
        &self,
        request: Request<ChatMessage>,
    ) -> Result<Response<Self::SendMessageStream>, Status> {
        let message = request.into_inner();
        tracing::info!(
            user = %message.user,
            channel = %message.channel,
            "Inbound chat message"
        );

        let (tx, rx) = mpsc::channel(REPLY_BUFFER);
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let opened = dispatcher.dispatch(message, tx).await;
            tracing::debug!(branches = opened, "Dispatch complete");
        });

        let replies = ReceiverStream::new(rx).map(Ok);
        Ok(Response::new(Box::pin(replies)))
    }
}

/// Registration surface: the sole mutation entry point into the registry.
pub struct RegistrationService {
    registry: Arc<Registry>,
}

impl RegistrationService {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[tonic::async_trait]
impl Registration for RegistrationService {
    async fn add(&self, request: Request<Handler>) -> Result<Response<RegistrationStatus>, Status> {
        let handler = request.into_inner();
        let name = handler.name.clone();

        match self.registry.add(handler) {
            Ok(()) => {
                tracing::info!(
                    handler = %name,
                    total = self.registry.len(),
                    "Handler registered"
                );
                Ok(Response::new(RegistrationStatus {
                    code: Code::Accepted as i32,
                    detail: String::new(),
                }))
            }
            Err(e) => {
                // An invalid trigger is an application-level rejection, not
                // a transport error; the broker stays up.
                tracing::warn!(handler = %name, error = %e, "Registration rejected");
                Ok(Response::new(RegistrationStatus {
                    code: Code::Rejected as i32,
                    detail: e.to_string(),
                }))
            }
        }
    }

    async fn remove(
        &self,
        request: Request<RemoveRequest>,
    ) -> Result<Response<RegistrationStatus>, Status> {
        let req = request.into_inner();

        // Removal has no effect on the registry. Answer with a distinct
        // status so callers are not misled into believing the handler is
        // gone.
        tracing::info!(handler = %req.name, "Remove requested; removal is not supported");
        Ok(Response::new(RegistrationStatus {
            code: Code::Unsupported as i32,
            detail: "removal is not supported; the registration remains active".to_string(),
        }))
    }
}
