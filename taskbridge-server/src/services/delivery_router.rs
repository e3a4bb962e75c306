//! Store-then-maybe-push delivery pipeline.
//!
//! Persistence is the reliability baseline; the live push is a best-effort
//! optimization on top of it. A store failure aborts the whole operation, a
//! push failure never does.

use std::sync::Arc;

use metrics::counter;
use shared::models::{ChatMessage, SendMessageRequest, StreamEvent};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{instrument, warn};

use super::{
    connection_registry::ConnectionRegistry,
    message_store::{ChatStoreResult, MessageStore},
};

/// Routes an accepted outbound message: persist first, then push to the
/// recipient's live channel when one is registered.
#[derive(Clone)]
pub struct DeliveryRouter {
    store: Arc<dyn MessageStore>,
    registry: Arc<ConnectionRegistry>,
}

impl std::fmt::Debug for DeliveryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryRouter").finish()
    }
}

impl DeliveryRouter {
    pub fn new(store: Arc<dyn MessageStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Persists the message, then pushes it to the recipient if connected.
    ///
    /// `sender` is the identity resolved from the credential by the auth
    /// middleware, never taken from the request body. The sender's own
    /// channel is never pushed to; the send call's response is the sender's
    /// confirmation.
    ///
    /// Push delivery is at-most-once over the live channel: a full or closed
    /// channel is logged and swallowed, because the message is already
    /// durable and will surface in the recipient's next history fetch.
    ///
    /// # Errors
    /// Propagates store validation and database errors; the message is not
    /// pushed in that case.
    #[instrument(name = "chat.route", skip(self, request), fields(recipient = %request.recipient_username), err)]
    pub async fn route(
        &self,
        sender: &str,
        request: SendMessageRequest,
    ) -> ChatStoreResult<ChatMessage> {
        let message = self
            .store
            .append(
                sender,
                &request.recipient_username,
                &request.content,
                request.timestamp,
            )
            .await?;
        counter!("chat_messages_routed_total").increment(1);

        if let Some(live) = self.registry.lookup(&message.recipient_username).await {
            let event = StreamEvent::Message {
                message: message.clone(),
            };
            match live.sender.try_send(event) {
                Ok(()) => {
                    counter!("chat_push_delivered_total").increment(1);
                }
                Err(TrySendError::Full(_)) => {
                    counter!("chat_push_failures_total", "reason" => "full").increment(1);
                    warn!(
                        recipient = %message.recipient_username,
                        message_id = message.id,
                        "push channel full, recipient will catch up on next fetch"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    counter!("chat_push_failures_total", "reason" => "closed").increment(1);
                    warn!(
                        recipient = %message.recipient_username,
                        message_id = message.id,
                        "push channel closed mid-flight"
                    );
                    // Lazy cleanup; the epoch guard keeps a racing fresh
                    // connect safe from this removal.
                    self.registry
                        .unregister(&message.recipient_username, live.epoch)
                        .await;
                }
            }
        }

        Ok(message)
    }
}
