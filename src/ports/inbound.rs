//! Inbound port. The chat adapter calls into the application.

use crate::domain::InboundMessage;

/// Turns one chat message into at most one response.
#[async_trait::async_trait]
pub trait CommandPort: Send + Sync {
    /// Returns the text to send back, or `None` when the message is ignored.
    async fn handle(&self, message: InboundMessage) -> Option<String>;
}
