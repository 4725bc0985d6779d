//! Map teloxide types to domain entities.

use crate::domain::InboundMessage;
use teloxide::types::Message;

/// Text messages only; stickers, photos and service messages map to `None`.
///
/// A reply whose target carries no text still counts as a reply (`Some("")`).
pub fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let text = msg.text()?;
    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        text: text.to_string(),
        reply_to: msg
            .reply_to_message()
            .map(|m| m.text().unwrap_or_default().to_string()),
    })
}
