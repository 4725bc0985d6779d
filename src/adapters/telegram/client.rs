//! Implements ChatPort using the teloxide Bot API client.
//!
//! Retries once when Telegram answers with RetryAfter (429).

use crate::domain::DomainError;
use crate::ports::ChatPort;
use async_trait::async_trait;
use teloxide::RequestError;
use teloxide::prelude::*;
use tokio::time::sleep;
use tracing::debug;

/// Outbound Telegram messenger. Cheap to clone (the Bot is reference-counted).
#[derive(Clone)]
pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn map_err(e: RequestError) -> DomainError {
        DomainError::Chat(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl ChatPort for TelegramChat {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), DomainError> {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match self
                .bot
                .send_message(teloxide::types::ChatId(chat_id), text.to_string())
                .await
            {
                Ok(_) => {
                    debug!(chat_id, "message sent");
                    return Ok(());
                }
                Err(RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                }
                Err(e) => return Err(Self::map_err(e)),
            }
        }
    }
}
