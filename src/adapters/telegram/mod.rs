//! Telegram adapter (teloxide). Outbound ChatPort plus the inbound dispatcher.

pub mod client;
pub mod dispatcher;
pub mod mapper;

pub use client::TelegramChat;
pub use dispatcher::run_dispatcher;
