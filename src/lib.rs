//! outlay-bot: bank notification mails to Telegram, classified by reply. Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
