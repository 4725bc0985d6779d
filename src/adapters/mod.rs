//! Infrastructure adapters. Implement outbound ports.
//!
//! Gmail, Telegram, SQLite. Map errors to DomainError.

pub mod mail;
pub mod persistence;
pub mod telegram;
