//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod amount;
pub mod classification;
pub mod entities;
pub mod errors;

pub use entities::{
    CategoryTotal, Classification, DEFAULT_CATEGORY, InboundMessage, MailFilter, MailSnippet,
    MessageRef, OAuthToken, ResendPolicy, Sign, TransactionRecord, YearMonth,
};
pub use errors::DomainError;
