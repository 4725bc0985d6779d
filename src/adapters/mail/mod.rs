//! Mail adapters. Implement MailGateway and CredentialProvider.
//!
//! Gmail over REST with Google OAuth refresh, plus an in-memory mailbox for offline runs.

#[cfg(test)]
pub(crate) mod canned_http;
pub mod gmail;
pub mod mock_adapter;
pub mod token_provider;

pub use gmail::GmailGateway;
pub use mock_adapter::MockMailGateway;
pub use token_provider::GoogleTokenProvider;
