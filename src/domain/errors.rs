//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Credential expired or rejected by the provider.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network or API hiccup; safe to skip this tick.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Malformed user input. Surfaced to the user as a corrective prompt.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate message id. Callers treat it as "already processed".
    #[error("Already stored: {0}")]
    Constraint(String),

    #[error("No transaction is awaiting a reply")]
    NoPending,

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Chat transport error: {0}")]
    Chat(String),
}

impl DomainError {
    /// Failures that only cost the current tick.
    pub fn is_skippable(&self) -> bool {
        matches!(self, DomainError::Auth(_) | DomainError::Transient(_))
    }
}
