//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    CategoryTotal, DomainError, MailFilter, MailSnippet, MessageRef, OAuthToken, Sign,
    TransactionRecord, YearMonth,
};
use std::collections::HashSet;

/// Mail provider gateway. Lists and reads notification mails.
///
/// Both calls fail with `DomainError::Auth` when credentials are rejected and
/// `DomainError::Transient` for anything that is worth retrying next tick.
#[async_trait::async_trait]
pub trait MailGateway: Send + Sync {
    /// List mails matching the filter. Whether they were seen before is the caller's concern.
    async fn list_unseen_matching(
        &self,
        filter: &MailFilter,
    ) -> Result<Vec<MessageRef>, DomainError>;

    /// Fetch the text (subject + snippet) of one mail.
    async fn get_snippet(&self, message: &MessageRef) -> Result<MailSnippet, DomainError>;
}

/// Persistence of transaction records.
#[async_trait::async_trait]
pub trait TransactionRepo: Send + Sync {
    /// Insert a record. An existing row with the same message id is left untouched
    /// and `DomainError::Constraint` is returned.
    async fn upsert_by_message_id(&self, record: &TransactionRecord) -> Result<(), DomainError>;

    /// Oldest record still waiting for a classification.
    async fn find_unacknowledged_oldest(&self) -> Result<Option<TransactionRecord>, DomainError>;

    /// Sum of acknowledged amounts in `period` with the given sign. 0 when empty.
    async fn sum_by_month_and_sign(
        &self,
        period: YearMonth,
        sign: Sign,
    ) -> Result<f64, DomainError>;

    /// Set category and note and mark acknowledged. `NotFound` for unknown ids.
    async fn update_classification(
        &self,
        message_id: &str,
        category: &str,
        note: &str,
    ) -> Result<(), DomainError>;

    async fn find_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<TransactionRecord>, DomainError>;

    /// Subset of `ids` that are already stored.
    async fn known_message_ids(&self, ids: &[String]) -> Result<HashSet<String>, DomainError>;

    async fn count_unacknowledged(&self) -> Result<u64, DomainError>;

    /// Acknowledged records of `period` grouped by category, most negative total first.
    async fn category_totals(
        &self,
        period: YearMonth,
    ) -> Result<Vec<CategoryTotal>, DomainError>;
}

/// Storage for the single OAuth token row.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn load_token(&self) -> Result<Option<OAuthToken>, DomainError>;

    /// Replace the stored token wholesale.
    async fn save_token(&self, token: &OAuthToken) -> Result<(), DomainError>;
}

/// Hands out an access token for the mail provider, refreshing it when needed.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_valid_token(&self) -> Result<String, DomainError>;

    /// Forget the cached access token so the next call refreshes.
    async fn invalidate(&self);
}

/// Chat transport. Sends plain text to a chat.
#[async_trait::async_trait]
pub trait ChatPort: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), DomainError>;
}
