//! Domain entities. Pure data structures for the core business.
//!
//! No Gmail/Telegram/SQL types here; adapters map into these.

use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Serialize};

use super::amount;

/// Category assigned to a transaction until the user classifies it.
pub const DEFAULT_CATEGORY: &str = "Others";

/// A transaction extracted from one notification mail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Provider message id. Unique across the store.
    pub message_id: String,
    /// Signed amount; negative = debit.
    pub amount: f64,
    pub category: String,
    /// User-supplied note from the classification reply.
    pub note: Option<String>,
    /// Bank-supplied description ("Mô tả: ...") from the mail body.
    pub description: Option<String>,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
    /// Calendar year of `created_at` in local time.
    pub year: i32,
    /// Calendar month (1-12) of `created_at` in local time.
    pub month: u32,
}

impl TransactionRecord {
    /// Build an unclassified record from the text of a notification mail.
    pub fn from_mail(message_id: &str, text: &str, created_at: DateTime<Utc>) -> Self {
        let period = YearMonth::of(created_at);
        Self {
            message_id: message_id.to_string(),
            amount: amount::signed_amount(text),
            category: DEFAULT_CATEGORY.to_string(),
            note: None,
            description: amount::extract_description(text),
            acknowledged: false,
            created_at,
            year: period.year,
            month: period.month,
        }
    }

    pub fn period(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }

    pub fn sign(&self) -> Sign {
        if self.amount < 0.0 {
            Sign::Debit
        } else {
            Sign::Credit
        }
    }
}

/// A calendar month of a specific year, in local time. Monthly totals group by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(ts: DateTime<Utc>) -> Self {
        let local = ts.with_timezone(&Local);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    pub fn current() -> Self {
        Self::of(Utc::now())
    }

    /// Most recent occurrence of `month` at or before `self`: in January 2027,
    /// month 3 means March 2026.
    pub fn latest_with_month(self, month: u32) -> Self {
        let year = if month > self.month {
            self.year - 1
        } else {
            self.year
        };
        Self { year, month }
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// Direction of money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Debit,
    Credit,
}

impl Sign {
    pub fn apply(self, magnitude: f64) -> f64 {
        match self {
            Sign::Debit => -magnitude.abs(),
            Sign::Credit => magnitude.abs(),
        }
    }
}

/// What a scheduled tick does while a transaction is still awaiting a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResendPolicy {
    /// Do nothing until the user replies.
    #[default]
    Skip,
    /// Send the pending notification again on every tick.
    Resend,
}

impl std::str::FromStr for ResendPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(ResendPolicy::Skip),
            "resend" => Ok(ResendPolicy::Resend),
            other => Err(format!("unknown resend policy '{}'", other)),
        }
    }
}

/// OAuth credentials for the mail provider. Single logical row, replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Opaque reference to a mail returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// Text content of a mail plus its receive time when the provider reports one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailSnippet {
    pub text: String,
    pub received_at: Option<DateTime<Utc>>,
}

/// Which mails count as transaction notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailFilter {
    pub sender: String,
    pub lookback_days: u32,
}

/// A chat message delivered to the command responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub text: String,
    /// Text of the message being replied to, if this is a reply.
    pub reply_to: Option<String>,
}

/// Parsed `CATEGORY - note` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub note: String,
}

/// One row of the monthly per-category report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub count: u32,
    pub total: f64,
    pub notes: Vec<String>,
}
