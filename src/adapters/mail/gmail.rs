//! Gmail REST adapter. Implements MailGateway.
//!
//! Lists messages with a Gmail search query and reads each one in `metadata` format;
//! the subject plus Gmail's snippet carries the amount for bank notifications.

use crate::domain::{DomainError, MailFilter, MailSnippet, MessageRef};
use crate::ports::{CredentialProvider, MailGateway};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on listing pages per poll.
const MAX_PAGES: usize = 10;

pub struct GmailGateway {
    client: reqwest::Client,
    /// e.g. https://gmail.googleapis.com/gmail/v1
    api_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl GmailGateway {
    pub fn new(
        client: reqwest::Client,
        api_url: String,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Send an authorized GET and map HTTP failures into the domain taxonomy.
    ///
    /// 401 drops the cached token. A 403 is a rate limit (transient) or a missing
    /// scope (auth); neither is fixed by refreshing.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, DomainError> {
        let token = self.credentials.get_valid_token().await?;
        let res = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| DomainError::Transient(format!("Gmail request failed: {}", e)))?;

        let status = res.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.credentials.invalidate().await;
            return Err(DomainError::Auth(format!("Gmail API {}", status)));
        }
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "Gmail API returned error");
            let msg = format!(
                "Gmail API {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            );
            return Err(match status {
                reqwest::StatusCode::NOT_FOUND => DomainError::NotFound(msg),
                reqwest::StatusCode::FORBIDDEN if !is_rate_limited(&text) => {
                    DomainError::Auth(msg)
                }
                _ => DomainError::Transient(msg),
            });
        }

        res.json()
            .await
            .map_err(|e| DomainError::Transient(format!("Failed to parse Gmail response: {}", e)))
    }
}

/// Gmail reports quota exhaustion as 403 with one of these reasons.
fn is_rate_limited(body: &str) -> bool {
    body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded")
}

/// Gmail search query for mails from `filter.sender` received in the lookback window.
pub fn build_query(filter: &MailFilter, today: NaiveDate) -> String {
    let after = today
        .checked_sub_days(Days::new(u64::from(filter.lookback_days)))
        .unwrap_or(today);
    let before = today.checked_add_days(Days::new(1)).unwrap_or(today);
    format!(
        "from:{} after:{} before:{}",
        filter.sender,
        after.format("%Y/%m/%d"),
        before.format("%Y/%m/%d")
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<ListedMessage>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ListedMessage {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    #[serde(default)]
    snippet: String,
    /// Milliseconds since epoch, as a string.
    internal_date: Option<String>,
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    value: String,
}

fn to_snippet(msg: GmailMessage) -> MailSnippet {
    let subject = msg
        .payload
        .as_ref()
        .and_then(|p| p.headers.iter().find(|h| h.name.eq_ignore_ascii_case("Subject")))
        .map(|h| h.value.trim().to_string())
        .unwrap_or_default();
    let text = if subject.is_empty() {
        msg.snippet
    } else {
        format!("{} {}", subject, msg.snippet)
    };
    let received_at = msg
        .internal_date
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis);
    MailSnippet { text, received_at }
}

#[async_trait::async_trait]
impl MailGateway for GmailGateway {
    async fn list_unseen_matching(
        &self,
        filter: &MailFilter,
    ) -> Result<Vec<MessageRef>, DomainError> {
        let q = build_query(filter, Utc::now().date_naive());
        let url = format!("{}/users/me/messages", self.api_url);
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut query = vec![("q", q.as_str())];
            if let Some(t) = page_token.as_deref() {
                query.push(("pageToken", t));
            }
            let page: ListResponse = self.get_json(&url, &query).await?;
            refs.extend(page.messages.into_iter().map(|m| MessageRef { id: m.id }));
            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }

        info!(query = %q, count = refs.len(), "listed matching mails");
        Ok(refs)
    }

    async fn get_snippet(&self, message: &MessageRef) -> Result<MailSnippet, DomainError> {
        let url = format!("{}/users/me/messages/{}", self.api_url, message.id);
        let msg: GmailMessage = self
            .get_json(
                &url,
                &[("format", "metadata"), ("metadataHeaders", "Subject")],
            )
            .await
            .map_err(|e| match e {
                DomainError::NotFound(_) => DomainError::NotFound(message.id.clone()),
                other => other,
            })?;
        debug!(message_id = %message.id, "fetched mail snippet");
        Ok(to_snippet(msg))
    }
}
