//! Application configuration. Bot credentials, mail filter, paths, intervals.

use crate::domain::{MailFilter, ResendPolicy};
use serde::Deserialize;
use tracing::warn;

/// Default seconds between mail-poll ticks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
/// Default sender whose mails are treated as transaction notifications.
pub const DEFAULT_MAIL_SENDER: &str = "support@timo.vn";
/// Default number of days to look back when listing mail.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 20;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Telegram bot token. Read from OUTLAY_TELEGRAM_TOKEN.
    pub telegram_token: Option<String>,

    /// Chat that receives notifications and is allowed to send commands. Read from OUTLAY_TELEGRAM_CHAT_ID.
    pub telegram_chat_id: Option<i64>,

    /// Directory holding outlay.db. Defaults to ./data.
    pub data_dir: Option<String>,

    /// Seconds between mail-poll ticks (default 60).
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,

    /// `skip` (default) or `resend`: what a tick does while a reply is outstanding.
    #[serde(default)]
    pub resend_policy: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Mail filter
    // ─────────────────────────────────────────────────────────────────────────
    /// Sender address of notification mails. Defaults to support@timo.vn.
    #[serde(default)]
    pub mail_sender: Option<String>,

    /// Days of mail history to list on each poll (default 20).
    #[serde(default)]
    pub mail_lookback_days: Option<u32>,

    // ─────────────────────────────────────────────────────────────────────────
    // Gmail / OAuth
    // ─────────────────────────────────────────────────────────────────────────
    /// OAuth client id. Read from OUTLAY_GMAIL_CLIENT_ID.
    #[serde(default)]
    pub gmail_client_id: Option<String>,

    /// OAuth client secret. Read from OUTLAY_GMAIL_CLIENT_SECRET.
    #[serde(default)]
    pub gmail_client_secret: Option<String>,

    /// Refresh token used to seed the token store on first start.
    #[serde(default)]
    pub gmail_refresh_token: Option<String>,

    /// Gmail REST base URL.
    #[serde(default)]
    pub gmail_api_url: Option<String>,

    /// OAuth token endpoint.
    #[serde(default)]
    pub oauth_token_url: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("OUTLAY").try_parsing(true));
        if let Ok(path) = std::env::var("OUTLAY_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c.build()?.try_deserialize()
    }

    pub fn data_dir_or_default(&self) -> String {
        self.data_dir.clone().unwrap_or_else(|| "./data".to_string())
    }

    /// Returns poll interval in seconds. Zero is treated as unset.
    pub fn poll_interval_secs_or_default(&self) -> u64 {
        self.poll_interval_secs
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
    }

    /// Returns the resend policy. Unknown values fall back to `skip` with a warning.
    pub fn resend_policy_or_default(&self) -> ResendPolicy {
        match self.resend_policy.as_deref().map(str::parse::<ResendPolicy>) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                warn!(error = %e, "invalid OUTLAY_RESEND_POLICY, using skip");
                ResendPolicy::default()
            }
            None => ResendPolicy::default(),
        }
    }

    pub fn mail_filter(&self) -> MailFilter {
        MailFilter {
            sender: self
                .mail_sender
                .clone()
                .unwrap_or_else(|| DEFAULT_MAIL_SENDER.to_string()),
            lookback_days: self.mail_lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gmail Configuration Helpers
    // ─────────────────────────────────────────────────────────────────────────

    pub fn gmail_api_url_or_default(&self) -> String {
        self.gmail_api_url
            .clone()
            .unwrap_or_else(|| "https://gmail.googleapis.com/gmail/v1".to_string())
    }

    pub fn oauth_token_url_or_default(&self) -> String {
        self.oauth_token_url
            .clone()
            .unwrap_or_else(|| "https://oauth2.googleapis.com/token".to_string())
    }

    /// Returns true if Gmail is fully configured (client credentials and a refresh token).
    pub fn is_gmail_configured(&self) -> bool {
        self.gmail_client_id.is_some()
            && self.gmail_client_secret.is_some()
            && self.gmail_refresh_token.is_some()
    }
}
