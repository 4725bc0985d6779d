//! Fixtures shared by use-case tests.

use crate::adapters::mail::MockMailGateway;
use crate::adapters::persistence::SqliteRepo;
use crate::domain::{DomainError, MailFilter, ResendPolicy};
use crate::ports::ChatPort;
use crate::usecases::NotificationHandshake;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

pub const CHAT_ID: i64 = 7408813563;

/// ChatPort that records every message instead of sending it.
#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<(i64, String)>>,
    fail: AtomicBool,
}

impl RecordingChat {
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ChatPort for RecordingChat {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::Chat("chat unavailable".into()));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

pub struct Harness {
    // Keeps the database directory alive for the test's duration.
    _dir: TempDir,
    pub repo: Arc<SqliteRepo>,
    pub mail: Arc<MockMailGateway>,
    pub chat: Arc<RecordingChat>,
    pub handshake: Arc<NotificationHandshake>,
}

pub async fn harness(mails: &[(&str, &str)], policy: ResendPolicy) -> Harness {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(SqliteRepo::connect(dir.path()).await.unwrap());
    let mail = Arc::new(MockMailGateway::new(mails));
    let chat = Arc::new(RecordingChat::default());
    let handshake = Arc::new(NotificationHandshake::new(
        mail.clone(),
        repo.clone(),
        chat.clone(),
        CHAT_ID,
        MailFilter {
            sender: "support@timo.vn".into(),
            lookback_days: 20,
        },
        policy,
    ));
    Harness {
        _dir: dir,
        repo,
        mail,
        chat,
        handshake,
    }
}
