//! Mock mail gateway for running without Gmail credentials.
//!
//! Serves a fixed set of notification mails from memory. Also used by use-case tests,
//! which can count listing calls and switch on an authentication failure.

use crate::domain::{DomainError, MailFilter, MailSnippet, MessageRef};
use crate::ports::MailGateway;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::info;

/// In-memory mailbox.
pub struct MockMailGateway {
    mails: Mutex<Vec<(MessageRef, MailSnippet)>>,
    list_calls: AtomicUsize,
    fail_auth: AtomicBool,
}

impl MockMailGateway {
    /// Mailbox holding the given `(id, text)` mails.
    pub fn new(mails: &[(&str, &str)]) -> Self {
        let gw = Self {
            mails: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            fail_auth: AtomicBool::new(false),
        };
        for (id, text) in mails {
            gw.push(id, text);
        }
        gw
    }

    /// A few bank notifications, for trying the bot without a mailbox.
    pub fn demo() -> Self {
        Self::new(&[
            (
                "demo-1",
                "Thông báo thay đổi số dư Tài khoản Spend Account vừa giảm 45.000 VND. Mô tả: GRAB*FOOD",
            ),
            (
                "demo-2",
                "Thông báo thay đổi số dư Tài khoản Spend Account vừa tăng 2.000.000 VND. Mô tả: LUONG",
            ),
        ])
    }

    pub fn push(&self, id: &str, text: &str) {
        if let Ok(mut mails) = self.mails.lock() {
            mails.push((
                MessageRef { id: id.to_string() },
                MailSnippet {
                    text: text.to_string(),
                    received_at: None,
                },
            ));
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// While set, every call fails with `DomainError::Auth`.
    pub fn set_fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    fn check_auth(&self) -> Result<(), DomainError> {
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(DomainError::Auth("[MOCK] token rejected".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MailGateway for MockMailGateway {
    async fn list_unseen_matching(
        &self,
        filter: &MailFilter,
    ) -> Result<Vec<MessageRef>, DomainError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;
        let mails = self
            .mails
            .lock()
            .map_err(|e| DomainError::Transient(e.to_string()))?;
        info!(sender = %filter.sender, count = mails.len(), "[MOCK] listing mails");
        Ok(mails.iter().map(|(r, _)| r.clone()).collect())
    }

    async fn get_snippet(&self, message: &MessageRef) -> Result<MailSnippet, DomainError> {
        self.check_auth()?;
        let mails = self
            .mails
            .lock()
            .map_err(|e| DomainError::Transient(e.to_string()))?;
        mails
            .iter()
            .find(|(r, _)| r == message)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| DomainError::NotFound(message.id.clone()))
    }
}
