//! Notification handshake: one pending transaction at a time.
//!
//! `Idle` -> (tick finds mail) -> `AwaitingReply` -> (user classifies) -> `Idle`.
//!
//! Every tick and every acknowledge holds the state lock for its whole duration,
//! network calls included, so a reply can't land between fetch and notify and two
//! ticks can't both fetch.

use crate::domain::classification::parse_reply;
use crate::domain::{
    DomainError, MailFilter, ResendPolicy, Sign, TransactionRecord, YearMonth,
};
use crate::ports::{ChatPort, MailGateway, TransactionRepo};
use crate::shared::fmt::grouped;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// The transaction currently shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem {
    pub record: TransactionRecord,
    pub notified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum HandshakeState {
    #[default]
    Idle,
    AwaitingReply(PendingItem),
}

impl HandshakeState {
    pub fn pending(&self) -> Option<&PendingItem> {
        match self {
            HandshakeState::Idle => None,
            HandshakeState::AwaitingReply(p) => Some(p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Timer tick; obeys the resend policy.
    Scheduled,
    /// User asked to check now; always resends a pending notification.
    Forced,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Notified(TransactionRecord),
    Resent(TransactionRecord),
    /// Waiting on the reply for this message id; nothing was fetched or sent.
    StillAwaiting(String),
    NothingNew,
}

/// Result of a successful classification reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledged {
    pub record: TransactionRecord,
    /// Expense total for the current month, when it could be read.
    pub month_expense: Option<f64>,
}

pub struct NotificationHandshake {
    mail: Arc<dyn MailGateway>,
    repo: Arc<dyn TransactionRepo>,
    chat: Arc<dyn ChatPort>,
    chat_id: i64,
    filter: MailFilter,
    policy: ResendPolicy,
    state: Mutex<HandshakeState>,
}

impl NotificationHandshake {
    pub fn new(
        mail: Arc<dyn MailGateway>,
        repo: Arc<dyn TransactionRepo>,
        chat: Arc<dyn ChatPort>,
        chat_id: i64,
        filter: MailFilter,
        policy: ResendPolicy,
    ) -> Self {
        Self {
            mail,
            repo,
            chat,
            chat_id,
            filter,
            policy,
            state: Mutex::new(HandshakeState::Idle),
        }
    }

    pub async fn state(&self) -> HandshakeState {
        self.state.lock().await.clone()
    }

    /// Scheduler entry point. Never fails: every error is logged and the tick is dropped.
    pub async fn poll_once(&self) {
        match self.tick(TickMode::Scheduled).await {
            Ok(TickOutcome::Notified(r)) => {
                info!(message_id = %r.message_id, amount = r.amount, "transaction sent for classification")
            }
            Ok(TickOutcome::Resent(r)) => {
                info!(message_id = %r.message_id, "pending transaction re-sent")
            }
            Ok(TickOutcome::StillAwaiting(id)) => {
                debug!(message_id = %id, "still awaiting reply; mail not polled")
            }
            Ok(TickOutcome::NothingNew) => debug!("no unclassified transactions"),
            Err(e) if e.is_skippable() => warn!(error = %e, "mail poll skipped"),
            Err(e) => error!(error = %e, "mail poll failed"),
        }
    }

    pub async fn tick(&self, mode: TickMode) -> Result<TickOutcome, DomainError> {
        let mut state = self.state.lock().await;

        if let HandshakeState::AwaitingReply(pending) = &mut *state {
            let resend = mode == TickMode::Forced || self.policy == ResendPolicy::Resend;
            if !resend {
                return Ok(TickOutcome::StillAwaiting(pending.record.message_id.clone()));
            }
            self.chat
                .send_message(self.chat_id, &notification_text(&pending.record))
                .await?;
            pending.notified_at = Utc::now();
            return Ok(TickOutcome::Resent(pending.record.clone()));
        }

        let stored = self.ingest_new_mail().await?;
        if stored > 0 {
            info!(stored, "new transaction mails stored");
        }

        let Some(record) = self.repo.find_unacknowledged_oldest().await? else {
            return Ok(TickOutcome::NothingNew);
        };
        // Send before switching state: if the chat is down the record stays
        // unacknowledged and the next tick picks it up again.
        self.chat
            .send_message(self.chat_id, &notification_text(&record))
            .await?;
        *state = HandshakeState::AwaitingReply(PendingItem {
            record: record.clone(),
            notified_at: Utc::now(),
        });
        Ok(TickOutcome::Notified(record))
    }

    /// Store every listed mail not seen before. Returns how many were stored.
    async fn ingest_new_mail(&self) -> Result<usize, DomainError> {
        let refs = self.mail.list_unseen_matching(&self.filter).await?;
        if refs.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = refs.iter().map(|r| r.id.clone()).collect();
        let known = self.repo.known_message_ids(&ids).await?;

        let mut stored = 0usize;
        for mail_ref in refs.iter().filter(|r| !known.contains(&r.id)) {
            let snippet = match self.mail.get_snippet(mail_ref).await {
                Ok(s) => s,
                Err(DomainError::NotFound(id)) => {
                    warn!(message_id = %id, "mail vanished before it could be read");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let created_at = snippet.received_at.unwrap_or_else(Utc::now);
            let record = TransactionRecord::from_mail(&mail_ref.id, &snippet.text, created_at);
            match self.repo.upsert_by_message_id(&record).await {
                Ok(()) => stored += 1,
                Err(DomainError::Constraint(id)) => {
                    debug!(message_id = %id, "mail already stored")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(stored)
    }

    /// Apply a `CATEGORY - note` reply to the pending transaction.
    ///
    /// On a malformed reply the state and the stored record are left untouched.
    pub async fn acknowledge(&self, reply: &str) -> Result<Acknowledged, DomainError> {
        let mut state = self.state.lock().await;
        let HandshakeState::AwaitingReply(pending) = &*state else {
            return Err(DomainError::NoPending);
        };
        let classification = parse_reply(reply)?;

        let mut record = pending.record.clone();
        match self
            .repo
            .update_classification(
                &record.message_id,
                &classification.category,
                &classification.note,
            )
            .await
        {
            Ok(()) => {}
            Err(DomainError::NotFound(id)) => {
                warn!(message_id = %id, "pending transaction no longer stored; resetting");
                *state = HandshakeState::Idle;
                return Err(DomainError::NotFound(id));
            }
            Err(e) => return Err(e),
        }

        record.category = classification.category;
        record.note = Some(classification.note);
        record.acknowledged = true;
        *state = HandshakeState::Idle;
        drop(state);

        info!(message_id = %record.message_id, category = %record.category, "transaction classified");

        let month_expense = match monthly_expense_total(&*self.repo, YearMonth::current()).await {
            Ok(total) => Some(total),
            Err(e) => {
                warn!(error = %e, "could not read monthly total");
                None
            }
        };
        Ok(Acknowledged {
            record,
            month_expense,
        })
    }

    /// Force `Idle`. Returns the item that was pending, if any.
    pub async fn reset(&self) -> Option<PendingItem> {
        let mut state = self.state.lock().await;
        match std::mem::take(&mut *state) {
            HandshakeState::AwaitingReply(p) => Some(p),
            HandshakeState::Idle => None,
        }
    }
}

/// Sum of acknowledged debits in `period` (negative, or 0).
pub async fn monthly_expense_total(
    repo: &dyn TransactionRepo,
    period: YearMonth,
) -> Result<f64, DomainError> {
    repo.sum_by_month_and_sign(period, Sign::Debit).await
}

pub fn notification_text(record: &TransactionRecord) -> String {
    let verb = match record.sign() {
        Sign::Debit => "debited",
        Sign::Credit => "credited",
    };
    let mut text = format!(
        "Your account was {} {} VND",
        verb,
        grouped(record.amount.abs())
    );
    if let Some(d) = &record.description {
        text.push_str(&format!("\nContent: {}", d));
    }
    text.push_str("\nWhat was it for? Reply to this message with: CATEGORY - note");
    text
}
