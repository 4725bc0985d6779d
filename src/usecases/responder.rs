//! Chat command responder. Implements CommandPort.
//!
//! Replies to a notification go to the handshake; everything else is a command.

use crate::domain::classification::REPLY_USAGE;
use crate::domain::{DomainError, InboundMessage, YearMonth};
use crate::ports::{CommandPort, TransactionRepo};
use crate::shared::fmt::grouped;
use crate::usecases::handshake::{
    Acknowledged, NotificationHandshake, TickMode, TickOutcome, monthly_expense_total,
};
use std::sync::Arc;
use tracing::{info, warn};

pub const INVALID_COMMAND: &str = "Invalid command. Try /help to see the supported commands.";

const HELP: &str = "Reply to a transaction message with: CATEGORY - note\n\n\
/check - check mail now (or re-send the waiting transaction)\n\
/check_outlay - total spent this month\n\
/report <month> [year] - spending per category for a month (1-12)\n\
/reset - stop waiting for the current transaction\n\
/help - show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Start,
    Help,
    Reset,
    Check,
    CheckOutlay,
    Report(Option<String>, Option<String>),
    Unknown,
}

/// `/Check-Bot@outlay_bot` -> `Check`. Case-insensitive, `-` and `_` interchangeable.
fn parse_command(text: &str) -> Command {
    let mut parts = text.split_whitespace();
    let head = parts.next().unwrap_or_default().trim_start_matches('/');
    let head = head.split('@').next().unwrap_or_default();
    match head.to_lowercase().replace('-', "_").as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "reset" | "reset_bot" => Command::Reset,
        "check" | "check_bot" => Command::Check,
        "check_outlay" => Command::CheckOutlay,
        "report" => {
            let month = parts.next().map(String::from);
            Command::Report(month, parts.next().map(String::from))
        }
        _ => Command::Unknown,
    }
}

pub struct ChatCommandResponder {
    handshake: Arc<NotificationHandshake>,
    repo: Arc<dyn TransactionRepo>,
    /// Only this chat is served.
    chat_id: i64,
}

impl ChatCommandResponder {
    pub fn new(
        handshake: Arc<NotificationHandshake>,
        repo: Arc<dyn TransactionRepo>,
        chat_id: i64,
    ) -> Self {
        Self {
            handshake,
            repo,
            chat_id,
        }
    }

    async fn on_reply(&self, text: &str) -> String {
        match self.handshake.acknowledge(text).await {
            Ok(ack) => saved_text(&ack),
            Err(DomainError::Validation(reason)) => {
                info!(reason = %reason, "malformed classification reply");
                format!("Wrong format.\n{}", REPLY_USAGE)
            }
            Err(DomainError::NoPending) => "No transaction is waiting for a note.".to_string(),
            Err(e) => {
                warn!(error = %e, "could not save classification");
                "Could not save your reply, please try again.".to_string()
            }
        }
    }

    async fn on_command(&self, command: Command) -> Option<String> {
        let reply = match command {
            Command::Start => {
                "Hi! I forward your bank notifications here so you can note what each \
                 transaction was for. Send /help to see the commands."
                    .to_string()
            }
            Command::Help => HELP.to_string(),
            Command::Reset => self.reset().await,
            Command::Check => return self.check().await,
            Command::CheckOutlay => self.check_outlay().await,
            Command::Report(month, year) => {
                self.report(month.as_deref(), year.as_deref()).await
            }
            Command::Unknown => INVALID_COMMAND.to_string(),
        };
        Some(reply)
    }

    async fn reset(&self) -> String {
        if let Some(prev) = self.handshake.reset().await {
            info!(message_id = %prev.record.message_id, "pending transaction dropped by reset");
        }
        match self.repo.count_unacknowledged().await {
            Ok(n) => format!(
                "Bot has been reset.\n{} transaction(s) still waiting for a note.",
                n
            ),
            Err(e) => {
                warn!(error = %e, "count after reset failed");
                "Bot has been reset.".to_string()
            }
        }
    }

    /// A notification sent by the tick is the answer, so nothing more is said then.
    async fn check(&self) -> Option<String> {
        match self.handshake.tick(TickMode::Forced).await {
            Ok(TickOutcome::Notified(_)) | Ok(TickOutcome::Resent(_)) => None,
            Ok(TickOutcome::NothingNew) => Some("No new transactions.".to_string()),
            Ok(TickOutcome::StillAwaiting(_)) => {
                Some("Still waiting for your reply to the last transaction.".to_string())
            }
            Err(e) => {
                warn!(error = %e, "manual check failed");
                Some(format!("Could not check mail: {}", e))
            }
        }
    }

    async fn check_outlay(&self) -> String {
        match monthly_expense_total(&*self.repo, YearMonth::current()).await {
            Ok(total) => format!("Spent this month: {} VND", grouped(total.abs())),
            Err(e) => {
                warn!(error = %e, "monthly total failed");
                "Could not read the monthly total.".to_string()
            }
        }
    }

    async fn report(&self, month: Option<&str>, year: Option<&str>) -> String {
        let Some(period) = report_period(month, year, YearMonth::current()) else {
            return "Usage: /report <month> [year], e.g. /report 3 or /report 3 2025".to_string();
        };
        let totals = match self.repo.category_totals(period).await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, %period, "report query failed");
                return "Could not build the report.".to_string();
            }
        };
        if totals.is_empty() {
            return format!("No classified transactions in {}.", period);
        }

        let mut out = format!("Report for {}:\n", period);
        let mut net = 0.0;
        for t in &totals {
            net += t.total;
            out.push_str(&format!(
                "\n{}: {} VND ({}, {} transaction(s))",
                t.category,
                grouped(t.total.abs()),
                direction(t.total),
                t.count
            ));
            for note in &t.notes {
                out.push_str(&format!("\n  - {}", note));
            }
        }
        out.push_str(&format!(
            "\n\nNet: {} VND ({})",
            grouped(net.abs()),
            direction(net)
        ));
        out
    }
}

/// Month 1-12 and an optional year. Without a year, the latest such month up to `now`.
fn report_period(month: Option<&str>, year: Option<&str>, now: YearMonth) -> Option<YearMonth> {
    let month = month?.parse::<u32>().ok().filter(|m| (1..=12).contains(m))?;
    match year {
        Some(y) => {
            let year = y.parse::<i32>().ok().filter(|y| (2000..=9999).contains(y))?;
            Some(YearMonth { year, month })
        }
        None => Some(now.latest_with_month(month)),
    }
}

fn direction(total: f64) -> &'static str {
    if total < 0.0 { "spent" } else { "received" }
}

fn saved_text(ack: &Acknowledged) -> String {
    let mut text = format!(
        "Saved.\nCategory: {}\nNote: {}",
        ack.record.category,
        ack.record.note.as_deref().unwrap_or_default()
    );
    if let Some(total) = ack.month_expense {
        text.push_str(&format!("\nSpent this month: {} VND", grouped(total.abs())));
    }
    text
}

#[async_trait::async_trait]
impl CommandPort for ChatCommandResponder {
    async fn handle(&self, message: InboundMessage) -> Option<String> {
        if message.chat_id != self.chat_id {
            warn!(chat_id = message.chat_id, "message from unknown chat ignored");
            return None;
        }
        if message.reply_to.is_some() {
            return Some(self.on_reply(&message.text).await);
        }
        self.on_command(parse_command(&message.text)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResendPolicy;
    use crate::usecases::handshake::HandshakeState;
    use crate::usecases::test_support::{CHAT_ID, Harness, harness};

    const DEBIT_MAIL: &str = "Tài khoản vừa giảm 1.234.567 VND. Mô tả: QUAN PHO";

    fn responder(h: &Harness) -> ChatCommandResponder {
        ChatCommandResponder::new(h.handshake.clone(), h.repo.clone(), CHAT_ID)
    }

    fn msg(text: &str) -> InboundMessage {
        InboundMessage {
            chat_id: CHAT_ID,
            text: text.into(),
            reply_to: None,
        }
    }

    fn reply(text: &str) -> InboundMessage {
        InboundMessage {
            reply_to: Some("Your account was debited".into()),
            ..msg(text)
        }
    }

    #[test]
    fn test_parse_command_variants() {
        assert_eq!(parse_command("/check"), Command::Check);
        assert_eq!(parse_command("/check_bot@outlay_bot"), Command::Check);
        assert_eq!(parse_command("Reset-bot"), Command::Reset);
        assert_eq!(parse_command("/CHECK_OUTLAY"), Command::CheckOutlay);
        assert_eq!(
            parse_command("/report 3"),
            Command::Report(Some("3".into()), None)
        );
        assert_eq!(
            parse_command("/report 3 2025"),
            Command::Report(Some("3".into()), Some("2025".into()))
        );
        assert_eq!(parse_command("/report"), Command::Report(None, None));
        assert_eq!(parse_command("hello there"), Command::Unknown);
        assert_eq!(parse_command(""), Command::Unknown);
    }

    #[test]
    fn test_report_period() {
        let now = YearMonth {
            year: 2027,
            month: 1,
        };
        assert_eq!(
            report_period(Some("3"), None, now),
            Some(YearMonth {
                year: 2026,
                month: 3
            })
        );
        assert_eq!(
            report_period(Some("3"), Some("2025"), now),
            Some(YearMonth {
                year: 2025,
                month: 3
            })
        );
        assert_eq!(report_period(Some("0"), None, now), None);
        assert_eq!(report_period(Some("3"), Some("25"), now), None);
        assert_eq!(report_period(None, None, now), None);
    }

    #[tokio::test]
    async fn test_other_chat_is_ignored() {
        let h = harness(&[("m1", DEBIT_MAIL)], ResendPolicy::Skip).await;
        let r = responder(&h);
        let foreign = InboundMessage {
            chat_id: 42,
            ..msg("/check")
        };
        assert_eq!(r.handle(foreign).await, None);
        assert_eq!(h.mail.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_help() {
        let h = harness(&[], ResendPolicy::Skip).await;
        let r = responder(&h);
        assert_eq!(
            r.handle(msg("what")).await.as_deref(),
            Some(INVALID_COMMAND)
        );
        let help = r.handle(msg("/help")).await.unwrap();
        assert!(help.contains("/check_outlay"));
        assert!(help.contains("CATEGORY - note"));
    }

    #[tokio::test]
    async fn test_check_notifies_then_reply_saves() {
        let h = harness(&[("m1", DEBIT_MAIL)], ResendPolicy::Skip).await;
        let r = responder(&h);

        assert_eq!(r.handle(msg("/check")).await, None);
        assert_eq!(h.chat.sent().len(), 1);

        let saved = r.handle(reply("ăn uống - phở bò")).await.unwrap();
        assert!(saved.starts_with("Saved."));
        assert!(saved.contains("Category: AN_UONG"));
        assert!(saved.contains("Note: phở bò"));
        assert!(saved.contains("Spent this month: 1,234,567 VND"));
        assert_eq!(h.handshake.state().await, HandshakeState::Idle);

        let outlay = r.handle(msg("/check_outlay")).await.unwrap();
        assert_eq!(outlay, "Spent this month: 1,234,567 VND");

        assert_eq!(
            r.handle(msg("/check")).await.as_deref(),
            Some("No new transactions.")
        );
    }

    #[tokio::test]
    async fn test_malformed_reply_shows_usage() {
        let h = harness(&[("m1", DEBIT_MAIL)], ResendPolicy::Skip).await;
        let r = responder(&h);
        r.handle(msg("/check")).await;

        let out = r.handle(reply("invalid text")).await.unwrap();
        assert!(out.starts_with("Wrong format."));
        assert!(out.contains(REPLY_USAGE));
        assert!(h.handshake.state().await.pending().is_some());
    }

    #[tokio::test]
    async fn test_reply_without_pending() {
        let h = harness(&[], ResendPolicy::Skip).await;
        let r = responder(&h);
        assert_eq!(
            r.handle(reply("a - b")).await.as_deref(),
            Some("No transaction is waiting for a note.")
        );
    }

    #[tokio::test]
    async fn test_reset_reports_waiting_count() {
        let h = harness(
            &[("m1", DEBIT_MAIL), ("m2", "vừa tăng 10.000 VND")],
            ResendPolicy::Skip,
        )
        .await;
        let r = responder(&h);
        r.handle(msg("/check")).await;

        let out = r.handle(msg("/reset_bot")).await.unwrap();
        assert!(out.contains("2 transaction(s) still waiting"));
        assert_eq!(h.handshake.state().await, HandshakeState::Idle);
    }

    #[tokio::test]
    async fn test_report() {
        let h = harness(&[("m1", DEBIT_MAIL)], ResendPolicy::Skip).await;
        let r = responder(&h);
        assert!(r.handle(msg("/report 13")).await.unwrap().starts_with("Usage"));
        assert!(r.handle(msg("/report")).await.unwrap().starts_with("Usage"));

        r.handle(msg("/check")).await;
        r.handle(reply("an uong - pho")).await;

        let month = YearMonth::current().month;
        let out = r.handle(msg(&format!("/report {}", month))).await.unwrap();
        assert!(out.contains("AN_UONG: 1,234,567 VND (spent, 1 transaction(s))"));
        assert!(out.contains("  - pho"));
        assert!(out.ends_with("Net: 1,234,567 VND (spent)"));

        let other = month % 12 + 1;
        let empty = r.handle(msg(&format!("/report {}", other))).await.unwrap();
        assert!(empty.starts_with("No classified transactions"));
    }
}
