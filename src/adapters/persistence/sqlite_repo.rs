//! SQLite-backed repository via libsql. Implements TransactionRepo and TokenStore.
//!
//! One `transactions` table keyed by provider message id; inserts use ON CONFLICT DO NOTHING
//! so a mail seen twice is reported as a constraint hit instead of overwriting a
//! classified row. The OAuth token lives in a single-row `oauth_token` table.
//! All data shares one database file: data/outlay.db

use crate::domain::{CategoryTotal, DomainError, OAuthToken, Sign, TransactionRecord, YearMonth};
use crate::ports::{TokenStore, TransactionRepo};
use chrono::{DateTime, Utc};
use libsql::{Database, Value, params};
use std::collections::HashSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    message_id TEXT PRIMARY KEY,
    amount REAL NOT NULL,
    category TEXT NOT NULL DEFAULT 'Others',
    note TEXT,
    description TEXT,
    acknowledged INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL
)"#;
const PENDING_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_transactions_pending ON transactions (acknowledged, created_at)";
const MONTH_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_transactions_month ON transactions (year, month, acknowledged)";

/// Exactly one row (id = 1); replaced on every refresh.
const OAUTH_TOKEN_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS oauth_token (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    expires_at INTEGER NOT NULL
)"#;

const RECORD_COLUMNS: &str =
    "message_id, amount, category, note, description, acknowledged, created_at, year, month";

fn repo_err(e: impl Display) -> DomainError {
    DomainError::Repo(e.to_string())
}

/// SQLite repository. One database file (outlay.db) in the given base directory.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup; the returned repo is safe to share via Arc.
    ///
    /// Sets WAL mode and synchronous=NORMAL so the poller and the chat handler can
    /// read while the other writes.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(repo_err)?;
        let db_path = base.join("outlay.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(repo_err)?;
        let conn = db.connect().map_err(repo_err)?;

        // PRAGMA returns a row (new value); use query and consume rows (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Repo(format!("{} failed: {}", pragma, e)))?;
            while rows.next().await.map_err(repo_err)?.is_some() {}
        }

        for ddl in [TRANSACTIONS_TABLE, PENDING_INDEX, MONTH_INDEX, OAUTH_TOKEN_TABLE] {
            conn.execute(ddl, ()).await.map_err(repo_err)?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db, db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<libsql::Connection, DomainError> {
        self.db.connect().map_err(repo_err)
    }

    fn row_to_record(row: &libsql::Row) -> Result<TransactionRecord, DomainError> {
        let created_ms: i64 = row.get(6).map_err(repo_err)?;
        let year: i64 = row.get(7).map_err(repo_err)?;
        let month: i64 = row.get(8).map_err(repo_err)?;
        let acknowledged: i64 = row.get(5).map_err(repo_err)?;
        Ok(TransactionRecord {
            message_id: row.get(0).map_err(repo_err)?,
            amount: value_f64(row.get_value(1).map_err(repo_err)?),
            category: row.get(2).map_err(repo_err)?,
            note: row.get::<String>(3).ok(),
            description: row.get::<String>(4).ok(),
            acknowledged: acknowledged != 0,
            created_at: from_millis(created_ms),
            year: year as i32,
            month: month as u32,
        })
    }
}

/// SUM() yields INTEGER, REAL or NULL depending on the rows; normalize to f64.
fn value_f64(v: Value) -> f64 {
    match v {
        Value::Real(f) => f,
        Value::Integer(i) => i as f64,
        _ => 0.0,
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[async_trait::async_trait]
impl TransactionRepo for SqliteRepo {
    async fn upsert_by_message_id(&self, record: &TransactionRecord) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                r#"
                INSERT INTO transactions (message_id, amount, category, note, description, acknowledged, created_at, year, month)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT (message_id) DO NOTHING
                "#,
                params![
                    record.message_id.as_str(),
                    record.amount,
                    record.category.as_str(),
                    record.note.clone(),
                    record.description.clone(),
                    record.acknowledged as i64,
                    record.created_at.timestamp_millis(),
                    record.year as i64,
                    record.month as i64
                ],
            )
            .await
            .map_err(repo_err)?;
        if changed == 0 {
            return Err(DomainError::Constraint(record.message_id.clone()));
        }
        debug!(message_id = %record.message_id, amount = record.amount, "stored transaction");
        Ok(())
    }

    async fn find_unacknowledged_oldest(&self) -> Result<Option<TransactionRecord>, DomainError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE acknowledged = 0 ORDER BY created_at ASC, message_id ASC LIMIT 1",
            RECORD_COLUMNS
        );
        let mut rows = conn.query(&sql, ()).await.map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn sum_by_month_and_sign(
        &self,
        period: YearMonth,
        sign: Sign,
    ) -> Result<f64, DomainError> {
        let predicate = match sign {
            Sign::Debit => "amount < 0",
            Sign::Credit => "amount > 0",
        };
        let sql = format!(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE year = ?1 AND month = ?2 AND acknowledged = 1 AND {}",
            predicate
        );
        let conn = self.conn()?;
        let mut rows = conn
            .query(&sql, params![period.year as i64, period.month as i64])
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(value_f64(row.get_value(0).map_err(repo_err)?)),
            None => Ok(0.0),
        }
    }

    async fn update_classification(
        &self,
        message_id: &str,
        category: &str,
        note: &str,
    ) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE transactions SET category = ?1, note = ?2, acknowledged = 1 WHERE message_id = ?3",
                params![category, note, message_id],
            )
            .await
            .map_err(repo_err)?;
        if changed == 0 {
            return Err(DomainError::NotFound(message_id.to_string()));
        }
        Ok(())
    }

    async fn find_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<TransactionRecord>, DomainError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE message_id = ?1",
            RECORD_COLUMNS
        );
        let mut rows = conn
            .query(&sql, params![message_id])
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn known_message_ids(&self, ids: &[String]) -> Result<HashSet<String>, DomainError> {
        let mut known = HashSet::new();
        if ids.is_empty() {
            return Ok(known);
        }
        let conn = self.conn()?;
        for id in ids {
            let mut rows = conn
                .query(
                    "SELECT 1 FROM transactions WHERE message_id = ?1",
                    params![id.as_str()],
                )
                .await
                .map_err(repo_err)?;
            if rows.next().await.map_err(repo_err)?.is_some() {
                known.insert(id.clone());
            }
        }
        Ok(known)
    }

    async fn count_unacknowledged(&self) -> Result<u64, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM transactions WHERE acknowledged = 0", ())
            .await
            .map_err(repo_err)?;
        match rows.next().await.map_err(repo_err)? {
            Some(row) => {
                let n: i64 = row.get(0).map_err(repo_err)?;
                Ok(n.max(0) as u64)
            }
            None => Ok(0),
        }
    }

    async fn category_totals(
        &self,
        period: YearMonth,
    ) -> Result<Vec<CategoryTotal>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT category, amount, note
                FROM transactions
                WHERE year = ?1 AND month = ?2 AND acknowledged = 1
                ORDER BY created_at ASC
                "#,
                params![period.year as i64, period.month as i64],
            )
            .await
            .map_err(repo_err)?;

        let mut totals: Vec<CategoryTotal> = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            let category: String = row.get(0).map_err(repo_err)?;
            let amount = value_f64(row.get_value(1).map_err(repo_err)?);
            let note: Option<String> = row.get::<String>(2).ok();

            let idx = match totals.iter().position(|t| t.category == category) {
                Some(i) => i,
                None => {
                    totals.push(CategoryTotal {
                        category,
                        count: 0,
                        total: 0.0,
                        notes: Vec::new(),
                    });
                    totals.len() - 1
                }
            };
            let entry = &mut totals[idx];
            entry.count += 1;
            entry.total += amount;
            if let Some(n) = note.filter(|n| !n.is_empty()) {
                entry.notes.push(n);
            }
        }
        totals.sort_by(|a, b| a.total.total_cmp(&b.total));
        Ok(totals)
    }
}

#[async_trait::async_trait]
impl TokenStore for SqliteRepo {
    async fn load_token(&self) -> Result<Option<OAuthToken>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT access_token, refresh_token, expires_at FROM oauth_token WHERE id = 1",
                (),
            )
            .await
            .map_err(repo_err)?;
        if let Some(row) = rows.next().await.map_err(repo_err)? {
            let expires_ms: i64 = row.get(2).map_err(repo_err)?;
            Ok(Some(OAuthToken {
                access_token: row.get(0).map_err(repo_err)?,
                refresh_token: row.get(1).map_err(repo_err)?,
                expires_at: from_millis(expires_ms),
            }))
        } else {
            Ok(None)
        }
    }

    async fn save_token(&self, token: &OAuthToken) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO oauth_token (id, access_token, refresh_token, expires_at)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at
            "#,
            params![
                token.access_token.as_str(),
                token.refresh_token.as_str(),
                token.expires_at.timestamp_millis()
            ],
        )
        .await
        .map_err(repo_err)?;
        Ok(())
    }
}
