//! Cost ledger and audio pricing
//!
//! Persists per-session spend to `SQLite` so the daily budget survives
//! restarts. The ledger has a single writer: `finalize` on session close.

use std::path::Path;

use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

/// Approximate audio tokens per second of streamed audio
pub const AUDIO_TOKENS_PER_SEC: f64 = 32.0;

/// Ledger connection pool
pub type LedgerPool = Pool<SqliteConnectionManager>;

/// Pooled ledger connection
pub type LedgerConn = PooledConnection<SqliteConnectionManager>;

/// Audio token pricing in USD per million tokens
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    /// Input (microphone) audio price
    pub input_audio_per_million: f64,

    /// Output (backend speech) audio price
    pub output_audio_per_million: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_audio_per_million: 0.70,
            output_audio_per_million: 7.00,
        }
    }
}

impl Pricing {
    /// Estimate the cost of a session from its audio durations
    #[must_use]
    pub fn estimate(&self, input_audio_sec: f64, output_audio_sec: f64) -> f64 {
        let input_tokens = input_audio_sec * AUDIO_TOKENS_PER_SEC;
        let output_tokens = output_audio_sec * AUDIO_TOKENS_PER_SEC;

        input_tokens / 1_000_000.0 * self.input_audio_per_million
            + output_tokens / 1_000_000.0 * self.output_audio_per_million
    }
}

/// `SQLite`-backed session cost ledger
#[derive(Clone)]
pub struct CostLedger {
    pool: LedgerPool,
}

impl std::fmt::Debug for CostLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostLedger").finish_non_exhaustive()
    }
}

impl CostLedger {
    /// Open (or create) the ledger at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or initialized
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(path);
        Self::from_manager(manager, 4)
    }

    /// Open an in-memory ledger (for testing)
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be initialized
    pub fn in_memory() -> Result<Self> {
        Self::from_manager(SqliteConnectionManager::memory(), 1)
    }

    fn from_manager(manager: SqliteConnectionManager, max_size: u32) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| Error::Database(e.to_string()))?;

        let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recorded_at TEXT NOT NULL,
                duration_sec REAL NOT NULL,
                cost_usd REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_day
                ON sessions (date(recorded_at));",
        )?;

        tracing::debug!("cost ledger initialized");
        Ok(Self { pool })
    }

    /// Record one finished session
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails
    pub fn record_session(&self, duration_sec: f64, cost_usd: f64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (recorded_at, duration_sec, cost_usd) VALUES (?1, ?2, ?3)",
            rusqlite::params![Utc::now().to_rfc3339(), duration_sec, cost_usd],
        )?;
        Ok(())
    }

    /// Total spend recorded today (UTC)
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn daily_total(&self) -> Result<f64> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let conn = self.conn()?;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(cost_usd), 0) FROM sessions WHERE date(recorded_at) = ?1",
            [today],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Number of sessions recorded today (UTC)
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn daily_session_count(&self) -> Result<u64> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let conn = self.conn()?;
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE date(recorded_at) = ?1",
            [today],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn conn(&self) -> Result<LedgerConn> {
        self.pool.get().map_err(|e| Error::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ledger_totals_zero() {
        let ledger = CostLedger::in_memory().unwrap();
        assert!(ledger.daily_total().unwrap().abs() < f64::EPSILON);
        assert_eq!(ledger.daily_session_count().unwrap(), 0);
    }

    #[test]
    fn records_accumulate_per_day() {
        let ledger = CostLedger::in_memory().unwrap();
        ledger.record_session(120.0, 0.05).unwrap();
        ledger.record_session(60.0, 0.03).unwrap();

        let total = ledger.daily_total().unwrap();
        assert!((total - 0.08).abs() < 1e-9, "total {total}");
        assert_eq!(ledger.daily_session_count().unwrap(), 2);
    }

    #[test]
    fn pricing_estimate_matches_rates() {
        let pricing = Pricing::default();
        // 100s in, 10s out: 3200 and 320 tokens
        let cost = pricing.estimate(100.0, 10.0);
        let expected = 3200.0 / 1e6 * 0.70 + 320.0 / 1e6 * 7.00;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_audio_costs_nothing() {
        let pricing = Pricing::default();
        assert!(pricing.estimate(0.0, 0.0).abs() < f64::EPSILON);
    }
}
