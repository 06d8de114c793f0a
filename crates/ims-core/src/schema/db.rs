use backon::{BlockingRetryable, ExponentialBuilder};
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

use super::layout::LAYOUT;
use super::session::Session;

/// Bounded retry of whole transactions aborted by a conflicting writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; zero disables retrying.
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Connection settings for the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Longest time a statement waits for another writer's lock before the
    /// transaction is reported as a conflict.
    pub busy_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// A connection to the document store.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    options: DatabaseOptions,
}

impl Database {
    /// Open (or create) a database at the given path with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DatabaseOptions::default())
    }

    /// Open (or create) a database at the given path in WAL mode and apply
    /// the storage layout.
    ///
    /// A file database opened here is always in WAL mode, so
    /// [`Database::ensure_transactions_supported`] only rejects it if the
    /// journal mode is changed afterwards through [`Database::conn`].
    pub fn open_with(path: impl AsRef<Path>, options: DatabaseOptions) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        log::debug!("Opened database in journal mode {}", mode);
        Self::init(conn, options)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, DatabaseOptions::default())
    }

    fn init(conn: Connection, options: DatabaseOptions) -> Result<Self> {
        conn.busy_timeout(options.busy_timeout)?;
        let db = Self { conn, options };
        db.apply_layout()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub const fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.options.retry = retry;
    }

    fn apply_layout(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS storage_layout (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM storage_layout ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for step in LAYOUT {
            if !applied.contains(&step.version) {
                log::info!("Applying storage layout {} ({})", step.version, step.name);
                self.conn.execute_batch(step.sql)?;
                self.conn.execute(
                    "INSERT INTO storage_layout (version, name) VALUES (?1, ?2)",
                    rusqlite::params![step.version, step.name],
                )?;
            }
        }

        Ok(())
    }

    /// Current SQLite journal mode (`wal`, `delete`, `memory`, `off`, ...).
    pub fn journal_mode(&self) -> Result<String> {
        Ok(self
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
    }

    /// Check that multi-document transactions can be rolled back.
    ///
    /// With `journal_mode = off` SQLite cannot undo a partially applied
    /// transaction, so nothing in this crate may run against it. The mode is
    /// per connection and [`Database::open_with`] sets WAL, so this guards
    /// connections whose mode was switched after opening.
    pub fn ensure_transactions_supported(&self) -> Result<()> {
        let mode = self.journal_mode()?;
        if mode.eq_ignore_ascii_case("off") {
            return Err(Error::Configuration(format!(
                "database does not support transactions (journal_mode = {})",
                mode
            )));
        }
        Ok(())
    }

    /// Start a write transaction. The returned session rolls back when
    /// dropped without [`Session::commit`].
    pub fn transaction(&mut self, action: &str) -> Result<Session<'_>> {
        Session::begin(&mut self.conn, action, TransactionBehavior::Immediate)
    }

    /// Start a read-only transaction that sees one consistent state.
    pub fn read_transaction(&mut self, action: &str) -> Result<Session<'_>> {
        Session::begin(&mut self.conn, action, TransactionBehavior::Deferred)
    }

    /// Run `f` inside a write transaction and commit it.
    ///
    /// A transaction aborted by a conflicting writer is retried from the
    /// start, up to the configured bound. Any other error rolls back and is
    /// returned immediately.
    pub fn with_transaction<T, F>(&mut self, action: &str, mut f: F) -> Result<T>
    where
        F: FnMut(&Session<'_>) -> Result<T>,
    {
        let backoff = self.options.retry.backoff();
        let attempt = || -> Result<T> {
            let session = self.transaction(action)?;
            let value = f(&session)?;
            session.commit()?;
            Ok(value)
        };

        attempt
            .retry(backoff)
            .when(Error::is_retryable)
            .notify(|err, delay| {
                log::warn!(
                    "Write conflict while {}, retrying in {:?}: {}",
                    action,
                    delay,
                    err
                );
            })
            .call()
            .map_err(|err| match err {
                Error::TransactionConflict(cause) => {
                    Error::TransactionConflict(format!("write conflict while {}: {}", action, cause))
                }
                other => other,
            })
    }
}
