pub mod migrations;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::errors::AppError;

/// Handle to the shared store. Every unit of work opens its own connection,
/// so concurrent operations (and other processes) serialize on the store's
/// locks rather than on anything held in this process.
#[derive(Clone, Debug)]
pub struct Database {
    path: Arc<str>,
    busy_timeout: Duration,
}

impl Database {
    pub fn open(path: &str, busy_timeout: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(
            path != ":memory:",
            "an in-memory database cannot be shared between connections"
        );

        let db = Self {
            path: Arc::from(path),
            busy_timeout,
        };
        let conn = db.connect().context("failed to open database")?;
        migrations::run_migrations(&conn)?;
        Ok(db)
    }

    pub fn connect(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&*self.path)?;
        configure(&conn, self.busy_timeout)?;
        Ok(conn)
    }

    /// Runs `f` on a fresh connection on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, AppError> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.connect()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| AppError::Internal(format!("database task failed: {e}")))?
    }
}

/// Opens a single connection with migrations applied. Used for `:memory:` in tests
/// and for one-off tooling.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;
    configure(&conn, Duration::from_secs(5)).context("failed to set database pragmas")?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

/// Starts a write transaction that takes the store's write lock up front.
/// Waiting for the lock is bounded by the busy timeout; exceeding it surfaces
/// as `ConcurrencyConflict`.
pub fn begin_write(conn: &mut Connection) -> Result<Transaction<'_>, AppError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn configure(conn: &Connection, busy_timeout: Duration) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
}
