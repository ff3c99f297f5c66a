mod row;

pub use row::Row;

use async_trait::async_trait;
use rusqlite::{Connection, InterruptHandle};
use rusqlite::types::ValueRef;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::core::error::FetchError;

/// Anything that can turn a SQL string into materialized rows.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_rows(&self, query: &str) -> Result<Vec<Row>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: usize,
    pub max_lifetime: Duration,
    pub query_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            max_lifetime: Duration::from_secs(180),
            query_timeout: Duration::from_secs(30),
        }
    }
}

struct PooledConnection {
    conn: Connection,
    opened_at: Instant,
}

/// Bounded SQLite connection pool.
///
/// Connections are opened on first use and recycled afterwards. When all
/// `max_connections` permits are taken, further borrowers wait in line for a
/// permit instead of failing.
pub struct ConnectionPool {
    dsn: String,
    options: PoolOptions,
    permits: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<PooledConnection>>>,
}

impl ConnectionPool {
    pub fn new(dsn: impl Into<String>, options: PoolOptions) -> Self {
        let max = options.max_connections.max(1);
        Self {
            dsn: dsn.into(),
            options,
            permits: Arc::new(Semaphore::new(max)),
            idle: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Borrows a connection and runs `SELECT 1` to verify the DSN.
    pub async fn ping(&self) -> Result<(), FetchError> {
        let rows = self.fetch_rows("SELECT 1 AS ok").await?;
        info!(
            "Database reachable at {} ({} row)",
            self.dsn,
            rows.len()
        );
        Ok(())
    }

    #[cfg(test)]
    fn idle_connections(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl RowSource for ConnectionPool {
    /// Waits for a free connection without a deadline, then bounds the
    /// query itself by `query_timeout`. An expired query is interrupted so
    /// its connection and permit come back to the pool.
    async fn fetch_rows(&self, query: &str) -> Result<Vec<Row>, FetchError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| FetchError::Pool(e.to_string()))?;

        let idle = self.idle.clone();
        let dsn = self.dsn.clone();
        let max_lifetime = self.options.max_lifetime;
        let query = query.to_string();
        let interrupt: Arc<Mutex<Option<InterruptHandle>>> = Arc::new(Mutex::new(None));
        let interrupt_slot = interrupt.clone();

        let task = tokio::task::spawn_blocking(move || {
            // Held until the blocking query finishes, even if the caller timed out.
            let _permit = permit;
            let pooled = checkout(&idle, &dsn)?;
            *interrupt_slot.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(pooled.conn.get_interrupt_handle());
            let result = run_query(&pooled.conn, &query);
            interrupt_slot.lock().unwrap_or_else(|e| e.into_inner()).take();
            checkin(&idle, pooled, max_lifetime);
            result
        });

        let timeout = self.options.query_timeout;
        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => {
                joined.map_err(|e| FetchError::Pool(format!("query task failed: {}", e)))?
            }
            Err(_) => {
                if let Some(handle) = interrupt.lock().unwrap_or_else(|e| e.into_inner()).take() {
                    handle.interrupt();
                }
                warn!("Query exceeded {:?}, interrupted", timeout);
                Err(FetchError::Timeout(timeout))
            }
        }
    }
}

fn checkout(idle: &Mutex<Vec<PooledConnection>>, dsn: &str) -> Result<PooledConnection, FetchError> {
    let reused = idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
    if let Some(pooled) = reused {
        return Ok(pooled);
    }

    debug!("Opening new database connection to {}", dsn);
    let conn = Connection::open(dsn).map_err(|e| FetchError::Pool(e.to_string()))?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| FetchError::Pool(e.to_string()))?;
    Ok(PooledConnection {
        conn,
        opened_at: Instant::now(),
    })
}

fn checkin(idle: &Mutex<Vec<PooledConnection>>, pooled: PooledConnection, max_lifetime: Duration) {
    if pooled.opened_at.elapsed() >= max_lifetime {
        debug!("Dropping connection past its max lifetime");
        return;
    }
    idle.lock().unwrap_or_else(|e| e.into_inner()).push(pooled);
}

/// Executes `query` and materializes every row before returning.
pub(crate) fn run_query(conn: &Connection, query: &str) -> Result<Vec<Row>, FetchError> {
    let mut stmt = conn.prepare(query).map_err(FetchError::Query)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = stmt.query([]).map_err(FetchError::Query)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(FetchError::Query)? {
        let mut record = Row::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            let value = row.get_ref(idx).map_err(|source| FetchError::Scan {
                column: column.clone(),
                source,
            })?;
            record.set(column.as_str(), value_to_text(value));
        }
        records.push(record);
    }
    Ok(records)
}

fn value_to_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}
