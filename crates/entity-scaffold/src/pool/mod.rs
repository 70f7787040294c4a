//! Bounded, thread-safe reuse of open database connections.
//!
//! The pool keeps one FIFO queue of idle connections per connection string,
//! under a single total-count ceiling. All queue and counter mutation happens
//! under one mutex; network I/O (open, validation, close) happens outside it.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, ScaffoldError};

/// Default total-connection ceiling.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// A connection the pool knows how to open, validate and dispose.
#[async_trait]
pub trait ManagedConnection: Send + Sized + 'static {
    /// Open a new connection for the given connection string.
    async fn open(connection_string: &str) -> Result<Self>;

    /// Cheap liveness probe, run before a pooled connection is reused.
    async fn ping(&mut self) -> Result<()>;

    /// Dispose the connection.
    async fn close(self) -> Result<()>;

    /// The connection string this connection was opened with; identifies the
    /// owning queue.
    fn connection_string(&self) -> &str;
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatistics {
    /// Connections currently alive (idle + checked out).
    pub total: usize,
    /// Idle connections across all queues.
    pub available: usize,
    /// Total-connection ceiling.
    pub max: usize,
}

struct PoolState<C> {
    idle: HashMap<String, VecDeque<C>>,
    total: usize,
}

/// Per-connection-string FIFO pool with a total-count ceiling.
pub struct ConnectionPool<C> {
    state: Mutex<PoolState<C>>,
    max: usize,
}

impl<C: ManagedConnection> ConnectionPool<C> {
    /// Create a pool with the given ceiling. A ceiling of zero is rejected.
    pub fn new(max: usize) -> Result<Self> {
        if max == 0 {
            return Err(ScaffoldError::Config(
                "connection pool size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            state: Mutex::new(PoolState {
                idle: HashMap::new(),
                total: 0,
            }),
            max,
        })
    }

    /// Create a pool with the default ceiling.
    pub fn with_default_size() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS).expect("default pool size is non-zero")
    }

    /// Return a connection ready for use.
    ///
    /// Reuses an idle connection when one exists (revalidating it first),
    /// opens a new one while the total stays under the ceiling, and fails
    /// with a pool-exhausted error otherwise.
    pub async fn acquire(&self, connection_string: &str) -> Result<C> {
        loop {
            let reused = {
                let mut state = self.state.lock().await;
                state
                    .idle
                    .get_mut(connection_string)
                    .and_then(|queue| queue.pop_front())
            };

            let Some(mut conn) = reused else { break };

            match conn.ping().await {
                Ok(()) => return Ok(conn),
                Err(e) => {
                    debug!("Discarding dead pooled connection: {}", e);
                    let _ = conn.close().await;
                    let mut state = self.state.lock().await;
                    state.total = state.total.saturating_sub(1);
                }
            }
        }

        {
            let mut state = self.state.lock().await;
            if state.total >= self.max {
                return Err(ScaffoldError::pool(
                    format!(
                        "connection pool exhausted ({} of {} connections in use)",
                        state.total, self.max
                    ),
                    "acquiring catalog connection",
                ));
            }
            state.total += 1;
        }

        match C::open(connection_string).await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                let mut state = self.state.lock().await;
                state.total = state.total.saturating_sub(1);
                Err(e)
            }
        }
    }

    /// Return a connection to its owning queue, or dispose it when the queue
    /// is full. Disposal errors are logged and swallowed.
    pub async fn release(&self, conn: C) {
        let key = conn.connection_string().to_string();

        {
            let mut state = self.state.lock().await;
            let queue = state.idle.entry(key).or_default();
            if queue.len() < self.max {
                queue.push_back(conn);
                return;
            }
        }

        if let Err(e) = conn.close().await {
            warn!("Error disposing surplus pooled connection: {}", e);
        }
        let mut state = self.state.lock().await;
        state.total = state.total.saturating_sub(1);
    }

    /// Drain and dispose every queued connection and reset the total.
    pub async fn clear(&self) {
        let drained: Vec<C> = {
            let mut state = self.state.lock().await;
            state.total = 0;
            state
                .idle
                .drain()
                .flat_map(|(_, queue)| queue.into_iter())
                .collect()
        };

        for conn in drained {
            if let Err(e) = conn.close().await {
                debug!("Error disposing pooled connection during clear: {}", e);
            }
        }
    }

    /// Snapshot the pool counters.
    pub async fn statistics(&self) -> PoolStatistics {
        let state = self.state.lock().await;
        PoolStatistics {
            total: state.total,
            available: state.idle.values().map(VecDeque::len).sum(),
            max: self.max,
        }
    }
}
