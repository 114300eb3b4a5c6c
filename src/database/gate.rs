//! Single-writer gate
//!
//! SQLite allows one writer at a time. Funnelling every write transaction
//! through one async lock keeps concurrent writers from running into
//! `SQLITE_BUSY` while readers keep using their own pooled connections.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{DbError, Result};

#[derive(Debug)]
pub(crate) struct WriteGate {
    lock: Mutex<()>,
    timeout: Duration,
}

impl WriteGate {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            timeout,
        }
    }

    /// Wait for exclusive write access
    pub(crate) async fn enter(&self) -> Result<MutexGuard<'_, ()>> {
        if let Ok(guard) = self.lock.try_lock() {
            return Ok(guard);
        }
        debug!("Waiting for pending write transaction");
        tokio::time::timeout(self.timeout, self.lock.lock())
            .await
            .map_err(|_| DbError::WriteTimeout {
                millis: self.timeout.as_millis() as u64,
            })
    }
}
