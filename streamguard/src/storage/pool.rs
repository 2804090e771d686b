// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Bounded connection pool
//!
//! Each leased connection owns one semaphore permit. Returning the permit is
//! the only way a slot becomes available again, so a lease that is never
//! released permanently shrinks the pool.

use super::error::{SourceError, SourceResult};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Configured number of connections
    pub size: usize,
    /// Connections available for lease
    pub idle: usize,
    /// Connections currently leased
    pub outstanding: usize,
    /// Leases handed out since the pool was created
    pub acquired_total: u64,
    /// Leases returned since the pool was created
    pub released_total: u64,
}

impl PoolStatus {
    /// True when every lease handed out has been returned
    pub fn is_balanced(&self) -> bool {
        self.outstanding == 0 && self.acquired_total == self.released_total
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    acquired: AtomicU64,
    released: AtomicU64,
}

pub(crate) struct ConnectionPool {
    size: usize,
    permits: Arc<Semaphore>,
    counters: Arc<PoolCounters>,
    acquire_timeout: Duration,
    next_id: AtomicU64,
}

impl ConnectionPool {
    pub(crate) fn new(size: usize, acquire_timeout: Duration) -> Self {
        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            counters: Arc::new(PoolCounters::default()),
            acquire_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Wait for a free slot, at most `acquire_timeout`
    pub(crate) async fn lease(&self) -> SourceResult<Lease> {
        let acquire = self.permits.clone().acquire_owned();
        let permit = match tokio::time::timeout(self.acquire_timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(SourceError::PoolClosed),
            Err(_) => {
                log::warn!(
                    "No connection became available within {:?} ({} of {} leased)",
                    self.acquire_timeout,
                    self.size - self.permits.available_permits(),
                    self.size
                );
                return Err(SourceError::PoolTimeout {
                    waited_ms: self.acquire_timeout.as_millis() as u64,
                });
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        log::debug!("Leased connection {}", id);

        Ok(Lease {
            id,
            permit: Some(permit),
            counters: self.counters.clone(),
        })
    }

    pub(crate) fn status(&self) -> PoolStatus {
        let idle = self.permits.available_permits().min(self.size);
        PoolStatus {
            size: self.size,
            idle,
            outstanding: self.size - idle,
            acquired_total: self.counters.acquired.load(Ordering::SeqCst),
            released_total: self.counters.released.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn close(&self) {
        self.permits.close();
    }
}

/// One leased pool slot
pub(crate) struct Lease {
    id: u64,
    permit: Option<OwnedSemaphorePermit>,
    counters: Arc<PoolCounters>,
}

impl Lease {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_released(&self) -> bool {
        self.permit.is_none()
    }

    /// Return the slot to the pool. Only the first call has an effect.
    pub(crate) fn release(&mut self) -> bool {
        match self.permit.take() {
            Some(permit) => {
                drop(permit);
                self.counters.released.fetch_add(1, Ordering::SeqCst);
                log::debug!("Released connection {}", self.id);
                true
            }
            None => false,
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.is_released() {
            log::warn!(
                "Connection {} dropped without release; returning it to the pool",
                self.id
            );
            self.release();
        }
    }
}
