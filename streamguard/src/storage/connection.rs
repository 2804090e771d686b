// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Leased database connections

use super::cursor::Cursor;
use super::database::Catalog;
use super::error::{SourceError, SourceResult};
use super::pool::Lease;
use super::types::{Query, Record, TableSchema};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_CURSOR_ID: AtomicU64 = AtomicU64::new(1);

/// A connection leased from the [`Database`](super::Database) pool
///
/// The slot goes back to the pool on [`Connection::release`]. Dropping an
/// unreleased connection also returns it, with a warning, so that unwinding
/// cannot strand a slot.
pub struct Connection {
    lease: Lease,
    catalog: Arc<Catalog>,
    fetch_size: usize,
    fetch_delay: Duration,
}

impl Connection {
    pub(crate) fn new(
        lease: Lease,
        catalog: Arc<Catalog>,
        fetch_size: usize,
        fetch_delay: Duration,
    ) -> Self {
        Self {
            lease,
            catalog,
            fetch_size,
            fetch_delay,
        }
    }

    pub fn id(&self) -> u64 {
        self.lease.id()
    }

    pub fn is_released(&self) -> bool {
        self.lease.is_released()
    }

    fn ensure_open(&self) -> SourceResult<()> {
        if self.is_released() {
            return Err(SourceError::ConnectionReleased(self.id()));
        }
        Ok(())
    }

    /// Open a server-side cursor for `query`
    ///
    /// The cursor takes a shared lock on the table and keeps it until
    /// [`Cursor::close`] is called or the cursor is dropped.
    pub async fn query(&self, query: &Query) -> SourceResult<Cursor> {
        self.ensure_open()?;
        let table = self.catalog.table(&query.table)?;
        let data = table.data.clone().read_owned().await;
        if data.dropped {
            return Err(SourceError::TableNotFound(query.table.clone()));
        }

        let cursor_id = NEXT_CURSOR_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Connection {} opened cursor {} for '{}' ({} rows)",
            self.id(),
            cursor_id,
            query,
            data.rows.len()
        );
        Ok(Cursor::new(
            cursor_id,
            query.table.clone(),
            data,
            self.fetch_size,
            self.fetch_delay,
        ))
    }

    /// Drop and create `schema`; waits for every open cursor on the table
    pub async fn recreate_table(&self, schema: &TableSchema) -> SourceResult<()> {
        self.ensure_open()?;
        self.catalog.recreate(schema).await;
        Ok(())
    }

    /// Insert `records`, rejecting the whole batch on a duplicate key
    pub async fn insert(&self, table: &str, records: Vec<Record>) -> SourceResult<usize> {
        self.ensure_open()?;
        self.catalog.insert(table, records).await
    }

    /// Materialize every row of `table`
    pub async fn select_all(&self, table: &str) -> SourceResult<Vec<Record>> {
        self.ensure_open()?;
        self.catalog.select_all(table).await
    }

    /// Return the connection to its pool
    ///
    /// Returns `true` for the call that actually released it; later calls
    /// are no-ops returning `false`.
    pub fn release(&mut self) -> bool {
        self.lease.release()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("released", &self.is_released())
            .finish()
    }
}
