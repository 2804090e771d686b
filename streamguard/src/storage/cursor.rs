// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Server-side cursors

use super::database::TableData;
use super::error::{SourceError, SourceResult};
use super::types::Record;
use std::time::Duration;
use tokio::sync::OwnedRwLockReadGuard;

/// Incremental reader over one table
///
/// Holds a shared lock on the table while open. Each fetch returns at most
/// `fetch_size` rows and costs one storage round trip (`fetch_delay`).
pub struct Cursor {
    id: u64,
    table: String,
    data: Option<OwnedRwLockReadGuard<TableData>>,
    position: usize,
    fetch_size: usize,
    fetch_delay: Duration,
}

impl Cursor {
    pub(crate) fn new(
        id: u64,
        table: String,
        data: OwnedRwLockReadGuard<TableData>,
        fetch_size: usize,
        fetch_delay: Duration,
    ) -> Self {
        Self {
            id,
            table,
            data: Some(data),
            position: 0,
            fetch_size: fetch_size.max(1),
            fetch_delay,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.data.is_none()
    }

    /// Fetch the next batch, or `None` once the result set is exhausted
    pub async fn next_batch(&mut self) -> SourceResult<Option<Vec<Record>>> {
        if self.is_closed() {
            return Err(SourceError::CursorClosed(self.id));
        }
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        let data = self
            .data
            .as_ref()
            .ok_or(SourceError::CursorClosed(self.id))?;
        if self.position >= data.rows.len() {
            return Ok(None);
        }

        let end = (self.position + self.fetch_size).min(data.rows.len());
        let batch = data.rows[self.position..end].to_vec();
        log::trace!(
            "Cursor {} fetched rows {}..{} of '{}'",
            self.id,
            self.position,
            end,
            self.table
        );
        self.position = end;
        Ok(Some(batch))
    }

    /// End the cursor and drop its table lock. Idempotent.
    pub fn close(&mut self) -> bool {
        match self.data.take() {
            Some(_) => {
                log::debug!(
                    "Closed cursor {} on '{}' after {} rows",
                    self.id,
                    self.table,
                    self.position
                );
                true
            }
            None => false,
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if !self.is_closed() {
            log::warn!("Cursor {} on '{}' dropped while open", self.id, self.table);
            self.close();
        }
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("table", &self.table)
            .field("position", &self.position)
            .field("closed", &self.is_closed())
            .finish()
    }
}
