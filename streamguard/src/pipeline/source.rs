// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Row sources
//!
//! A row source hands out one record per `next()` call and buffers at most one
//! cursor batch, so nothing upstream of the pipeline grows without bound.

use crate::storage::{Connection, Cursor, Database, Query, Record, SourceError, SourceResult};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Pull-based, closable producer of records
///
/// `next()` may be abandoned at any suspension point by dropping its future;
/// `close()` must then still release everything the source holds.
#[async_trait]
pub trait RowSource: Send {
    /// Next record, or `None` at end of stream
    async fn next(&mut self) -> SourceResult<Option<Record>>;

    /// Release the cursor and connection
    ///
    /// Idempotent: calls after the first return `Ok(())` without effect.
    async fn close(&mut self) -> SourceResult<()>;

    fn is_closed(&self) -> bool;
}

/// Row source backed by a server-side cursor on a pooled connection
///
/// Owns both the connection and the cursor. `close()` ends the cursor
/// before returning the connection; dropping an unclosed source does the
/// same, so an unwinding task cannot strand either one.
pub struct CursorSource {
    cursor: Cursor,
    connection: Connection,
    buffer: VecDeque<Record>,
    exhausted: bool,
    closed: bool,
}

impl CursorSource {
    /// Lease a connection from `database` and open a cursor for `query`
    pub async fn open(database: &Database, query: &Query) -> SourceResult<Self> {
        let mut connection = database.acquire().await?;
        let cursor = match connection.query(query).await {
            Ok(cursor) => cursor,
            Err(e) => {
                connection.release();
                return Err(e);
            }
        };

        log::debug!(
            "Opened cursor {} on connection {}",
            cursor.id(),
            connection.id()
        );
        Ok(Self {
            cursor,
            connection,
            buffer: VecDeque::new(),
            exhausted: false,
            closed: false,
        })
    }

    pub fn connection_id(&self) -> u64 {
        self.connection.id()
    }

    fn release_all(&mut self) {
        self.closed = true;
        self.buffer.clear();
        self.cursor.close();
        self.connection.release();
    }
}

#[async_trait]
impl RowSource for CursorSource {
    async fn next(&mut self) -> SourceResult<Option<Record>> {
        loop {
            if self.closed {
                return Err(SourceError::CursorClosed(self.cursor.id()));
            }
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            if self.exhausted {
                return Ok(None);
            }

            match self.cursor.next_batch().await? {
                Some(batch) => self.buffer.extend(batch),
                None => self.exhausted = true,
            }
        }
    }

    async fn close(&mut self) -> SourceResult<()> {
        if self.closed {
            return Ok(());
        }
        log::debug!(
            "Closing cursor {} and releasing connection {}",
            self.cursor.id(),
            self.connection.id()
        );
        self.release_all();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for CursorSource {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!(
                "Row source on connection {} dropped without close; releasing",
                self.connection.id()
            );
            self.release_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::storage::TableSchema;
    use std::sync::Arc;

    async fn database_with_rows(ids: &[&str]) -> Arc<Database> {
        let db = Database::open(StorageConfig {
            pool_size: 1,
            acquire_timeout_ms: 50,
            fetch_size: 2,
            fetch_delay_ms: 0,
        });
        let mut conn = db.acquire().await.unwrap();
        conn.recreate_table(&TableSchema::keyed_by_id("test"))
            .await
            .unwrap();
        conn.insert("test", ids.iter().map(|id| Record::new(*id)).collect())
            .await
            .unwrap();
        conn.release();
        db
    }

    #[tokio::test]
    async fn test_yields_records_across_batches() {
        let db = database_with_rows(&["a", "b", "c"]).await;
        let mut source = CursorSource::open(&db, &Query::scan("test")).await.unwrap();

        let mut seen = Vec::new();
        while let Some(record) = source.next().await.unwrap() {
            seen.push(record.id);
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(source.next().await.unwrap(), None);

        source.close().await.unwrap();
        assert!(db.pool_status().is_balanced());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_after_partial_read() {
        let db = database_with_rows(&["a", "b", "c"]).await;
        let mut source = CursorSource::open(&db, &Query::scan("test")).await.unwrap();
        assert_eq!(source.next().await.unwrap(), Some(Record::new("a")));

        source.close().await.unwrap();
        source.close().await.unwrap();
        assert!(source.is_closed());
        assert!(matches!(
            source.next().await,
            Err(SourceError::CursorClosed(_))
        ));

        let status = db.pool_status();
        assert_eq!(status.acquired_total, status.released_total);
        assert!(status.is_balanced());
    }

    #[tokio::test]
    async fn test_drop_releases_connection() {
        let db = database_with_rows(&["a"]).await;
        {
            let _source = CursorSource::open(&db, &Query::scan("test")).await.unwrap();
            assert_eq!(db.pool_status().outstanding, 1);
        }
        assert!(db.pool_status().is_balanced());
    }

    #[tokio::test]
    async fn test_failed_open_returns_connection() {
        let db = database_with_rows(&[]).await;
        let err = CursorSource::open(&db, &Query::scan("missing"))
            .await
            .err()
            .unwrap();
        assert_eq!(err, SourceError::TableNotFound("missing".to_string()));
        assert!(db.pool_status().is_balanced());
    }
}
