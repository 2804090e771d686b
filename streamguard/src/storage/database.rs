// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Database handle: table catalog plus connection pool

use super::connection::Connection;
use super::error::{SourceError, SourceResult};
use super::pool::{ConnectionPool, PoolStatus};
use super::types::{Record, TableSchema};
use crate::config::StorageConfig;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock as TableLock;

/// Rows of one table, guarded by the table lock
#[derive(Debug, Default)]
pub(crate) struct TableData {
    pub(crate) rows: Vec<Record>,
    keys: HashSet<String>,
    /// Set once the table has been dropped; late readers must not see it
    pub(crate) dropped: bool,
}

impl TableData {
    fn insert_all(&mut self, table: &str, records: Vec<Record>) -> SourceResult<usize> {
        let mut batch_keys = HashSet::with_capacity(records.len());
        for record in &records {
            if self.keys.contains(&record.id) || !batch_keys.insert(record.id.as_str()) {
                return Err(SourceError::DuplicateKey {
                    table: table.to_string(),
                    key: record.id.clone(),
                });
            }
        }

        let count = records.len();
        for record in records {
            self.keys.insert(record.id.clone());
            self.rows.push(record);
        }
        Ok(count)
    }
}

pub(crate) struct Table {
    pub(crate) schema: TableSchema,
    pub(crate) data: Arc<TableLock<TableData>>,
}

impl Table {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            data: Arc::new(TableLock::new(TableData::default())),
        }
    }
}

/// Table registry shared by every connection
#[derive(Default)]
pub(crate) struct Catalog {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Catalog {
    pub(crate) fn table(&self, name: &str) -> SourceResult<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::TableNotFound(name.to_string()))
    }

    /// Drop `schema.name` if it exists, then create it empty.
    ///
    /// Dropping needs the exclusive table lock, which is only granted once
    /// every cursor over the old table has been closed.
    pub(crate) async fn recreate(&self, schema: &TableSchema) {
        let existing = self.tables.read().get(&schema.name).cloned();

        let exclusive = match existing {
            Some(table) => {
                log::debug!("Waiting for exclusive lock on '{}'", schema.name);
                let mut guard = table.data.clone().write_owned().await;
                guard.dropped = true;
                Some(guard)
            }
            None => None,
        };

        self.tables
            .write()
            .insert(schema.name.clone(), Arc::new(Table::new(schema.clone())));
        drop(exclusive);
        log::info!("Recreated table '{}'", schema.name);
    }

    pub(crate) async fn insert(&self, table: &str, records: Vec<Record>) -> SourceResult<usize> {
        let table = self.table(table)?;
        let mut data = table.data.write().await;
        if data.dropped {
            return Err(SourceError::TableNotFound(table.schema.name.clone()));
        }
        data.insert_all(&table.schema.name, records)
    }

    pub(crate) async fn select_all(&self, table: &str) -> SourceResult<Vec<Record>> {
        let table = self.table(table)?;
        let data = table.data.read().await;
        if data.dropped {
            return Err(SourceError::TableNotFound(table.schema.name.clone()));
        }
        Ok(data.rows.clone())
    }
}

/// An open database: catalog plus a bounded connection pool
///
/// # Examples
///
/// ```ignore
/// let db = Database::open(StorageConfig::default());
/// let mut conn = db.acquire().await?;
/// let mut cursor = conn.query(&Query::scan("test")).await?;
/// while let Some(batch) = cursor.next_batch().await? {
///     // ...
/// }
/// cursor.close();
/// conn.release();
/// ```
pub struct Database {
    catalog: Arc<Catalog>,
    pool: ConnectionPool,
    config: StorageConfig,
}

impl Database {
    /// Create an empty database with a pool sized by `config`
    pub fn open(config: StorageConfig) -> Arc<Self> {
        log::info!(
            "Opening database with a pool of {} connections",
            config.pool_size
        );
        Arc::new(Self {
            catalog: Arc::new(Catalog::default()),
            pool: ConnectionPool::new(config.pool_size, config.acquire_timeout()),
            config,
        })
    }

    /// Lease a connection, waiting at most the configured acquire timeout
    pub async fn acquire(&self) -> SourceResult<Connection> {
        let lease = self.pool.lease().await?;
        Ok(Connection::new(
            lease,
            self.catalog.clone(),
            self.config.fetch_size,
            self.config.fetch_delay(),
        ))
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Refuse further leases. Connections already out stay valid.
    pub fn shutdown(&self) {
        log::info!("Shutting down connection pool");
        self.pool.close();
    }
}
