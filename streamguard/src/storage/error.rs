// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Database client error types

use thiserror::Error;

/// Cursor and connection faults
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Timed out after {waited_ms} ms waiting for a pooled connection")]
    PoolTimeout { waited_ms: u64 },

    #[error("Connection pool is shut down")]
    PoolClosed,

    #[error("Connection {0} has already been released")]
    ConnectionReleased(u64),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Duplicate key '{key}' in table '{table}'")]
    DuplicateKey { table: String, key: String },

    #[error("Cursor {0} is closed")]
    CursorClosed(u64),
}

/// Result alias for database client operations
pub type SourceResult<T> = Result<T, SourceError>;
