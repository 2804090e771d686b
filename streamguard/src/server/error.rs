// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Server error types

use crate::storage::SourceError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by request routes other than the streaming export
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Source(#[from] SourceError),

    /// The exclusive table lock was not granted in time, which means some
    /// earlier session still holds a cursor on the table
    #[error("Re-initializing table '{table}' timed out after {}ms", .after.as_millis())]
    ReinitializeTimedOut { table: String, after: Duration },

    #[error("Table '{table}' still has {rows} rows after re-initialization")]
    NotEmpty { table: String, rows: usize },
}

pub type ServerResult<T> = Result<T, ServerError>;
