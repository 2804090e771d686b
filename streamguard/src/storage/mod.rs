// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-process database collaborator
//!
//! Implements the narrow client interface the streaming pipeline consumes:
//! a bounded connection pool, connections that run queries and DDL, and
//! server-side cursors that fetch rows in batches.
//!
//! # Architecture
//!
//! ```text
//! Database (catalog + pool)
//!     ↓ acquire()
//! Connection (leased pool slot)
//!     ↓ query()
//! Cursor (shared table lock + read position)
//! ```
//!
//! An open cursor holds a shared lock on its table until it is closed.
//! Recreating a table needs the exclusive lock, so any cursor that is never
//! closed makes the next DDL statement on that table wait forever. This is
//! the failure signature the pipeline's cleanup guarantees rule out.

pub mod connection;
pub mod cursor;
pub mod database;
pub mod error;
pub mod pool;
pub mod types;

pub use connection::Connection;
pub use cursor::Cursor;
pub use database::Database;
pub use error::{SourceError, SourceResult};
pub use pool::PoolStatus;
pub use types::{Query, Record, TableSchema};
