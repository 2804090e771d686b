// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! StreamGuard - cancellation-safe cursor streaming
//!
//! StreamGuard streams rows from a database cursor through a per-record
//! transform into an HTTP-style response, and guarantees that the pooled
//! connection and its cursor are released on every way a stream can end.
//!
//! # Features
//!
//! - **Exactly-once cleanup**: completion, source errors, transform errors,
//!   client disconnects and panics all return the connection to the pool
//! - **Bounded buffering**: one cursor batch and one bounded response channel
//! - **Failure injection**: each transform failure style can be switched on
//!   to exercise the cleanup paths
//! - **Leak detection**: a follow-up DDL request needs an exclusive table lock
//!   and times out if a cursor was leaked
//!
//! # Usage
//!
//! ```bash
//! streamguard --transform-callback-error
//! streamguard --abort-request --pool-size 1 -v
//! ```

pub mod bootstrap;
pub mod config;
pub mod pipeline;
pub mod server;
pub mod storage;

pub use config::{ConfigError, FailureInjection, PipelineConfig, StorageConfig, StreamGuardConfig};
pub use pipeline::{
    FatalFault, PipelineError, ResponseBody, SessionOutcome, SessionReport, SessionState,
    TransformMode,
};
pub use server::{ServerError, SessionHandle, StreamServer};
pub use storage::{Database, PoolStatus, SourceError};

/// StreamGuard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// StreamGuard crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
