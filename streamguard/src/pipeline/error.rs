// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pipeline error types

use crate::storage::SourceError;
use thiserror::Error;

/// Failure reported through the transform's per-record result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Transform rejected record '{id}': {reason}")]
    Rejected { id: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TransformError {
    fn from(error: serde_json::Error) -> Self {
        TransformError::Serialization(error.to_string())
    }
}

/// Fault raised by the transform on its side channel rather than its result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transform signalled a fault on record '{id}': {reason}")]
pub struct TransformSignalError {
    pub id: String,
    pub reason: String,
}

/// The remote end of the sink has gone away
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Sink closed by the remote peer")]
pub struct SinkClosed;

/// Recoverable pipeline failures
///
/// A closed sink is not listed here: it ends the session as cancelled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Transform fault: {0}")]
    TransformSignal(#[from] TransformSignalError),
}

/// A session task that died by panicking
///
/// Never produced inside the pipeline; the per-request task boundary
/// converts a panicked task into this value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Fatal fault in session {session_id}: {message}")]
pub struct FatalFault {
    pub session_id: String,
    pub message: String,
}
