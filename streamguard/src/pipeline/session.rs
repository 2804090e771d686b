// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session state machine and reporting

use super::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Lifecycle of one pipeline session
///
/// `Idle -> Streaming -> {Completed, Failed, Cancelled}`. A session reaches
/// at most one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Idle, SessionState::Streaming)
                | (SessionState::Idle, SessionState::Failed)
                | (SessionState::Idle, SessionState::Cancelled)
                | (SessionState::Streaming, SessionState::Completed)
                | (SessionState::Streaming, SessionState::Failed)
                | (SessionState::Streaming, SessionState::Cancelled)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Streaming => "streaming",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Why a session was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CancelReason {
    /// The scope was cancelled, normally by the request lifecycle hook
    ScopeCancelled,
    /// A write found the sink closed by the remote peer
    SinkClosed,
}

/// Terminal outcome of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed(PipelineError),
    Cancelled(CancelReason),
}

impl SessionOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            SessionOutcome::Completed => SessionState::Completed,
            SessionOutcome::Failed(_) => SessionState::Failed,
            SessionOutcome::Cancelled(_) => SessionState::Cancelled,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            SessionOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub records_read: u64,
    pub records_transformed: u64,
    pub chunks_written: u64,
}

/// What happened to one session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: String,
    pub outcome: SessionOutcome,
    pub stats: SessionStats,
    /// The source's connection and cursor were released
    pub source_closed: bool,
    /// The request lifecycle hook saw the client disconnect
    pub client_disconnected: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    /// Report for a session that ended before it started streaming
    pub fn unstarted(
        session_id: impl Into<String>,
        outcome: SessionOutcome,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            outcome,
            stats: SessionStats::default(),
            source_closed: true,
            client_disconnected: false,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.outcome.state()
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
