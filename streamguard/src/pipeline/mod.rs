// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cursor-to-response streaming pipeline
//!
//! ```text
//!            ┌──────────── cancellation scope ────────────┐
//! RowSource ─┼─> TransformStage ─> Sink (response body) ───┼─> client
//!  (cursor)  │          │ fault signal                     │
//!            └──────────┴─ Pipeline (coordinator) ─────────┘
//!                                  ▲ cancel
//!                    RequestLifecycle (client disconnect)
//! ```
//!
//! The [`Pipeline`] pulls one record at a time, so at most one record is in
//! flight between the source and the sink. Whatever ends the stream
//! (exhaustion, a source error, either transform failure channel, a closed
//! sink, or the client disconnecting) the source is closed exactly once
//! before the outcome is reported.
//!
//! A transform panic ([`TransformMode::Fatal`]) is not handled here. It
//! unwinds out of [`Pipeline::run`]; the per-request task in
//! [`crate::server`] is the boundary that observes it, and the drop path of
//! [`CursorSource`] still returns the connection.

pub mod coordinator;
pub mod error;
pub mod hook;
pub mod session;
pub mod sink;
pub mod source;
pub mod transform;

pub use coordinator::Pipeline;
pub use error::{FatalFault, PipelineError, SinkClosed, TransformError, TransformSignalError};
pub use hook::RequestLifecycle;
pub use session::{CancelReason, SessionOutcome, SessionReport, SessionState, SessionStats};
pub use sink::{
    response_channel, ClientTimeout, Disconnected, ReceivedResponse, ResponseBody, ResponseFrame,
    ResponseHead, ResponseWriter, Sink,
};
pub use source::{CursorSource, RowSource};
pub use transform::{Chunk, FaultSignal, TransformMode, TransformStage};
