// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pipeline coordinator
//!
//! Drives records from a [`RowSource`] through a [`TransformStage`] into a
//! [`Sink`] under one cancellation scope.
//!
//! Every suspension point (cursor fetch, transform call, sink write) races
//! against the scope and the transform's fault signal, so whichever
//! component notices termination first, the loop stops at that point. All
//! terminal paths then run the same cleanup: close the source, once.

use super::error::{PipelineError, SinkClosed, TransformSignalError};
use super::session::{CancelReason, SessionOutcome, SessionReport, SessionState, SessionStats};
use super::sink::Sink;
use super::source::RowSource;
use super::transform::{FaultSignal, TransformStage};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// One session's source, transform and sink
pub struct Pipeline<S: RowSource, K: Sink> {
    session_id: String,
    source: S,
    transform: TransformStage,
    sink: K,
    scope: CancellationToken,
    state: SessionState,
    stats: SessionStats,
    source_released: bool,
}

impl<S: RowSource, K: Sink> Pipeline<S, K> {
    pub fn new(
        session_id: impl Into<String>,
        source: S,
        transform: TransformStage,
        sink: K,
        scope: CancellationToken,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            source,
            transform,
            sink,
            scope,
            state: SessionState::Idle,
            stats: SessionStats::default(),
            source_released: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Stream until a terminal outcome, release the source, answer the client
    pub async fn run(mut self) -> SessionReport {
        let started_at = Utc::now();
        self.transition(SessionState::Streaming);
        log::info!(
            "Session {} streaming ({:?} transform)",
            self.session_id,
            self.transform.mode()
        );

        let mut fault = self.transform.take_fault_signal();
        let outcome = self.stream(&mut fault).await;

        self.release_source().await;
        self.respond(&outcome).await;
        self.transition(outcome.state());
        self.log_outcome(&outcome);

        SessionReport {
            session_id: self.session_id.clone(),
            outcome,
            stats: self.stats,
            source_closed: self.source.is_closed(),
            client_disconnected: false,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn stream(&mut self, fault: &mut Option<FaultSignal>) -> SessionOutcome {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.scope.cancelled() => {
                    return SessionOutcome::Cancelled(CancelReason::ScopeCancelled);
                }
                raised = next_fault(fault) => return failed(raised),
                next = self.source.next() => next,
            };
            let record = match next {
                Ok(Some(record)) => record,
                Ok(None) => return SessionOutcome::Completed,
                Err(e) => return failed(e),
            };
            self.stats.records_read += 1;

            let transformed = tokio::select! {
                biased;
                _ = self.scope.cancelled() => {
                    return SessionOutcome::Cancelled(CancelReason::ScopeCancelled);
                }
                raised = next_fault(fault) => return failed(raised),
                transformed = self.transform.transform(record) => transformed,
            };
            let chunk = match transformed {
                Ok(chunk) => chunk,
                Err(e) => return failed(e),
            };
            self.stats.records_transformed += 1;

            let written = tokio::select! {
                biased;
                _ = self.scope.cancelled() => {
                    return SessionOutcome::Cancelled(CancelReason::ScopeCancelled);
                }
                written = self.sink.write(chunk) => written,
            };
            if let Err(SinkClosed) = written {
                return SessionOutcome::Cancelled(CancelReason::SinkClosed);
            }
            self.stats.chunks_written += 1;
        }
    }

    /// Close the source. Only the first call does anything.
    async fn release_source(&mut self) {
        if self.source_released {
            return;
        }
        self.source_released = true;
        if let Err(e) = self.source.close().await {
            log::error!(
                "Session {} failed to close its row source: {}",
                self.session_id,
                e
            );
        }
    }

    async fn respond(&mut self, outcome: &SessionOutcome) {
        let ended = match outcome {
            SessionOutcome::Completed => self.sink.end().await,
            SessionOutcome::Failed(_) => {
                if !self.sink.headers_sent() {
                    self.sink.set_status(500);
                }
                self.sink.end().await
            }
            // The client is gone; there is nobody to answer.
            SessionOutcome::Cancelled(_) => Ok(()),
        };
        if ended.is_err() {
            log::debug!(
                "Session {}: client left before the response ended",
                self.session_id
            );
        }
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            log::error!(
                "Session {}: ignoring transition {} -> {}",
                self.session_id,
                self.state,
                next
            );
            return;
        }
        self.state = next;
    }

    fn log_outcome(&self, outcome: &SessionOutcome) {
        match outcome {
            SessionOutcome::Completed => log::info!(
                "Session {} completed after {} rows",
                self.session_id,
                self.stats.chunks_written
            ),
            SessionOutcome::Failed(e) => log::error!(
                "Session {} failed after {} rows: {}",
                self.session_id,
                self.stats.chunks_written,
                e
            ),
            SessionOutcome::Cancelled(reason) => log::warn!(
                "Session {} cancelled ({:?}) after {} rows",
                self.session_id,
                reason,
                self.stats.chunks_written
            ),
        }
    }
}

fn failed(error: impl Into<PipelineError>) -> SessionOutcome {
    SessionOutcome::Failed(error.into())
}

async fn next_fault(fault: &mut Option<FaultSignal>) -> TransformSignalError {
    match fault {
        Some(signal) => signal.raised().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::POISON_ID;
    use crate::pipeline::sink::response_channel;
    use crate::pipeline::transform::TransformMode;
    use crate::pipeline::TransformError;
    use crate::storage::{Record, SourceError, SourceResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// In-memory source that can stall forever after its records run out
    struct ScriptedSource {
        records: VecDeque<Record>,
        stall_at_end: bool,
        fail_at_end: bool,
        close_calls: Arc<AtomicUsize>,
        closed: bool,
    }

    impl ScriptedSource {
        fn new(ids: &[&str], close_calls: Arc<AtomicUsize>) -> Self {
            Self {
                records: ids.iter().map(|id| Record::new(*id)).collect(),
                stall_at_end: false,
                fail_at_end: false,
                close_calls,
                closed: false,
            }
        }
    }

    #[async_trait]
    impl RowSource for ScriptedSource {
        async fn next(&mut self) -> SourceResult<Option<Record>> {
            if let Some(record) = self.records.pop_front() {
                return Ok(Some(record));
            }
            if self.fail_at_end {
                return Err(SourceError::CursorClosed(7));
            }
            if self.stall_at_end {
                std::future::pending::<()>().await;
            }
            Ok(None)
        }

        async fn close(&mut self) -> SourceResult<()> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.closed = true;
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("row-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_completed_stream_preserves_order() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let names = ids(50);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let source = ScriptedSource::new(&refs, close_calls.clone());
        let (writer, body) = response_channel(4);
        let pipeline = Pipeline::new(
            "s1",
            source,
            TransformStage::new(TransformMode::PassThrough),
            writer,
            CancellationToken::new(),
        );

        let reader = tokio::spawn(body.read_to_end());
        let report = pipeline.run().await;
        let response = reader.await.unwrap();

        assert_eq!(report.outcome, SessionOutcome::Completed);
        assert_eq!(report.stats.chunks_written, 50);
        assert!(report.source_closed);
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);

        assert!(response.ended);
        assert_eq!(response.status(), Some(200));
        let expected: Vec<String> = names
            .iter()
            .map(|id| format!("{{\"id\":\"{}\"}}", id))
            .collect();
        assert_eq!(response.lines(), expected);
    }

    #[tokio::test]
    async fn test_callback_error_stops_after_prior_rows() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource::new(&["a", "b", POISON_ID, "c"], close_calls.clone());
        let (writer, body) = response_channel(8);
        let report = Pipeline::new(
            "s2",
            source,
            TransformStage::new(TransformMode::CallbackError),
            writer,
            CancellationToken::new(),
        )
        .run()
        .await;

        assert!(matches!(
            report.outcome,
            SessionOutcome::Failed(PipelineError::Transform(TransformError::Rejected { .. }))
        ));
        assert_eq!(report.stats.records_read, 3);
        assert_eq!(report.stats.records_transformed, 2);
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);

        // Headers already went out with the first row: the stream just ends.
        let response = body.read_to_end().await;
        assert_eq!(response.status(), Some(200));
        assert_eq!(response.lines().len(), 2);
        assert!(response.ended);
    }

    #[tokio::test]
    async fn test_signal_fault_is_observed_while_transform_stalls() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource::new(&["a", POISON_ID, "b"], close_calls.clone());
        let (writer, body) = response_channel(8);
        let run = Pipeline::new(
            "s3",
            source,
            TransformStage::new(TransformMode::SignalFault),
            writer,
            CancellationToken::new(),
        )
        .run();

        let report = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("fault signal ends the session");
        assert!(matches!(
            report.outcome,
            SessionOutcome::Failed(PipelineError::TransformSignal(_))
        ));
        assert_eq!(report.stats.chunks_written, 1);
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(body.read_to_end().await.lines().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_before_first_write_sends_500() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let mut source = ScriptedSource::new(&[], close_calls.clone());
        source.fail_at_end = true;
        let (writer, body) = response_channel(8);
        let report = Pipeline::new(
            "s4",
            source,
            TransformStage::new(TransformMode::PassThrough),
            writer,
            CancellationToken::new(),
        )
        .run()
        .await;

        assert!(matches!(
            report.outcome,
            SessionOutcome::Failed(PipelineError::Source(_))
        ));
        let response = body.read_to_end().await;
        assert_eq!(response.status(), Some(500));
        assert!(response.chunks.is_empty());
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_source_blocked_closes_source() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let mut source = ScriptedSource::new(&["a"], close_calls.clone());
        source.stall_at_end = true;
        let (writer, _body) = response_channel(8);
        let scope = CancellationToken::new();
        let run = tokio::spawn(
            Pipeline::new(
                "s5",
                source,
                TransformStage::new(TransformMode::PassThrough),
                writer,
                scope.clone(),
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(close_calls.load(Ordering::SeqCst), 0);
        scope.cancel();

        let report = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("cancellation unblocks the fetch")
            .unwrap();
        assert_eq!(
            report.outcome,
            SessionOutcome::Cancelled(CancelReason::ScopeCancelled)
        );
        assert_eq!(report.stats.chunks_written, 1);
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_sink_cancels_session() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource::new(&["a", "b", "c"], close_calls.clone());
        let (writer, body) = response_channel(1);
        drop(body);

        let report = Pipeline::new(
            "s6",
            source,
            TransformStage::new(TransformMode::PassThrough),
            writer,
            CancellationToken::new(),
        )
        .run()
        .await;

        assert_eq!(
            report.outcome,
            SessionOutcome::Cancelled(CancelReason::SinkClosed)
        );
        assert_eq!(report.stats.records_transformed, 1);
        assert_eq!(report.stats.chunks_written, 0);
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_is_one_shot() {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource::new(&[], close_calls.clone());
        let (writer, _body) = response_channel(1);
        let mut pipeline = Pipeline::new(
            "s7",
            source,
            TransformStage::new(TransformMode::PassThrough),
            writer,
            CancellationToken::new(),
        );

        pipeline.release_source().await;
        pipeline.release_source().await;
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.state(), SessionState::Idle);
    }
}
