//! Connection lifecycle across every way an export can end
//!
//! Each test runs one export under a failure mode, checks what the client
//! saw, then checks that the pool is balanced and that the table can still be
//! re-initialized (which needs every cursor on it closed).

#[path = "testutils/mod.rs"]
mod testutils;

use std::time::Duration;
use streamguard::bootstrap::POISON_POSITION;
use streamguard::pipeline::{ClientTimeout, PipelineError, TransformError};
use streamguard::{FailureInjection, SessionOutcome, SessionState, StorageConfig};
use testutils::stream_fixture::{expected_lines, StreamFixture, PROMPTLY};

#[tokio::test]
async fn test_pass_through_streams_every_row_in_order() {
    let fixture = StreamFixture::new(FailureInjection::default())
        .await
        .expect("fixture");
    assert_eq!(fixture.seeded(), 1729);

    let (response, joined) = fixture.export_to_end().await;
    let report = joined.expect("no fatal fault");

    assert_eq!(response.status(), Some(200));
    assert!(response.ended);
    assert_eq!(response.lines(), expected_lines(1729));
    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.stats.chunks_written, 1729);
    assert!(report.source_closed);

    fixture.assert_pool_balanced();
    fixture.assert_reinitialize().await;
}

#[tokio::test]
async fn test_repeated_exports_are_identical() {
    let fixture = StreamFixture::with_pool_size(FailureInjection::default(), 1)
        .await
        .expect("fixture");

    let (first, _) = fixture.export_to_end().await;
    let (second, _) = fixture.export_to_end().await;
    let (third, _) = fixture.export_to_end().await;

    assert_eq!(first.body(), second.body());
    assert_eq!(second.body(), third.body());
    assert_eq!(fixture.server().pool_status().acquired_total, 4);
    fixture.assert_pool_balanced();
}

#[tokio::test]
async fn test_callback_error_stops_at_poison_row() {
    let fixture = StreamFixture::new(FailureInjection {
        transform_callback_error: true,
        ..FailureInjection::default()
    })
    .await
    .expect("fixture");

    let (response, joined) = fixture.export_to_end().await;
    let report = joined.expect("no fatal fault");

    // Headers went out with the first row, so the stream is just cut short.
    assert_eq!(response.status(), Some(200));
    assert!(response.ended);
    assert_eq!(response.lines(), expected_lines(POISON_POSITION));
    assert!(matches!(
        report.outcome,
        SessionOutcome::Failed(PipelineError::Transform(TransformError::Rejected { .. }))
    ));
    assert_eq!(report.stats.records_transformed, POISON_POSITION as u64);

    fixture.assert_pool_balanced();
    fixture.assert_reinitialize().await;
}

#[tokio::test]
async fn test_signal_fault_stops_at_poison_row() {
    let fixture = StreamFixture::new(FailureInjection {
        transform_emit_error: true,
        ..FailureInjection::default()
    })
    .await
    .expect("fixture");

    let (response, joined) = fixture.export_to_end().await;
    let report = joined.expect("no fatal fault");

    assert!(response.ended);
    assert_eq!(response.lines(), expected_lines(POISON_POSITION));
    assert!(matches!(
        report.outcome,
        SessionOutcome::Failed(PipelineError::TransformSignal(_))
    ));
    assert_eq!(report.stats.chunks_written, POISON_POSITION as u64);

    fixture.assert_pool_balanced();
    fixture.assert_reinitialize().await;
}

#[tokio::test]
async fn test_fatal_fault_reaches_task_boundary_and_still_releases() {
    let fixture = StreamFixture::new(FailureInjection {
        transform_throw_error: true,
        ..FailureInjection::default()
    })
    .await
    .expect("fixture");

    let (response, joined) = fixture.export_to_end().await;
    let fault = joined.expect_err("panic surfaces as a fatal fault");

    assert!(fault.message.contains("unrecoverable transform fault"));
    assert!(!response.ended, "client sees a truncated stream, not a hang");
    assert_eq!(response.lines(), expected_lines(POISON_POSITION));
    assert_eq!(fixture.server().active_sessions(), 0);

    fixture.assert_pool_balanced();
    fixture.assert_reinitialize().await;
}

#[tokio::test]
async fn test_throw_takes_precedence_over_other_switches() {
    let fixture = StreamFixture::new(FailureInjection {
        transform_emit_error: true,
        transform_callback_error: true,
        transform_throw_error: true,
        ..FailureInjection::default()
    })
    .await
    .expect("fixture");

    let (_, joined) = fixture.export_to_end().await;
    assert!(joined.is_err());
    fixture.assert_pool_balanced();
}

#[tokio::test]
async fn test_client_timeout_then_next_request_succeeds() {
    // Slow fetches so the whole export takes far longer than the client waits.
    let fixture = StreamFixture::with_storage(
        FailureInjection {
            abort_request: true,
            ..FailureInjection::default()
        },
        StorageConfig {
            pool_size: 1,
            fetch_delay_ms: 5,
            ..StorageConfig::default()
        },
    )
    .await
    .expect("fixture");

    let abort_after = fixture.server().config().abort_timeout();
    let (body, handle) = fixture.server().export();
    let err = body.read_with_timeout(abort_after).await.unwrap_err();
    assert_eq!(err, ClientTimeout { after: abort_after });
    assert_eq!(err.to_string(), "timeout of 5ms exceeded");

    let report = tokio::time::timeout(PROMPTLY, handle.join())
        .await
        .expect("session ends after the client leaves")
        .expect("no fatal fault");
    assert_eq!(report.state(), SessionState::Cancelled);
    assert!(report.source_closed);
    fixture.assert_pool_balanced();

    // The only connection is free again.
    let (response, joined) = fixture.export_to_end().await;
    assert!(response.ended);
    assert_eq!(response.lines().len(), 1729);
    assert_eq!(joined.expect("no fatal fault").state(), SessionState::Completed);
    fixture.assert_reinitialize().await;
}

#[tokio::test]
async fn test_reinitialize_is_bounded_after_every_mode() {
    let modes = [
        FailureInjection::default(),
        FailureInjection {
            transform_emit_error: true,
            ..FailureInjection::default()
        },
        FailureInjection {
            transform_callback_error: true,
            ..FailureInjection::default()
        },
        FailureInjection {
            transform_throw_error: true,
            ..FailureInjection::default()
        },
    ];

    for injection in modes {
        let fixture = StreamFixture::new(injection).await.expect("fixture");
        let _ = fixture.export_to_end().await;

        let started = std::time::Instant::now();
        fixture.assert_reinitialize().await;
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "{:?} left the table locked",
            injection.transform_mode()
        );
        fixture.assert_pool_balanced();
    }
}
