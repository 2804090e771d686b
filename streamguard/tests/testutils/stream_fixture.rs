//! Seeded database plus stream server for one test

use std::time::Duration;
use streamguard::bootstrap::{bootstrap, seed_records};
use streamguard::pipeline::{ReceivedResponse, ResponseFrame};
use streamguard::{
    Database, FailureInjection, FatalFault, PipelineConfig, ResponseBody, SessionReport,
    StorageConfig, StreamServer,
};

/// Upper bound for anything that must finish "promptly"
pub const PROMPTLY: Duration = Duration::from_secs(5);

pub struct StreamFixture {
    server: StreamServer,
    seeded: usize,
}

impl StreamFixture {
    /// Fixture with a two-connection pool
    pub async fn new(injection: FailureInjection) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_storage(
            injection,
            StorageConfig {
                pool_size: 2,
                ..StorageConfig::default()
            },
        )
        .await
    }

    pub async fn with_pool_size(
        injection: FailureInjection,
        pool_size: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_storage(
            injection,
            StorageConfig {
                pool_size,
                ..StorageConfig::default()
            },
        )
        .await
    }

    pub async fn with_storage(
        injection: FailureInjection,
        storage: StorageConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let _ = env_logger::builder().is_test(true).try_init();

        let pipeline = PipelineConfig {
            ddl_timeout_ms: 1_000,
            ..PipelineConfig::default()
        };
        let database = Database::open(storage);
        let seeded = bootstrap(&database, &pipeline.table).await?;
        let server = StreamServer::new(database, pipeline, injection);
        Ok(Self { server, seeded })
    }

    pub fn server(&self) -> &StreamServer {
        &self.server
    }

    pub fn seeded(&self) -> usize {
        self.seeded
    }

    /// Export and read the whole response as a patient client
    pub async fn export_to_end(&self) -> (ReceivedResponse, Result<SessionReport, FatalFault>) {
        let (body, handle) = self.server.export();
        let response = tokio::time::timeout(PROMPTLY, body.read_to_end())
            .await
            .expect("response finished or closed");
        let joined = tokio::time::timeout(PROMPTLY, handle.join())
            .await
            .expect("session task finished");
        (response, joined)
    }

    pub fn assert_pool_balanced(&self) {
        let status = self.server.pool_status();
        assert!(status.is_balanced(), "pool leaked: {:?}", status);
    }

    /// The leak check: re-initialization must get the exclusive table lock
    pub async fn assert_reinitialize(&self) {
        self.server
            .reinitialize()
            .await
            .expect("table re-initialized after the session");
    }
}

/// Read `count` data frames, then hang up
pub async fn read_then_hang_up(mut body: ResponseBody, count: usize) -> usize {
    let mut read = 0;
    while read < count {
        match body.next_frame().await {
            Some(ResponseFrame::Data(_)) => read += 1,
            Some(ResponseFrame::Head(_)) => {}
            Some(ResponseFrame::End) | None => break,
        }
    }
    body.abort();
    read
}

/// Seed rows as the JSON lines the export produces
pub fn expected_lines(count: usize) -> Vec<String> {
    seed_records()
        .into_iter()
        .take(count)
        .map(|record| format!("{{\"id\":\"{}\"}}", record.id))
        .collect()
}
