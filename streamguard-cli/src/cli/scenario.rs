// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! The two-request scenario: export, then re-initialize

use super::commands::Cli;
use super::output::ReportFormatter;
use colored::Colorize;
use streamguard::bootstrap::bootstrap;
use streamguard::pipeline::{ClientTimeout, ReceivedResponse};
use streamguard::{
    Database, FatalFault, PoolStatus, ServerError, SessionReport, StreamGuardConfig, StreamServer,
};

/// Everything observed while running the scenario
pub struct ScenarioReport {
    pub config: StreamGuardConfig,
    pub seeded: usize,
    pub response: Result<ReceivedResponse, ClientTimeout>,
    pub session: Result<SessionReport, FatalFault>,
    pub reinitialize: Result<(), ServerError>,
    pub pool: PoolStatus,
}

impl ScenarioReport {
    /// The table could be re-initialized and every connection came back
    pub fn passed(&self) -> bool {
        self.reinitialize.is_ok() && self.pool.is_balanced()
    }
}

/// Load configuration, apply flags, and run both requests
pub async fn handle_run(cli: &Cli) -> Result<ScenarioReport, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => StreamGuardConfig::from_file(path)?,
        None => StreamGuardConfig::default(),
    };
    if let Some(pool_size) = cli.pool_size {
        config.storage.pool_size = pool_size;
    }
    config.failures = cli.failure_injection(config.failures);
    config.validate()?;

    let database = Database::open(config.storage.clone());
    let seeded = bootstrap(&database, &config.pipeline.table).await?;
    println!(
        "{} {} rows into '{}'",
        "Seeded".bold().green(),
        seeded,
        config.pipeline.table
    );

    let server = StreamServer::new(database, config.pipeline.clone(), config.failures);

    println!("{}", "Request 1: export".bold());
    let (body, session) = server.export();
    let response = if config.failures.abort_request {
        body.read_with_timeout(config.pipeline.abort_timeout()).await
    } else {
        Ok(body.read_to_end().await)
    };
    let session = session.join().await;
    print!("{}", ReportFormatter::format_export(&response, &session));

    println!("{}", "Request 2: re-initialize".bold());
    let reinitialize = server.reinitialize().await;
    print!("{}", ReportFormatter::format_reinitialize(&reinitialize));

    let pool = server.pool_status();
    server.database().shutdown();

    Ok(ScenarioReport {
        config,
        seeded,
        response,
        session,
        reinitialize,
        pool,
    })
}
