// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Request routes
//!
//! [`StreamServer`] exposes the two routes of the service: the streaming
//! export, which runs one pipeline session per request in its own task, and
//! the table re-initialization, which needs the exclusive table lock and so
//! hangs (until its timeout) if an earlier session leaked a cursor.

pub mod error;
pub mod handle;

pub use error::{ServerError, ServerResult};
pub use handle::SessionHandle;

use crate::config::{FailureInjection, PipelineConfig};
use crate::pipeline::{
    response_channel, CancelReason, CursorSource, Pipeline, RequestLifecycle, ResponseBody,
    ResponseWriter, SessionOutcome, SessionReport, Sink, TransformMode, TransformStage,
};
use crate::storage::{Database, PoolStatus, Query, TableSchema};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const EXPORT_CONTENT_TYPE: &str = "text/csv";
pub const EXPORT_DISPOSITION: &str = "attachment; filename=\"test.csv\"";

/// Serves export sessions and table re-initialization over one database
pub struct StreamServer {
    database: Arc<Database>,
    config: PipelineConfig,
    injection: FailureInjection,
    /// Ids of export sessions whose task has not finished
    active: Arc<RwLock<HashSet<String>>>,
}

impl StreamServer {
    pub fn new(database: Arc<Database>, config: PipelineConfig, injection: FailureInjection) -> Self {
        log::info!(
            "Stream server on table '{}' with {:?} transform",
            config.table,
            injection.transform_mode()
        );
        Self {
            database,
            config,
            injection,
            active: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn injection(&self) -> &FailureInjection {
        &self.injection
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.database.pool_status()
    }

    /// Number of export sessions still running
    pub fn active_sessions(&self) -> usize {
        self.active.read().len()
    }

    /// Start a streaming export
    ///
    /// Returns the client side of the response and a handle to the session
    /// task. Dropping the body before it ends is a client disconnect.
    pub fn export(&self) -> (ResponseBody, SessionHandle) {
        let session_id = Uuid::new_v4().to_string();
        let (mut writer, body) = response_channel(self.config.sink_capacity);
        writer.set_header("Content-Disposition", EXPORT_DISPOSITION);
        writer.set_header("Content-Type", EXPORT_CONTENT_TYPE);
        writer.set_status(200);

        self.active.write().insert(session_id.clone());
        let registration = ActiveSession {
            session_id: session_id.clone(),
            active: self.active.clone(),
        };

        let task = ExportTask {
            session_id: session_id.clone(),
            database: self.database.clone(),
            query: Query::scan(self.config.table.as_str()),
            mode: self.injection.transform_mode(),
        };
        let handle = tokio::spawn(async move {
            let _registration = registration;
            task.run(writer).await
        });

        log::debug!("Started export session {}", session_id);
        (body, SessionHandle::new(session_id, handle))
    }

    /// Drop and recreate the table, then check that it is empty
    ///
    /// Fails with [`ServerError::ReinitializeTimedOut`] when the exclusive
    /// lock is not granted within the configured DDL timeout.
    pub async fn reinitialize(&self) -> ServerResult<()> {
        let table = self.config.table.clone();
        let after = self.config.ddl_timeout();
        log::info!("Re-initializing table '{}'", table);

        let work = async {
            let mut conn = self.database.acquire().await?;
            let result = async {
                conn.recreate_table(&TableSchema::keyed_by_id(table.as_str()))
                    .await?;
                conn.select_all(&table).await
            }
            .await;
            conn.release();
            result
        };

        let outcome = tokio::time::timeout(after, work).await;
        let rows = match outcome {
            Ok(rows) => rows?,
            Err(_) => {
                log::error!(
                    "Re-initializing '{}' did not get the table lock within {}ms",
                    table,
                    after.as_millis()
                );
                return Err(ServerError::ReinitializeTimedOut { table, after });
            }
        };
        if !rows.is_empty() {
            return Err(ServerError::NotEmpty {
                table,
                rows: rows.len(),
            });
        }

        log::info!("Table '{}' re-initialized", table);
        Ok(())
    }
}

/// Removes a session id from the active set when its task ends, even by panic
struct ActiveSession {
    session_id: String,
    active: Arc<RwLock<HashSet<String>>>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.active.write().remove(&self.session_id);
    }
}

struct ExportTask {
    session_id: String,
    database: Arc<Database>,
    query: Query,
    mode: TransformMode,
}

impl ExportTask {
    async fn run(self, mut writer: ResponseWriter) -> SessionReport {
        let started_at = Utc::now();
        let scope = CancellationToken::new();
        let hook = RequestLifecycle::watch(writer.disconnected(), scope.clone());

        // Waiting for a pooled connection is a suspension point too.
        let opened = tokio::select! {
            biased;
            _ = scope.cancelled() => None,
            opened = CursorSource::open(&self.database, &self.query) => Some(opened),
        };

        let mut report = match opened {
            Some(Ok(source)) => {
                log::debug!(
                    "Session {} leased connection {}",
                    self.session_id,
                    source.connection_id()
                );
                let transform = TransformStage::new(self.mode);
                Pipeline::new(self.session_id.as_str(), source, transform, writer, scope)
                    .run()
                    .await
            }
            Some(Err(e)) => {
                log::error!("Session {} could not open a cursor: {}", self.session_id, e);
                writer.set_status(500);
                if writer.end().await.is_err() {
                    log::debug!("Session {}: client left before the error", self.session_id);
                }
                SessionReport::unstarted(
                    self.session_id.as_str(),
                    SessionOutcome::Failed(e.into()),
                    started_at,
                )
            }
            None => {
                log::warn!(
                    "Session {} cancelled while waiting for a connection",
                    self.session_id
                );
                SessionReport::unstarted(
                    self.session_id.as_str(),
                    SessionOutcome::Cancelled(CancelReason::ScopeCancelled),
                    started_at,
                )
            }
        };

        report.client_disconnected = hook.finish().await;
        report.started_at = started_at;
        report
    }
}
