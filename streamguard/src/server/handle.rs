// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Handle to a running export session

use crate::pipeline::{FatalFault, SessionReport};
use std::any::Any;
use tokio::task::{JoinError, JoinHandle};

/// Join handle for one export session task
///
/// This is the supervision boundary for [`TransformMode::Fatal`]: a task that
/// panicked comes back as a [`FatalFault`] instead of a report.
///
/// [`TransformMode::Fatal`]: crate::pipeline::TransformMode::Fatal
pub struct SessionHandle {
    session_id: String,
    handle: JoinHandle<SessionReport>,
}

impl SessionHandle {
    pub(crate) fn new(session_id: String, handle: JoinHandle<SessionReport>) -> Self {
        Self { session_id, handle }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the session to end
    pub async fn join(self) -> Result<SessionReport, FatalFault> {
        let Self { session_id, handle } = self;
        match handle.await {
            Ok(report) => Ok(report),
            Err(e) => {
                let message = join_error_message(e);
                log::error!("Session {} died: {}", session_id, message);
                Err(FatalFault {
                    session_id,
                    message,
                })
            }
        }
    }
}

fn join_error_message(error: JoinError) -> String {
    if error.is_panic() {
        panic_message(error.into_panic())
    } else {
        error.to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
