// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Request lifecycle hook: client disconnect → session cancellation

use super::sink::Disconnected;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Watches a request's transport and cancels the session scope when the
/// client goes away.
///
/// The watcher stops when [`finish`](Self::finish) is called, when the scope
/// is cancelled by someone else, or when this value is dropped.
pub struct RequestLifecycle {
    handle: JoinHandle<bool>,
    stop: DropGuard,
}

impl RequestLifecycle {
    pub fn watch(disconnected: Disconnected, scope: CancellationToken) -> Self {
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = stopped.cancelled() => false,
                _ = scope.cancelled() => false,
                _ = disconnected => {
                    log::warn!("Client disconnected; cancelling session");
                    scope.cancel();
                    true
                }
            }
        });

        Self {
            handle,
            stop: stop.drop_guard(),
        }
    }

    /// Stop watching. Returns whether a disconnect was observed.
    pub async fn finish(self) -> bool {
        let Self { handle, stop } = self;
        drop(stop);
        match handle.await {
            Ok(fired) => fired,
            Err(e) => {
                log::error!("Request lifecycle watcher failed: {}", e);
                false
            }
        }
    }
}
