// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Configuration values
//!
//! Every section has a `Default` and every field may be omitted from a
//! configuration file. Durations are stored in milliseconds.

use crate::pipeline::TransformMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Database and pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum number of concurrently leased connections
    pub pool_size: usize,

    /// How long `acquire` waits for a free connection
    pub acquire_timeout_ms: u64,

    /// Rows returned by one cursor fetch
    pub fetch_size: usize,

    /// Simulated storage round trip per cursor fetch
    pub fetch_delay_ms: u64,
}

impl StorageConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            acquire_timeout_ms: 5_000,
            fetch_size: 100,
            fetch_delay_ms: 1,
        }
    }
}

/// Streaming request settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Table streamed by the export route
    pub table: String,

    /// Response frames buffered between the pipeline and the client
    pub sink_capacity: usize,

    /// Upper bound for the re-initialization route
    pub ddl_timeout_ms: u64,

    /// Client-side timeout used when `abort_request` is set
    pub abort_timeout_ms: u64,
}

impl PipelineConfig {
    pub fn ddl_timeout(&self) -> Duration {
        Duration::from_millis(self.ddl_timeout_ms)
    }

    pub fn abort_timeout(&self) -> Duration {
        Duration::from_millis(self.abort_timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            table: "test".to_string(),
            sink_capacity: 16,
            ddl_timeout_ms: 2_000,
            abort_timeout_ms: 5,
        }
    }
}

/// The four failure-injection switches, all off by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureInjection {
    /// The client gives up on the streaming request after `abort_timeout_ms`
    pub abort_request: bool,

    /// The transform reports the poison row through its fault signal
    pub transform_emit_error: bool,

    /// The transform returns an error for the poison row
    pub transform_callback_error: bool,

    /// The transform panics on the poison row
    pub transform_throw_error: bool,
}

impl FailureInjection {
    pub fn any(&self) -> bool {
        self.abort_request
            || self.transform_emit_error
            || self.transform_callback_error
            || self.transform_throw_error
    }

    /// Transform behavior selected by the switches.
    ///
    /// When several transform switches are set, throw wins over callback,
    /// which wins over emit.
    pub fn transform_mode(&self) -> TransformMode {
        if self.transform_throw_error {
            TransformMode::Fatal
        } else if self.transform_callback_error {
            TransformMode::CallbackError
        } else if self.transform_emit_error {
            TransformMode::SignalFault
        } else {
            TransformMode::PassThrough
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamGuardConfig {
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub failures: FailureInjection,
}

impl StreamGuardConfig {
    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.pool_size == 0 {
            return Err(ConfigError::Invalid("pool_size must be at least 1".into()));
        }
        if self.storage.fetch_size == 0 {
            return Err(ConfigError::Invalid("fetch_size must be at least 1".into()));
        }
        if self.pipeline.sink_capacity == 0 {
            return Err(ConfigError::Invalid(
                "sink_capacity must be at least 1".into(),
            ));
        }
        if self.pipeline.table.is_empty() {
            return Err(ConfigError::Invalid("table must not be empty".into()));
        }
        Ok(())
    }
}
