// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command-line arguments

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use streamguard::FailureInjection;

/// Run one streaming export, then re-initialize the table it streamed from
#[derive(Parser, Debug)]
#[command(name = "streamguard")]
#[command(version, about = "Cancellation-safe cursor streaming driver", long_about = None)]
pub struct Cli {
    /// Give up on the export after the configured client timeout
    #[arg(long)]
    pub abort_request: bool,

    /// Transform raises an out-of-band fault on the poison row
    #[arg(long)]
    pub transform_emit_error: bool,

    /// Transform returns an error for the poison row
    #[arg(long)]
    pub transform_callback_error: bool,

    /// Transform panics on the poison row
    #[arg(long)]
    pub transform_throw_error: bool,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Connection pool size (overrides the configuration file)
    #[arg(long, value_name = "N")]
    pub pool_size: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log level
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl Cli {
    /// Switches given on the command line, on top of those from the file
    pub fn failure_injection(&self, file: FailureInjection) -> FailureInjection {
        FailureInjection {
            abort_request: file.abort_request || self.abort_request,
            transform_emit_error: file.transform_emit_error || self.transform_emit_error,
            transform_callback_error: file.transform_callback_error
                || self.transform_callback_error,
            transform_throw_error: file.transform_throw_error || self.transform_throw_error,
        }
    }
}
