// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for StreamGuard
//!
//! Bootstraps an in-process database, runs the export request and the
//! re-initialization request against it, and reports whether anything leaked.

pub mod commands;
pub mod output;
pub mod scenario;

pub use commands::Cli;
pub use scenario::{handle_run, ScenarioReport};
