// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! StreamGuard CLI entry point

use clap::Parser;
use colored::Colorize;

mod cli;
use cli::output::ReportFormatter;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // -v/--verbose wins over --log-level; RUST_LOG still applies on top
    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if let Some(level) = cli.log_level {
        level.to_level_filter()
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    println!("{} {}", "StreamGuard".bold().green(), streamguard::VERSION);

    let report = cli::handle_run(&cli).await?;
    print!("{}", ReportFormatter::format_summary(&report));

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}
