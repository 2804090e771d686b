// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scenario result formatting

use super::scenario::ScenarioReport;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use streamguard::pipeline::{ClientTimeout, ReceivedResponse};
use streamguard::{FatalFault, PoolStatus, ServerError, SessionOutcome, SessionReport};

/// Formats scenario steps for the terminal
pub struct ReportFormatter;

impl ReportFormatter {
    /// Client view and server view of the export request
    pub fn format_export(
        response: &Result<ReceivedResponse, ClientTimeout>,
        session: &Result<SessionReport, FatalFault>,
    ) -> String {
        let mut output = String::new();

        match response {
            Ok(received) => {
                let status = received
                    .status()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string());
                let ending = if received.ended {
                    "ended".green()
                } else {
                    "truncated".yellow()
                };
                output.push_str(&format!(
                    "  client: status {}, {} lines, {}\n",
                    status,
                    received.lines().len(),
                    ending
                ));
            }
            Err(timeout) => {
                output.push_str(&format!("  client: {}\n", "Request Cancelled".yellow()));
                output.push_str(&format!("    {}\n", timeout));
            }
        }

        match session {
            Ok(report) => {
                let outcome = match &report.outcome {
                    SessionOutcome::Completed => "completed".green(),
                    SessionOutcome::Failed(e) => format!("failed: {}", e).red(),
                    SessionOutcome::Cancelled(reason) => {
                        format!("cancelled ({:?})", reason).yellow()
                    }
                };
                output.push_str(&format!(
                    "  session {}: {} after {} rows in {} ms\n",
                    report.session_id,
                    outcome,
                    report.stats.chunks_written,
                    report.elapsed_ms()
                ));
            }
            Err(fault) => {
                output.push_str(&format!("  {}\n", fault.to_string().red().bold()));
            }
        }

        output
    }

    pub fn format_reinitialize(result: &Result<(), ServerError>) -> String {
        match result {
            Ok(()) => format!("  {}\n", "✅ Test Passed".green()),
            Err(e) => format!("  {}\n", format!("❌ {}", e).red()),
        }
    }

    /// Pool counters as a table
    pub fn format_pool(pool: &PoolStatus) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![
            Cell::new("size").fg(Color::Green),
            Cell::new("idle").fg(Color::Green),
            Cell::new("outstanding").fg(Color::Green),
            Cell::new("acquired").fg(Color::Green),
            Cell::new("released").fg(Color::Green),
        ]);

        let outstanding = if pool.outstanding == 0 {
            Cell::new(pool.outstanding)
        } else {
            Cell::new(pool.outstanding).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(pool.size),
            Cell::new(pool.idle),
            outstanding,
            Cell::new(pool.acquired_total),
            Cell::new(pool.released_total),
        ]);

        format!("{}\n{}\n", "Connection pool".bold().green(), table)
    }

    /// Closing summary
    pub fn format_summary(report: &ScenarioReport) -> String {
        let mut output = String::new();
        output.push('\n');
        output.push_str(&Self::format_pool(&report.pool));

        let failures = &report.config.failures;
        output.push_str(&format!("Seeded rows: {}\n", report.seeded));
        output.push_str(&format!(
            "Transform mode: {:?}{}\n",
            failures.transform_mode(),
            if failures.abort_request {
                ", client abort"
            } else {
                ""
            }
        ));

        if report.passed() {
            output.push_str(&format!("{}\n", "No connection leaked".bold().green()));
        } else {
            output.push_str(&format!("{}\n", "Connection leaked".bold().red()));
        }
        output
    }
}
