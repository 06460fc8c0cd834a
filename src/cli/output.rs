//! Output formatting utilities for the CLI.

use comfy_table::{presets, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use serde::Serialize;

use crate::domain::models::{Severity, Verdict};

/// Renders a command result for people or machines.
pub trait CommandOutput: Serialize {
    /// Human-readable report.
    fn to_human(&self) -> String;
    /// Machine-readable report.
    fn to_json(&self) -> serde_json::Value;
}

/// Print `result` as JSON or as text.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to at most `max_len` characters, appending "..." if
/// truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Create a borderless list table with the given headers.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Table cell colored by severity.
pub fn severity_cell(severity: Severity) -> Cell {
    let color = match severity {
        Severity::Critical => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Cyan,
    };
    Cell::new(severity.as_str()).fg(color)
}

/// Table cell colored by verdict.
pub fn verdict_cell(verdict: Verdict) -> Cell {
    let color = match verdict {
        Verdict::Fail => Color::Red,
        Verdict::Warning => Color::Yellow,
        Verdict::Pass => Color::Green,
    };
    Cell::new(verdict.as_str()).fg(color)
}

/// Verdict rendered for a summary line.
pub fn styled_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::Fail => style(verdict.as_str()).red().bold().to_string(),
        Verdict::Warning => style(verdict.as_str()).yellow().bold().to_string(),
        Verdict::Pass => style(verdict.as_str()).green().bold().to_string(),
    }
}
