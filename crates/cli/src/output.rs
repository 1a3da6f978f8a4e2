//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use operator_lib::{AffinityMode, BatteryTrend, PlacementAction, Window, HOLD_REPLICAS};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or the raw records as JSON
pub fn print_records<R: Tabled, T: Serialize>(
    records: &[T],
    to_row: impl Fn(&T) -> R,
    format: OutputFormat,
    empty_message: &str,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        OutputFormat::Table => {
            if records.is_empty() {
                print_warning(empty_message);
                return Ok(());
            }
            let rows: Vec<R> = records.iter().map(to_row).collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Hour span of a window, e.g. `22:00-01:59`
pub fn format_window(window: &Window) -> String {
    format!("{:02}:00-{:02}:59", window.start, window.end)
}

/// Replica target, with the hold marker spelled out
pub fn format_replicas(target: i32) -> String {
    if target == HOLD_REPLICAS {
        "hold".yellow().to_string()
    } else {
        target.to_string()
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Color affinity mode
pub fn color_mode(mode: AffinityMode) -> String {
    match mode {
        AffinityMode::Prefer => mode.to_string().green().to_string(),
        AffinityMode::Avoid => mode.to_string().red().to_string(),
    }
}

/// Color battery trend
pub fn color_trend(trend: BatteryTrend) -> String {
    match trend {
        BatteryTrend::Rising => trend.to_string().green().to_string(),
        BatteryTrend::Falling => trend.to_string().red().to_string(),
        BatteryTrend::Stable => trend.to_string(),
    }
}

pub fn color_action(action: PlacementAction) -> String {
    match action {
        PlacementAction::Applied => "applied".cyan().to_string(),
        PlacementAction::Unchanged => "unchanged".dimmed().to_string(),
    }
}
