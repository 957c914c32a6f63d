//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use herd_lib::DiseaseLabel;
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

/// Print a rounded table of rows
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format liters with two decimals
pub fn format_liters(liters: f64) -> String {
    format!("{:.2} L", liters)
}

/// Format a 0..1 ratio as percentage
pub fn format_ratio(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Color a disease label: green when healthy, red otherwise
pub fn color_condition(label: DiseaseLabel) -> String {
    match label {
        DiseaseLabel::Healthy => label.as_str().green().to_string(),
        _ => label.as_str().red().to_string(),
    }
}

/// Color a confidence percentage based on value
pub fn color_confidence(percent: f64) -> String {
    let formatted = format!("{:.2}%", percent);
    if percent >= 80.0 {
        formatted.green().to_string()
    } else if percent >= 60.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
