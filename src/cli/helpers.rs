//! Shared helper functions for CLI commands

use chrono::Utc;
use clap::ValueEnum;
use std::path::{Path, PathBuf};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::export::{self, ExportFormat};
use crate::core::Config;

/// Effective configuration: files and environment, then global flags
pub fn load_config(global: &GlobalOpts) -> Config {
    Config::load().with_overrides(global.profile.clone(), global.store.clone())
}

/// Output format: an explicit `--format`, else the configured default
pub fn effective_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    if global.format != OutputFormat::Auto {
        return global.format;
    }
    config
        .default_format
        .as_deref()
        .and_then(|f| OutputFormat::from_str(f, true).ok())
        .unwrap_or(OutputFormat::Auto)
}

/// File format for `--output`: the output format when it names one, else the
/// file extension, else JSON
pub fn export_format(format: OutputFormat, path: &Path) -> ExportFormat {
    match format {
        OutputFormat::Csv => ExportFormat::Csv,
        OutputFormat::Json => ExportFormat::Json,
        _ => ExportFormat::from_path(path).unwrap_or(ExportFormat::Json),
    }
}

/// Export target: a directory gets `job-executions-<profile>-<timestamp>.<ext>`
pub fn export_path(path: &Path, profile: &str, format: ExportFormat) -> PathBuf {
    if path.is_dir() {
        path.join(export::default_file_name(profile, Utc::now(), format))
    } else {
        path.to_path_buf()
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print content to stdout, ending with a newline
pub fn print_output(content: &str) {
    print!("{}", content);
    if !content.is_empty() && !content.ends_with('\n') {
        println!();
    }
}
