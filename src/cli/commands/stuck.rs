//! `execscope stuck` command - pull requests whose latest event is in flight

use chrono::Utc;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{self, effective_format, export_format, export_path};
use crate::cli::table::{stuck_row, TableFormatter, TableRow, STUCK_COLUMNS};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::export::{self, ExportFormat};
use crate::core::service;
use crate::core::{Session, StuckRequest, StuckStatistics};

#[derive(clap::Args, Debug)]
pub struct StuckArgs {
    /// Tenant id (hyphenated UUID)
    #[arg(long, short = 't', env = "EXECSCOPE_TENANT")]
    pub tenant: String,

    /// Only consider events from the last N hours (default: all)
    #[arg(long, value_name = "HOURS")]
    pub since: Option<u32>,

    /// Write stuck pull requests to a file (JSON or CSV); a directory gets a generated name
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: StuckArgs, global: &GlobalOpts) -> Result<()> {
    let config = helpers::load_config(global);
    let format = effective_format(global, &config);
    let request = StuckRequest {
        tenant_id: args.tenant.clone(),
        lookback_hours: args.since,
    };

    let profile = Session::require_profile(&config)?.to_string();
    let response = service::run_stuck(&config, &request, Utc::now())?;

    if let Some(path) = &args.output {
        let fmt = export_format(format, path);
        let path = export_path(path, &profile, fmt);
        let content = match fmt {
            ExportFormat::Json => export::to_json(&response.data),
            ExportFormat::Csv => export::rows_to_csv(&response.data),
        }
        .into_diagnostic()?;
        export::write_export(&path, &content).into_diagnostic()?;
        if !global.quiet {
            println!(
                "{} Exported {} stuck pull request(s) to {}",
                style("✓").green(),
                response.data.len(),
                style(path.display()).cyan()
            );
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", export::to_json(&response).into_diagnostic()?),
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&response).into_diagnostic()?),
        OutputFormat::Csv => {
            helpers::print_output(&export::rows_to_csv(&response.data).into_diagnostic()?)
        }
        OutputFormat::Tsv | OutputFormat::Md | OutputFormat::Auto => {
            if !global.quiet {
                println!("{}", render_summary(&response.statistics));
            }
            if response.data.is_empty() {
                if !global.quiet {
                    println!("{} No stuck pull requests", style("✓").green());
                }
                return Ok(());
            }
            let rows: Vec<TableRow> = response.data.iter().map(stuck_row).collect();
            print!(
                "{}",
                TableFormatter::new(STUCK_COLUMNS, "stuck pull request")
                    .with_summary(!global.quiet)
                    .render(&rows, format)
            );
        }
    }

    Ok(())
}

/// Markdown summary of a stuck report
fn render_summary(stats: &StuckStatistics) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Metric", "Value"]);
    builder.push_record(["Stuck pull requests".to_string(), stats.total_stuck_prs.to_string()]);
    builder.push_record(["Critical (10m+)".to_string(), stats.critical_prs.to_string()]);
    builder.push_record(["Warning (3-10m)".to_string(), stats.warning_prs.to_string()]);
    builder.push_record(["Recent (<3m)".to_string(), stats.recent_prs.to_string()]);
    builder.push_record([
        "Pull requests analyzed".to_string(),
        stats.total_unique_prs_analyzed.to_string(),
    ]);
    builder.push_record([
        "Events processed".to_string(),
        stats.total_pr_events_processed.to_string(),
    ]);
    builder.push_record([
        "Items scanned".to_string(),
        format!("{} in {} queries", stats.total_scanned, stats.queries_executed),
    ]);
    if let Some(start) = &stats.date_range_start {
        builder.push_record(["Window start".to_string(), start.clone()]);
    }
    if let (Some(oldest), Some(newest)) = (&stats.oldest_execution, &stats.newest_execution) {
        builder.push_record(["Oldest".to_string(), oldest.clone()]);
        builder.push_record(["Newest".to_string(), newest.clone()]);
    }
    if !stats.repositories.is_empty() {
        builder.push_record(["Repositories".to_string(), stats.repositories.join(", ")]);
    }
    if stats.unparseable_timestamps > 0 {
        builder.push_record([
            "Unparseable timestamps".to_string(),
            stats.unparseable_timestamps.to_string(),
        ]);
    }

    builder.build().with(Style::markdown()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_tiers_and_skips_empty_rows() {
        let stats = StuckStatistics {
            total_stuck_prs: 3,
            critical_prs: 1,
            warning_prs: 1,
            recent_prs: 1,
            repositories: vec!["api".into(), "web".into()],
            ..Default::default()
        };
        let out = render_summary(&stats);
        assert!(out.contains("| Stuck pull requests"));
        assert!(out.contains("api, web"));
        assert!(!out.contains("Window start"));
        assert!(!out.contains("Unparseable"));
    }
}
