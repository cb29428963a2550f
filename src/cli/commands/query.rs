//! `execscope query` command - job-execution records by tenant and status

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{self, effective_format, export_format, export_path};
use crate::cli::table::{record_row, TableFormatter, TableRow, RECORD_COLUMNS};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::export::{self, ExportFormat};
use crate::core::service::{self, QueryResponse};
use crate::core::{CustomFilter, ExecscopeError, QueryRequest, QueryTarget, Session};

#[derive(clap::Args, Debug)]
pub struct QueryArgs {
    /// Tenant id (hyphenated UUID)
    #[arg(long, short = 't', env = "EXECSCOPE_TENANT")]
    pub tenant: String,

    /// Record status (e.g. failed, completed, started)
    #[arg(long, short = 's')]
    pub status: String,

    /// Only records created at or after this date/time
    #[arg(long)]
    pub start: Option<String>,

    /// Only records created at or before this date/time
    #[arg(long)]
    pub end: Option<String>,

    /// Maximum number of records to return (default from config, 50)
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Attribute filter "FIELD OP VALUE", OP one of = < > contains begins_with
    /// (repeatable, all must match)
    #[arg(long = "filter", short = 'w', value_name = "FILTER")]
    pub filter: Vec<String>,

    /// Write results to a file (JSON or CSV); a directory gets a generated name
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Print only the number of matching records (ignores --limit)
    #[arg(long)]
    pub count: bool,
}

impl QueryArgs {
    /// Build the request, parsing `--filter` expressions
    pub fn to_request(&self, event_name: Option<String>) -> Result<QueryRequest, ExecscopeError> {
        let custom_filters = self
            .filter
            .iter()
            .enumerate()
            .map(|(i, f)| CustomFilter::parse_cli(f, i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryRequest {
            tenant_id: self.tenant.clone(),
            status: self.status.clone(),
            start_date: self.start.clone(),
            end_date: self.end.clone(),
            limit: self.limit,
            custom_filters,
            event_name_filter: event_name,
        })
    }
}

pub fn run(args: QueryArgs, global: &GlobalOpts) -> Result<()> {
    run_status_query(QueryTarget::Executions, &args, None, global)
}

/// Shared by `query` and `events`
pub(crate) fn run_status_query(
    target: QueryTarget,
    args: &QueryArgs,
    event_name: Option<String>,
    global: &GlobalOpts,
) -> Result<()> {
    let config = helpers::load_config(global);
    let format = effective_format(global, &config);
    let profile = Session::require_profile(&config)?.to_string();
    let request = args.to_request(event_name)?;

    let response = service::run_query(&config, target, &request)?;

    if args.count {
        println!("{}", response.total_collected);
        return Ok(());
    }

    if let Some(path) = &args.output {
        let fmt = export_format(format, path);
        let path = export_path(path, &profile, fmt);
        let content = match fmt {
            ExportFormat::Json => export::to_json(&response.data),
            ExportFormat::Csv => export::to_csv(&response.data),
        }
        .into_diagnostic()?;
        export::write_export(&path, &content).into_diagnostic()?;

        if !global.quiet {
            println!(
                "{} Exported {} record(s) to {}",
                style("✓").green(),
                response.count,
                style(path.display()).cyan()
            );
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", export::to_json(&response).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&response).into_diagnostic()?);
        }
        OutputFormat::Csv => {
            helpers::print_output(&export::to_csv(&response.data).into_diagnostic()?);
        }
        OutputFormat::Tsv | OutputFormat::Md | OutputFormat::Auto => {
            let rows: Vec<TableRow> = response.data.iter().map(record_row).collect();
            let table = TableFormatter::new(RECORD_COLUMNS, "record")
                .with_summary(!global.quiet)
                .render(&rows, format);
            print!("{}", table);
            if !global.quiet && format != OutputFormat::Md {
                print_query_stats(&response);
            }
        }
    }

    Ok(())
}

fn print_query_stats(response: &QueryResponse) {
    println!(
        "{}",
        style(format!(
            "Scanned {} item(s) in {} quer{}, {} matched before limit (profile {})",
            response.scanned_count,
            response.queries_executed,
            if response.queries_executed == 1 { "y" } else { "ies" },
            response.total_collected,
            response.profile.as_deref().unwrap_or("-"),
        ))
        .dim()
    );

    match response.collection_has_data {
        Some(true) => println!(
            "{}",
            style("The collection has data; no records match this tenant, status and date range.")
                .yellow()
        ),
        Some(false) => println!(
            "{}",
            style("The collection appears to be empty for this profile.").yellow()
        ),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FilterOperator;

    fn args(filters: &[&str]) -> QueryArgs {
        QueryArgs {
            tenant: "3f2b8c1e-9a4d-4e6f-8b2a-1c3d5e7f9a0b".into(),
            status: "failed".into(),
            start: None,
            end: None,
            limit: Some(5),
            filter: filters.iter().map(|f| f.to_string()).collect(),
            output: None,
            count: false,
        }
    }

    #[test]
    fn test_to_request_parses_filters() {
        let req = args(&["context.jit_event.owner = acme", "status contains fail"])
            .to_request(Some("pull_request".into()))
            .unwrap();
        assert_eq!(req.custom_filters.len(), 2);
        assert_eq!(req.custom_filters[1].operator, FilterOperator::Contains);
        assert_eq!(req.event_name_filter.as_deref(), Some("pull_request"));
        assert_eq!(req.limit, Some(5));
    }

    #[test]
    fn test_to_request_rejects_incomplete_filter() {
        let err = args(&["owner ="]).to_request(None).unwrap_err();
        assert!(matches!(err, ExecscopeError::Validation(_)));
    }
}
