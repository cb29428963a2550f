//! Table formatting for record and stuck-entity listings
//!
//! Commands describe rows as typed cells; the formatter sizes columns from the
//! content and renders aligned text or Markdown.

use console::style;
use serde_json::Value;

use crate::cli::helpers::truncate_str;
use crate::cli::OutputFormat;
use crate::core::record::{self, EventRecord};
use crate::core::reducer::{StuckEntity, Urgency};

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Record identifier, cyan, never truncated
    Id(String),
    /// Plain text, truncated to the column width
    Text(String),
    /// Record status with color coding
    Status(String),
    /// Stored timestamp, shown as UTC `YYYY-MM-DD HH:MM:SS` when parseable
    Timestamp(String),
    /// Count, right-aligned; zero is dimmed
    Count(usize),
    Urgency(Urgency),
    Empty,
}

impl CellValue {
    /// Text cell, or `Empty` when there is nothing to show
    pub fn text(value: Option<String>) -> Self {
        value.map_or(CellValue::Empty, CellValue::Text)
    }

    pub fn id(value: Option<&str>) -> Self {
        value.map_or(CellValue::Empty, |v| CellValue::Id(v.to_string()))
    }

    pub fn timestamp(value: Option<&str>) -> Self {
        value.map_or(CellValue::Empty, |v| CellValue::Timestamp(v.to_string()))
    }

    /// Format for aligned terminal output (with colors if terminal)
    pub fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Id(id) => format!("{:<width$}", style(id).cyan(), width = width),
            CellValue::Text(s) => {
                format!("{:<width$}", truncate_str(s, width), width = width)
            }
            CellValue::Status(s) => {
                let styled = match s.as_str() {
                    "completed" => style(s.as_str()).green(),
                    "failed" => style(s.as_str()).red().bold(),
                    "started" | "creating" | "job_sent" => style(s.as_str()).yellow(),
                    _ => style(s.as_str()).white(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Timestamp(_) => format!("{:<width$}", self.raw(), width = width),
            CellValue::Count(0) => format!("{:>width$}", style(0).dim(), width = width),
            CellValue::Count(n) => format!("{:>width$}", style(n).red(), width = width),
            CellValue::Urgency(u) => {
                let styled = match u {
                    Urgency::Critical => style(u.label()).red().bold(),
                    Urgency::Warning => style(u.label()).yellow(),
                    Urgency::Recent => style(u.label()).green(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Empty => format!("{:<width$}", style("-").dim(), width = width),
        }
    }

    /// Format for Markdown output (no colors, escaped pipes)
    pub fn format_md(&self) -> String {
        let raw = match self {
            CellValue::Urgency(Urgency::Critical) => "**Critical**".to_string(),
            CellValue::Empty => "-".to_string(),
            _ => self.raw(),
        };
        raw.replace('|', "\\|")
    }

    /// Plain value without styling
    pub fn raw(&self) -> String {
        match self {
            CellValue::Id(s) | CellValue::Text(s) | CellValue::Status(s) => s.clone(),
            CellValue::Timestamp(s) => record::parse_utc(s)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| s.clone()),
            CellValue::Count(n) => n.to_string(),
            CellValue::Urgency(u) => u.label().to_string(),
            CellValue::Empty => String::new(),
        }
    }

    /// Width of the content (for dynamic column sizing)
    pub fn display_width(&self) -> usize {
        match self {
            CellValue::Empty => 1,
            _ => self.raw().chars().count(),
        }
    }
}

/// Column definition with header label and maximum width
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub key: &'static str,
    pub header: &'static str,
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

/// Columns for job-execution and lifecycle-event listings
pub const RECORD_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("execution", "EXECUTION", 40),
    ColumnDef::new("event", "EVENT ID", 40),
    ColumnDef::new("name", "EVENT NAME", 32),
    ColumnDef::new("status", "STATUS", 12),
    ColumnDef::new("created", "CREATED", 19),
    ColumnDef::new("completed", "COMPLETED", 19),
    ColumnDef::new("errors", "ERRORS", 6),
];

/// Columns for the stuck pull-request listing
pub const STUCK_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("urgency", "URGENCY", 8),
    ColumnDef::new("age", "AGE", 16),
    ColumnDef::new("pr", "PR", 8),
    ColumnDef::new("repository", "REPOSITORY", 36),
    ColumnDef::new("branch", "BRANCH", 28),
    ColumnDef::new("status", "STATUS", 10),
    ColumnDef::new("title", "TITLE", 40),
    ColumnDef::new("event", "EVENT ID", 40),
];

/// A row of cell values for table output
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Row for one job-execution or lifecycle-event record
pub fn record_row(raw: &Value) -> TableRow {
    let record = EventRecord::new(raw);
    TableRow::new()
        .cell("execution", CellValue::id(record.execution_id()))
        .cell("event", CellValue::id(record.event_id()))
        .cell("name", CellValue::text(record.event_name().map(String::from)))
        .cell(
            "status",
            record
                .status()
                .map_or(CellValue::Empty, |s| CellValue::Status(s.to_string())),
        )
        .cell("created", CellValue::timestamp(record.created_at()))
        .cell("completed", CellValue::timestamp(record.completed_at()))
        .cell("errors", CellValue::Count(record.error_count()))
}

/// Row for one stuck pull request
pub fn stuck_row(entity: &StuckEntity) -> TableRow {
    let pr = entity
        .pull_request_number
        .as_ref()
        .and_then(record::scalar_text)
        .map(|n| format!("#{}", n));
    let repository = match (&entity.owner, &entity.original_repository) {
        (Some(owner), Some(repo)) => Some(format!("{}/{}", owner, repo)),
        (None, repo) => repo.clone(),
        (owner, None) => owner.clone(),
    };

    TableRow::new()
        .cell("urgency", CellValue::Urgency(entity.urgency_level))
        .cell("age", CellValue::Text(entity.time_ago.clone()))
        .cell("pr", CellValue::text(pr))
        .cell("repository", CellValue::text(repository))
        .cell("branch", CellValue::text(entity.branch.clone()))
        .cell(
            "status",
            entity
                .status
                .clone()
                .map_or(CellValue::Empty, CellValue::Status),
        )
        .cell("title", CellValue::text(entity.pull_request_title.clone()))
        .cell("event", CellValue::id(entity.jit_event_id.as_deref()))
}

/// Table formatter that renders rows in the terminal formats
pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    noun: &'static str,
    show_summary: bool,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], noun: &'static str) -> Self {
        Self {
            columns,
            noun,
            show_summary: true,
        }
    }

    /// Show or hide the trailing "N noun(s) found." line
    pub fn with_summary(mut self, show: bool) -> Self {
        self.show_summary = show;
        self
    }

    /// Render rows; formats other than Markdown render as aligned columns
    pub fn render(&self, rows: &[TableRow], format: OutputFormat) -> String {
        match format {
            OutputFormat::Md => self.render_md(rows),
            _ => self.render_tsv(rows),
        }
    }

    /// Column widths: max of header and content, capped at the column width
    fn calculate_widths(&self, rows: &[TableRow]) -> Vec<usize> {
        self.columns
            .iter()
            .map(|col| {
                let max_content = rows
                    .iter()
                    .filter_map(|r| r.get(col.key))
                    .map(CellValue::display_width)
                    .max()
                    .unwrap_or(0);
                col.header.len().max(max_content).min(col.width)
            })
            .collect()
    }

    fn render_tsv(&self, rows: &[TableRow]) -> String {
        let widths = self.calculate_widths(rows);
        let mut out = String::new();

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:<width$}", style(col.header).bold(), width = *w))
            .collect();
        out.push_str(header.join("  ").trim_end());
        out.push('\n');

        let total_width: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        out.push_str(&"-".repeat(total_width));
        out.push('\n');

        for row in rows {
            let parts: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(col, w)| match row.get(col.key) {
                    Some(value) => value.format_tsv(*w),
                    None => CellValue::Empty.format_tsv(*w),
                })
                .collect();
            out.push_str(parts.join("  ").trim_end());
            out.push('\n');
        }

        if self.show_summary {
            out.push('\n');
            out.push_str(&format!(
                "{} {}(s) found.\n",
                style(rows.len()).cyan(),
                self.noun
            ));
        }
        out
    }

    fn render_md(&self, rows: &[TableRow]) -> String {
        let mut out = String::new();

        let headers: Vec<&str> = self.columns.iter().map(|c| c.header).collect();
        out.push_str(&format!("| {} |\n", headers.join(" | ")));
        let rules: Vec<&str> = self.columns.iter().map(|_| "---").collect();
        out.push_str(&format!("|{}|\n", rules.join("|")));

        for row in rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|col| {
                    row.get(col.key)
                        .map_or_else(|| "-".to_string(), CellValue::format_md)
                })
                .collect();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "execution_id": "exec-1",
            "jit_event_id": "evt-1",
            "jit_event_name": "pull_request_created",
            "status": "failed",
            "created_at": "2024-05-01T12:30:00",
            "errors": [{"message": "boom"}]
        })
    }

    #[test]
    fn test_record_row_cells() {
        let row = record_row(&sample());
        assert_eq!(row.get("execution").unwrap().raw(), "exec-1");
        assert_eq!(row.get("created").unwrap().raw(), "2024-05-01 12:30:00");
        assert!(matches!(row.get("completed"), Some(CellValue::Empty)));
        assert_eq!(row.get("errors").unwrap().raw(), "1");
    }

    #[test]
    fn test_unparseable_timestamp_shown_raw() {
        assert_eq!(CellValue::Timestamp("soon".into()).raw(), "soon");
    }

    #[test]
    fn test_markdown_render() {
        let out = TableFormatter::new(RECORD_COLUMNS, "record")
            .render(&[record_row(&sample())], OutputFormat::Md);
        insta::assert_snapshot!(out, @r###"
        | EXECUTION | EVENT ID | EVENT NAME | STATUS | CREATED | COMPLETED | ERRORS |
        |---|---|---|---|---|---|---|
        | exec-1 | evt-1 | pull_request_created | failed | 2024-05-01 12:30:00 | - | 1 |
        "###);
    }

    #[test]
    fn test_markdown_escapes_pipes() {
        assert_eq!(CellValue::Text("a|b".into()).format_md(), "a\\|b");
    }

    #[test]
    fn test_tsv_summary_line() {
        let out = TableFormatter::new(RECORD_COLUMNS, "record").render(&[], OutputFormat::Tsv);
        assert!(out.contains("EXECUTION"));
        assert!(out.contains("record(s) found."));

        let out = TableFormatter::new(RECORD_COLUMNS, "record")
            .with_summary(false)
            .render(&[], OutputFormat::Tsv);
        assert!(!out.contains("found."));
    }

    #[test]
    fn test_column_width_capped() {
        let long = "x".repeat(100);
        let row = TableRow::new().cell("name", CellValue::Text(long));
        let widths = TableFormatter::new(RECORD_COLUMNS, "record").calculate_widths(&[row]);
        assert_eq!(widths[2], 32);
        assert_eq!(widths[0], "EXECUTION".len());
    }
}
