//! JSON and CSV export of result sets
//!
//! CSV is lossy: nested values are flattened to JSON text and every data field
//! becomes a string, so an export cannot be read back into the same records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()?
            .to_str()?
            .to_ascii_lowercase()
            .as_str()
        {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

/// Pretty-printed JSON
pub fn to_json<T: Serialize + ?Sized>(data: &T) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// CSV with a header taken from the first record's keys
///
/// Header names are quoted only when they need it. Every data field is quoted;
/// missing and null values become empty strings and containers are written as
/// compact JSON.
pub fn to_csv(records: &[Value]) -> Result<String, ExportError> {
    let Some(first) = records.first() else {
        return Ok(String::new());
    };
    let headers: Vec<&str> = first
        .as_object()
        .map(|obj| obj.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut header = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    header.write_record(&headers)?;

    let mut rows = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(header.into_inner().map_err(|e| e.into_error())?);

    for record in records {
        let fields: Vec<String> = headers
            .iter()
            .map(|key| field_text(record.get(*key)))
            .collect();
        rows.write_record(&fields)?;
    }

    let bytes = rows.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Serialize any list of rows through JSON, then to CSV
pub fn rows_to_csv<T: Serialize>(rows: &[T]) -> Result<String, ExportError> {
    let values = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    to_csv(&values)
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        // numbers and booleans print as-is, containers as compact JSON
        Some(v) => v.to_string(),
    }
}

/// Write rendered content to a file
pub fn write_export(path: &Path, content: &str) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(content.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// `job-executions-<profile>-<timestamp>.<ext>`, filesystem-safe
pub fn default_file_name(profile: &str, now: DateTime<Utc>, format: ExportFormat) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("job-executions-{}-{}.{}", profile, stamp, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_csv_quotes_data_not_header() {
        let records = vec![json!({"a": 1, "b": {"c": 2}})];
        let csv = to_csv(&records).unwrap();
        assert_eq!(csv, "a,b\n\"1\",\"{\"\"c\"\":2}\"\n");
    }

    #[test]
    fn test_csv_header_order_and_missing_fields() {
        let records = vec![
            json!({"status": "failed", "execution_id": "e1", "note": null}),
            json!({"execution_id": "e2", "extra": "ignored"}),
        ];
        let csv = to_csv(&records).unwrap();
        insta::assert_snapshot!(csv, @r###"
        status,execution_id,note
        "failed","e1",""
        "","e2",""
        "###);
    }

    #[test]
    fn test_csv_header_with_comma_is_quoted() {
        let csv = to_csv(&[json!({"a,b": "x \"y\""})]).unwrap();
        assert_eq!(csv, "\"a,b\"\n\"x \"\"y\"\"\"\n");
    }

    #[test]
    fn test_csv_empty() {
        assert_eq!(to_csv(&[]).unwrap(), "");
    }

    #[test]
    fn test_json_is_pretty() {
        let out = to_json(&json!([{"a": 1}])).unwrap();
        assert!(out.contains("\n  {"));
    }

    #[test]
    fn test_default_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            default_file_name("dev", now, ExportFormat::Csv),
            "job-executions-dev-2024-05-01T12-30-00-000Z.csv"
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.JSON")), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_path(Path::new("out.csv")), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_path(Path::new("out.txt")), None);
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_export(&path, "[]").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "[]");
    }
}
