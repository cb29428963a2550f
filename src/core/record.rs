//! Path-based access into schemaless event records
//!
//! Records come back from the store as JSON trees with a fixed core schema and
//! arbitrary extra attributes. Nothing here assumes a field exists; every
//! accessor returns `Option`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

pub const EVENT_ID: &str = "jit_event_id";
pub const EXECUTION_ID: &str = "execution_id";
pub const TENANT_ID: &str = "tenant_id";
pub const STATUS: &str = "status";
pub const CREATED_AT: &str = "created_at";
pub const COMPLETED_AT: &str = "completed_at";
pub const EVENT_NAME: &str = "jit_event_name";
pub const ERRORS: &str = "errors";

/// Where the entity-identifying payload may live, in lookup order
const PAYLOAD_PATHS: &[&str] = &["context.jit_event", "jit_event"];

/// Resolve a dotted path (`a.b.c`) inside a JSON tree
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |node, segment| node.as_object()?.get(segment))
}

/// Render a scalar as text; empty strings, null and containers yield `None`
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a stored timestamp as a UTC instant
///
/// Values without an offset are UTC. Accepts RFC 3339, naive
/// `YYYY-MM-DDTHH:MM[:SS[.fff]]` (with `T` or a space) and bare dates.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical sort-key form: `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn format_sort_key(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read-only view over one event record
#[derive(Debug, Clone, Copy)]
pub struct EventRecord<'a> {
    raw: &'a Value,
}

impl<'a> EventRecord<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &'a Value {
        self.raw
    }

    /// String attribute at a dotted path
    pub fn str_at(&self, path: &str) -> Option<&'a str> {
        get_path(self.raw, path).and_then(Value::as_str)
    }

    /// Scalar attribute at a dotted path, rendered as text
    pub fn text_at(&self, path: &str) -> Option<String> {
        get_path(self.raw, path).and_then(scalar_text)
    }

    pub fn event_id(&self) -> Option<&'a str> {
        self.str_at(EVENT_ID)
    }

    pub fn execution_id(&self) -> Option<&'a str> {
        self.str_at(EXECUTION_ID)
    }

    pub fn status(&self) -> Option<&'a str> {
        self.str_at(STATUS)
    }

    pub fn event_name(&self) -> Option<&'a str> {
        self.str_at(EVENT_NAME)
    }

    pub fn created_at(&self) -> Option<&'a str> {
        self.str_at(CREATED_AT)
    }

    pub fn completed_at(&self) -> Option<&'a str> {
        self.str_at(COMPLETED_AT)
    }

    /// `created_at` as a UTC instant (missing offset means UTC)
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at().and_then(parse_utc)
    }

    /// Number of entries in the `errors` array, if present
    pub fn error_count(&self) -> usize {
        get_path(self.raw, ERRORS)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Entity-identifying payload object
    pub fn payload(&self) -> Option<&'a Value> {
        PAYLOAD_PATHS
            .iter()
            .filter_map(|path| get_path(self.raw, path))
            .find(|v| v.is_object())
    }

    /// Attribute inside the payload at a dotted path
    pub fn payload_at(&self, path: &str) -> Option<&'a Value> {
        self.payload().and_then(|p| get_path(p, path))
    }

    /// Scalar payload attribute rendered as text
    pub fn payload_text(&self, path: &str) -> Option<String> {
        self.payload_at(path).and_then(scalar_text)
    }
}
