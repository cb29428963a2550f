//! Custom filter compilation
//!
//! Turns user-supplied `{field, operator, value}` triples into a parameterized
//! predicate expression. Field names never appear in the expression text:
//! every path segment is bound through a `#` alias and every literal through a
//! `:` alias, so reserved words are safe at any nesting depth.
//!
//! Filter `i` gets value alias `:v{i}` and one name alias `#f{i}_{j}` per path
//! segment `j`, which keeps aliases unique when the same field is filtered
//! more than once.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::core::error::ValidationError;

/// Comparison applied by one custom filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterOperator {
    #[default]
    Eq,
    Lt,
    Gt,
    Contains,
    BeginsWith,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 5] = [
        FilterOperator::Eq,
        FilterOperator::Lt,
        FilterOperator::Gt,
        FilterOperator::Contains,
        FilterOperator::BeginsWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Lt => "<",
            FilterOperator::Gt => ">",
            FilterOperator::Contains => "contains",
            FilterOperator::BeginsWith => "begins_with",
        }
    }

    /// Strict parse; `None` for anything outside the five operators
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s.trim())
    }

    /// Parse an operator, treating anything unrecognized as equality
    ///
    /// The fallback is long-standing behaviour callers rely on; it is logged so
    /// a typo in a saved filter does not go unnoticed.
    pub fn parse_lenient(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            warn!(operator = s, "unrecognized filter operator, using equality");
            FilterOperator::Eq
        })
    }

    fn render(&self, lhs: &str, rhs: &str) -> String {
        match self {
            FilterOperator::Eq => format!("{} = {}", lhs, rhs),
            FilterOperator::Lt => format!("{} < {}", lhs, rhs),
            FilterOperator::Gt => format!("{} > {}", lhs, rhs),
            FilterOperator::Contains => format!("contains({}, {})", lhs, rhs),
            FilterOperator::BeginsWith => format!("begins_with({}, {})", lhs, rhs),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for FilterOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FilterOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FilterOperator::parse_lenient(&raw))
    }
}

/// One user-supplied filter row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFilter {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl CustomFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Parse the CLI form `FIELD OPERATOR VALUE`
    ///
    /// The value is everything after the operator, so it may contain spaces.
    /// A missing value is reported as an incomplete filter.
    pub fn parse_cli(input: &str, index: usize) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let (field, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        let rest = rest.trim_start();
        let (operator, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));

        if field.is_empty() || operator.is_empty() {
            return Err(ValidationError::FilterSyntax {
                input: input.to_string(),
            });
        }
        if value.trim().is_empty() {
            return Err(ValidationError::IncompleteFilter { index });
        }

        Ok(Self::new(
            field,
            FilterOperator::parse_lenient(operator),
            value.trim(),
        ))
    }

    fn value_is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// Check and normalize a filter list before any query is issued
///
/// Rows with neither field nor value are unused form rows and are dropped.
/// Half-filled rows and non-scalar values are rejected.
pub fn validate_filters(filters: &[CustomFilter]) -> Result<Vec<CustomFilter>, ValidationError> {
    let mut valid = Vec::with_capacity(filters.len());

    for (index, filter) in filters.iter().enumerate() {
        let field = filter.field.trim();
        let value_empty = filter.value_is_empty();

        if field.is_empty() && value_empty {
            continue;
        }
        if field.is_empty() || value_empty {
            return Err(ValidationError::IncompleteFilter { index });
        }
        if filter.value.is_object() || filter.value.is_array() {
            return Err(ValidationError::NonScalarFilterValue {
                field: field.to_string(),
            });
        }

        let value = match &filter.value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other.clone(),
        };
        valid.push(CustomFilter::new(field, filter.operator, value));
    }

    Ok(valid)
}

/// One compiled comparison, expressed purely in aliases
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub operator: FilterOperator,
    /// Name aliases, one per path segment
    pub path: Vec<String>,
    /// Value alias
    pub value: String,
}

/// Parameterized predicate plus its alias tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    /// All conditions joined with `AND`
    pub expression: String,
    /// Name alias -> attribute name (one path segment)
    pub names: BTreeMap<String, String>,
    /// Value alias -> literal
    pub values: BTreeMap<String, Value>,
    pub conditions: Vec<Condition>,
}

impl CompiledFilter {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Attribute path a condition refers to, with aliases resolved
    pub fn resolve_path(&self, condition: &Condition) -> Option<Vec<&str>> {
        condition
            .path
            .iter()
            .map(|alias| self.names.get(alias).map(String::as_str))
            .collect()
    }

    /// Literal bound to a condition's value alias
    pub fn resolve_value(&self, condition: &Condition) -> Option<&Value> {
        self.values.get(&condition.value)
    }
}

/// Compile a validated filter list; `None` when there is nothing to filter on
pub fn compile(filters: &[CustomFilter]) -> Option<CompiledFilter> {
    if filters.is_empty() {
        return None;
    }

    let mut compiled = CompiledFilter::default();
    let mut clauses = Vec::with_capacity(filters.len());

    for (i, filter) in filters.iter().enumerate() {
        let value_alias = format!(":v{}", i);
        let path: Vec<String> = filter
            .field
            .split('.')
            .enumerate()
            .map(|(j, segment)| {
                let alias = format!("#f{}_{}", i, j);
                compiled.names.insert(alias.clone(), segment.to_string());
                alias
            })
            .collect();

        clauses.push(filter.operator.render(&path.join("."), &value_alias));
        compiled.values.insert(value_alias.clone(), filter.value.clone());
        compiled.conditions.push(Condition {
            operator: filter.operator,
            path,
            value: value_alias,
        });
    }

    compiled.expression = clauses.join(" AND ");
    Some(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_strict_and_lenient() {
        assert_eq!(FilterOperator::parse("begins_with"), Some(FilterOperator::BeginsWith));
        assert_eq!(FilterOperator::parse("!="), None);
        assert_eq!(FilterOperator::parse_lenient("!="), FilterOperator::Eq);
        assert_eq!(FilterOperator::parse_lenient(" < "), FilterOperator::Lt);
    }

    #[test]
    fn test_operator_deserializes_leniently() {
        let filter: CustomFilter =
            serde_json::from_value(json!({"field": "status", "operator": "like", "value": "x"}))
                .unwrap();
        assert_eq!(filter.operator, FilterOperator::Eq);

        let filter: CustomFilter =
            serde_json::from_value(json!({"field": "status", "value": "x"})).unwrap();
        assert_eq!(filter.operator, FilterOperator::Eq);
    }

    #[test]
    fn test_compile_single_filter() {
        let compiled =
            compile(&[CustomFilter::new("status", FilterOperator::Eq, "failed")]).unwrap();

        assert_eq!(compiled.expression, "#f0_0 = :v0");
        assert_eq!(compiled.names.get("#f0_0").map(String::as_str), Some("status"));
        assert_eq!(compiled.values.get(":v0"), Some(&json!("failed")));
    }

    #[test]
    fn test_compile_dotted_path_aliases_every_segment() {
        let compiled = compile(&[CustomFilter::new(
            "context.jit_event.owner",
            FilterOperator::BeginsWith,
            "ac",
        )])
        .unwrap();

        assert_eq!(compiled.expression, "begins_with(#f0_0.#f0_1.#f0_2, :v0)");
        assert_eq!(compiled.names.len(), 3);
        assert_eq!(compiled.values.len(), 1);
        assert_eq!(
            compiled.resolve_path(&compiled.conditions[0]),
            Some(vec!["context", "jit_event", "owner"])
        );
    }

    #[test]
    fn test_compile_repeated_field_gets_distinct_aliases() {
        let filters = vec![
            CustomFilter::new("created_at", FilterOperator::Gt, "2024-01-01"),
            CustomFilter::new("created_at", FilterOperator::Lt, "2024-02-01"),
            CustomFilter::new("jit_event_name", FilterOperator::Contains, "pull"),
        ];
        let compiled = compile(&filters).unwrap();

        assert_eq!(
            compiled.expression,
            "#f0_0 > :v0 AND #f1_0 < :v1 AND contains(#f2_0, :v2)"
        );
        // one value alias per filter, one name alias per segment
        assert_eq!(compiled.values.len(), filters.len());
        assert_eq!(compiled.names.len(), 3);
        assert_eq!(compiled.conditions.len(), 3);
    }

    #[test]
    fn test_compile_empty_is_none() {
        assert!(compile(&[]).is_none());
    }

    #[test]
    fn test_validate_rejects_field_without_value() {
        let filters = vec![CustomFilter::new("x", FilterOperator::Eq, "")];
        assert_eq!(
            validate_filters(&filters),
            Err(ValidationError::IncompleteFilter { index: 0 })
        );
    }

    #[test]
    fn test_validate_rejects_value_without_field() {
        let filters = vec![
            CustomFilter::new("status", FilterOperator::Eq, "ok"),
            CustomFilter::new("  ", FilterOperator::Eq, "orphan"),
        ];
        assert_eq!(
            validate_filters(&filters),
            Err(ValidationError::IncompleteFilter { index: 1 })
        );
    }

    #[test]
    fn test_validate_drops_blank_rows_and_trims() {
        let filters = vec![
            CustomFilter::new("", FilterOperator::Eq, ""),
            CustomFilter::new(" status ", FilterOperator::Eq, " failed "),
        ];
        let valid = validate_filters(&filters).unwrap();
        assert_eq!(valid, vec![CustomFilter::new("status", FilterOperator::Eq, "failed")]);
    }

    #[test]
    fn test_validate_rejects_non_scalar() {
        let filters = vec![CustomFilter::new("a", FilterOperator::Eq, json!({"b": 1}))];
        assert!(matches!(
            validate_filters(&filters),
            Err(ValidationError::NonScalarFilterValue { .. })
        ));
    }

    #[test]
    fn test_parse_cli() {
        let f = CustomFilter::parse_cli("jit_event.branch begins_with feature/ x", 0).unwrap();
        assert_eq!(f.field, "jit_event.branch");
        assert_eq!(f.operator, FilterOperator::BeginsWith);
        assert_eq!(f.value, json!("feature/ x"));

        assert_eq!(
            CustomFilter::parse_cli("x =", 2),
            Err(ValidationError::IncompleteFilter { index: 2 })
        );
        assert!(matches!(
            CustomFilter::parse_cli("lonely", 0),
            Err(ValidationError::FilterSyntax { .. })
        ));
    }
}
