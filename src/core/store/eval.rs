//! Post-read evaluation of compiled filter expressions
//!
//! Comparisons are type-strict: a string literal never equals a numeric
//! attribute, and any comparison against a missing attribute is false.

use std::cmp::Ordering;

use serde_json::Value;

use crate::core::filter::{CompiledFilter, Condition, FilterOperator};

/// Whether a record satisfies every condition of a compiled filter
pub fn matches(filter: &CompiledFilter, item: &Value) -> bool {
    filter
        .conditions
        .iter()
        .all(|condition| condition_holds(filter, condition, item))
}

fn condition_holds(filter: &CompiledFilter, condition: &Condition, item: &Value) -> bool {
    let Some(path) = filter.resolve_path(condition) else {
        return false;
    };
    let Some(literal) = filter.resolve_value(condition) else {
        return false;
    };
    let Some(actual) = path
        .iter()
        .try_fold(item, |node, segment| node.as_object()?.get(*segment))
    else {
        return false;
    };

    match condition.operator {
        FilterOperator::Eq => compare(actual, literal) == Some(Ordering::Equal),
        FilterOperator::Lt => compare(actual, literal) == Some(Ordering::Less),
        FilterOperator::Gt => compare(actual, literal) == Some(Ordering::Greater),
        FilterOperator::Contains => contains(actual, literal),
        FilterOperator::BeginsWith => match (actual, literal) {
            (Value::String(a), Value::String(prefix)) => a.starts_with(prefix.as_str()),
            _ => false,
        },
    }
}

fn compare(actual: &Value, literal: &Value) -> Option<Ordering> {
    match (actual, literal) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn contains(actual: &Value, literal: &Value) -> bool {
    match (actual, literal) {
        (Value::String(a), Value::String(needle)) => a.contains(needle.as_str()),
        (Value::Array(items), _) => items
            .iter()
            .any(|item| compare(item, literal) == Some(Ordering::Equal)),
        _ => false,
    }
}
