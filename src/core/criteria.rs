//! Query requests and their validated criteria
//!
//! Requests arrive either as JSON bodies (camelCase keys) or from CLI flags.
//! Validation happens here, before any store call, so malformed input never
//! reaches the executor.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::catalog::QueryTarget;
use crate::core::error::ValidationError;
use crate::core::filter::{self, CompiledFilter, CustomFilter, FilterOperator};
use crate::core::record::{self, EVENT_NAME};
use crate::core::store::SortCondition;

/// Status query as submitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryRequest {
    pub tenant_id: String,
    pub status: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<usize>,
    pub custom_filters: Vec<CustomFilter>,
    /// Substring match on the event name (lifecycle events only)
    pub event_name_filter: Option<String>,
}

/// A status query that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCriteria {
    pub target: QueryTarget,
    pub tenant_id: String,
    pub status: String,
    /// Normalized `YYYY-MM-DDTHH:MM:SS.mmmZ` bounds
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: usize,
    /// Event-name filter first, then custom filters in request order
    pub filters: Vec<CustomFilter>,
}

impl QueryCriteria {
    pub fn sort_condition(&self) -> Option<SortCondition> {
        SortCondition::from_bounds(self.start_date.clone(), self.end_date.clone())
    }

    pub fn compiled_filter(&self) -> Option<CompiledFilter> {
        filter::compile(&self.filters)
    }
}

impl QueryRequest {
    /// Check the request and normalize it into criteria
    ///
    /// Order of checks: required fields, custom filters, tenant id format,
    /// date range. The first failure wins.
    pub fn validate(
        &self,
        target: QueryTarget,
        default_limit: usize,
    ) -> Result<QueryCriteria, ValidationError> {
        let tenant_id = self.tenant_id.trim();
        let status = self.status.trim();
        if tenant_id.is_empty() {
            return Err(ValidationError::MissingField { field: "tenantId" });
        }
        if status.is_empty() {
            return Err(ValidationError::MissingField { field: "status" });
        }

        let custom = filter::validate_filters(&self.custom_filters)?;
        validate_tenant_id(tenant_id)?;

        let start_date = normalize_optional_date(self.start_date.as_deref())?;
        let end_date = normalize_optional_date(self.end_date.as_deref())?;
        if let (Some(start), Some(end)) = (&start_date, &end_date) {
            if start > end {
                return Err(ValidationError::InvalidDateRange);
            }
        }

        let mut filters = Vec::with_capacity(custom.len() + 1);
        if target == QueryTarget::Events {
            if let Some(name) = self
                .event_name_filter
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
            {
                filters.push(CustomFilter::new(EVENT_NAME, FilterOperator::Contains, name));
            }
        }
        filters.extend(custom);

        Ok(QueryCriteria {
            target,
            tenant_id: tenant_id.to_string(),
            status: status.to_string(),
            start_date,
            end_date,
            limit: self.limit.filter(|l| *l > 0).unwrap_or(default_limit),
            filters,
        })
    }
}

/// Stuck pull-request lookup as submitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StuckRequest {
    pub tenant_id: String,
    /// Only consider events from the last N hours
    pub lookback_hours: Option<u32>,
}

/// A stuck lookup that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct StuckCriteria {
    pub tenant_id: String,
    pub window_start: Option<String>,
}

impl StuckRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<StuckCriteria, ValidationError> {
        let tenant_id = self.tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(ValidationError::MissingField { field: "tenantId" });
        }
        validate_tenant_id(tenant_id)?;

        let window_start = match self.lookback_hours.filter(|h| *h > 0) {
            Some(hours) => {
                let start = now
                    .checked_sub_signed(Duration::hours(i64::from(hours)))
                    .ok_or(ValidationError::InvalidLookback { hours })?;
                Some(record::format_sort_key(&start))
            }
            None => None,
        };

        Ok(StuckCriteria {
            tenant_id: tenant_id.to_string(),
            window_start,
        })
    }
}

/// Tenant ids are hyphenated UUIDs
pub fn validate_tenant_id(tenant_id: &str) -> Result<(), ValidationError> {
    match Uuid::try_parse(tenant_id) {
        Ok(_) if tenant_id.len() == 36 => Ok(()),
        _ => Err(ValidationError::InvalidTenantId),
    }
}

/// Normalize a user-entered date bound to the sort-key format
pub fn normalize_date(raw: &str) -> Result<String, ValidationError> {
    record::parse_utc(raw)
        .map(|dt| record::format_sort_key(&dt))
        .ok_or_else(|| ValidationError::InvalidDate {
            value: raw.to_string(),
        })
}

fn normalize_optional_date(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => normalize_date(value).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const TENANT: &str = "3f2b8c1e-9a4d-4e6f-8b2a-1c3d5e7f9a0b";

    fn request() -> QueryRequest {
        QueryRequest {
            tenant_id: TENANT.into(),
            status: "failed".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_deserialize_camel_case() {
        let req: QueryRequest = serde_json::from_value(json!({
            "tenantId": TENANT,
            "status": "failed",
            "startDate": "2024-01-01",
            "limit": 10,
            "customFilters": [{"field": "owner", "operator": "=", "value": "acme"}],
            "eventNameFilter": "pull"
        }))
        .unwrap();
        assert_eq!(req.limit, Some(10));
        assert_eq!(req.custom_filters.len(), 1);
        assert_eq!(req.event_name_filter.as_deref(), Some("pull"));
    }

    #[test]
    fn test_missing_fields() {
        let mut req = request();
        req.status = " ".into();
        assert_eq!(
            req.validate(QueryTarget::Executions, 50),
            Err(ValidationError::MissingField { field: "status" })
        );
    }

    #[test]
    fn test_tenant_must_be_hyphenated_uuid() {
        let mut req = request();
        req.tenant_id = "not-a-uuid".into();
        assert_eq!(
            req.validate(QueryTarget::Executions, 50),
            Err(ValidationError::InvalidTenantId)
        );

        req.tenant_id = TENANT.replace('-', "");
        assert_eq!(
            req.validate(QueryTarget::Executions, 50),
            Err(ValidationError::InvalidTenantId)
        );
    }

    #[test]
    fn test_filter_errors_reported_before_tenant_format() {
        let mut req = request();
        req.tenant_id = "bad".into();
        req.custom_filters = vec![CustomFilter::new("owner", FilterOperator::Eq, "")];
        assert_eq!(
            req.validate(QueryTarget::Executions, 50),
            Err(ValidationError::IncompleteFilter { index: 0 })
        );
    }

    #[test]
    fn test_date_range() {
        let mut req = request();
        req.start_date = Some("2024-02-01".into());
        req.end_date = Some("2024-01-01T10:00:00".into());
        assert_eq!(
            req.validate(QueryTarget::Executions, 50),
            Err(ValidationError::InvalidDateRange)
        );

        req.end_date = Some("2024-03-01T10:00:00+01:00".into());
        let criteria = req.validate(QueryTarget::Executions, 50).unwrap();
        assert_eq!(criteria.start_date.as_deref(), Some("2024-02-01T00:00:00.000Z"));
        assert_eq!(criteria.end_date.as_deref(), Some("2024-03-01T09:00:00.000Z"));
        assert!(matches!(
            criteria.sort_condition(),
            Some(SortCondition::Between(_, _))
        ));
    }

    #[test]
    fn test_invalid_date() {
        let mut req = request();
        req.start_date = Some("last tuesday".into());
        assert!(matches!(
            req.validate(QueryTarget::Executions, 50),
            Err(ValidationError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_limit_defaults() {
        let mut req = request();
        assert_eq!(req.validate(QueryTarget::Executions, 50).unwrap().limit, 50);
        req.limit = Some(0);
        assert_eq!(req.validate(QueryTarget::Executions, 25).unwrap().limit, 25);
        req.limit = Some(7);
        assert_eq!(req.validate(QueryTarget::Executions, 25).unwrap().limit, 7);
    }

    #[test]
    fn test_event_name_filter_precedes_custom_filters() {
        let mut req = request();
        req.event_name_filter = Some(" pull_request ".into());
        req.custom_filters = vec![CustomFilter::new("owner", FilterOperator::Eq, "acme")];

        let events = req.validate(QueryTarget::Events, 50).unwrap();
        assert_eq!(events.filters.len(), 2);
        assert_eq!(events.filters[0].field, "jit_event_name");
        assert_eq!(events.filters[0].operator, FilterOperator::Contains);
        assert_eq!(
            events.compiled_filter().unwrap().expression,
            "contains(#f0_0, :v0) AND #f1_0 = :v1"
        );

        // ignored for job executions
        let execs = req.validate(QueryTarget::Executions, 50).unwrap();
        assert_eq!(execs.filters.len(), 1);
    }

    #[test]
    fn test_stuck_lookback() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let req = StuckRequest {
            tenant_id: TENANT.into(),
            lookback_hours: Some(48),
        };
        let criteria = req.validate(now).unwrap();
        assert_eq!(criteria.window_start.as_deref(), Some("2024-04-30T12:00:00.000Z"));

        let req = StuckRequest {
            tenant_id: TENANT.into(),
            lookback_hours: None,
        };
        assert_eq!(req.validate(now).unwrap().window_start, None);
    }

    #[test]
    fn test_stuck_lookback_out_of_range_is_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let req: StuckRequest = serde_json::from_str(&format!(
            r#"{{"tenantId": "{}", "lookbackHours": {}}}"#,
            TENANT,
            u32::MAX
        ))
        .unwrap();
        assert_eq!(
            req.validate(now),
            Err(ValidationError::InvalidLookback { hours: u32::MAX })
        );
    }
}
