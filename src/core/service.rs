//! Request handlers
//!
//! `run_query` and `run_stuck` take a request through the fixed order: profile
//! check, input validation, credentials, store. Malformed input therefore never
//! reaches the vault. `envelope` turns any outcome into the uniform
//! `{success, ...}` JSON shape.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::core::catalog::{self, QueryTarget, EVENTS_BY_TENANT, PULL_REQUEST_MARKER};
use crate::core::config::Config;
use crate::core::criteria::{QueryCriteria, QueryRequest, StuckCriteria, StuckRequest};
use crate::core::error::ExecscopeError;
use crate::core::filter::{self, CustomFilter, FilterOperator};
use crate::core::query::{self, IndexQuery};
use crate::core::record::EVENT_NAME;
use crate::core::reducer::{self, StuckEntity, StuckStatistics};
use crate::core::session::Session;
use crate::core::store::{RecordStore, SnapshotStore, SortCondition};

/// Successful status-query response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub data: Vec<Value>,
    pub count: usize,
    pub scanned_count: usize,
    pub queries_executed: usize,
    pub total_collected: usize,
    pub profile: Option<String>,
    /// Present only when nothing matched: whether the collection has any data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_has_data: Option<bool>,
}

/// Successful stuck-lookup response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StuckResponse {
    pub success: bool,
    pub data: Vec<StuckEntity>,
    pub statistics: StuckStatistics,
    /// Pull-request events processed
    pub count: usize,
    pub scanned_count: usize,
}

/// Failure envelope
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<&ExecscopeError> for ErrorResponse {
    fn from(err: &ExecscopeError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            code: Some(err.code()),
        }
    }
}

/// Convert a handler outcome into the JSON envelope
pub fn envelope<T: Serialize>(result: &Result<T, ExecscopeError>) -> Value {
    let converted = match result {
        Ok(response) => serde_json::to_value(response),
        Err(err) => serde_json::to_value(ErrorResponse::from(err)),
    };
    converted.unwrap_or_else(|e| {
        serde_json::json!({"success": false, "error": e.to_string(), "code": "SerializationError"})
    })
}

/// Open the snapshot store named by the configuration
pub fn open_store(config: &Config) -> Result<SnapshotStore, ExecscopeError> {
    let path = config.store.as_ref().ok_or(ExecscopeError::NoStore)?;
    if !path.is_dir() {
        return Err(ExecscopeError::StoreNotFound { path: path.clone() });
    }
    Ok(SnapshotStore::open(path)?)
}

/// Validate a status query, then acquire credentials and run it
pub fn run_query(
    config: &Config,
    target: QueryTarget,
    request: &QueryRequest,
) -> Result<QueryResponse, ExecscopeError> {
    Session::require_profile(config)?;
    let criteria = request.validate(target, config.default_limit())?;
    let session = Session::establish(config)?;
    let store = open_store(config)?;
    query_records(&store, &session, config, &criteria)
}

/// Validate a stuck lookup, then acquire credentials and run it
pub fn run_stuck(
    config: &Config,
    request: &StuckRequest,
    now: DateTime<Utc>,
) -> Result<StuckResponse, ExecscopeError> {
    Session::require_profile(config)?;
    let criteria = request.validate(now)?;
    let session = Session::establish(config)?;
    let store = open_store(config)?;
    stuck_pull_requests(&store, &session, config, &criteria, now)
}

/// Status query against job executions or lifecycle events
pub fn query_records<S: RecordStore + ?Sized>(
    store: &S,
    session: &Session,
    config: &Config,
    criteria: &QueryCriteria,
) -> Result<QueryResponse, ExecscopeError> {
    let target = criteria.target;
    let index = target.index();

    info!(
        target = %target,
        tenant = %criteria.tenant_id,
        status = %criteria.status,
        filters = criteria.filters.len(),
        "running status query"
    );

    let index_query = IndexQuery::new(
        index,
        catalog::tenant_status_key(&criteria.tenant_id, &criteria.status),
    )
    .with_sort(criteria.sort_condition())
    .with_filter(criteria.compiled_filter())
    .with_page_size(query::page_size_for(criteria.limit, config.min_page_size()));

    let mut outcome = query::execute(store, session, &index_query)?;
    let total_collected = outcome.total_collected();
    outcome.truncate(criteria.limit);

    let collection_has_data = if outcome.items.is_empty() {
        query::probe_collection(store, session, index.collection)
    } else {
        None
    };

    Ok(QueryResponse {
        success: true,
        count: outcome.items.len(),
        scanned_count: outcome.scanned_count,
        queries_executed: outcome.queries_executed,
        total_collected,
        profile: Some(session.profile.clone()),
        collection_has_data,
        data: outcome.items,
    })
}

/// Pull requests whose latest event is still in flight
pub fn stuck_pull_requests<S: RecordStore + ?Sized>(
    store: &S,
    session: &Session,
    config: &Config,
    criteria: &StuckCriteria,
    now: DateTime<Utc>,
) -> Result<StuckResponse, ExecscopeError> {
    let marker = [CustomFilter::new(
        EVENT_NAME,
        FilterOperator::Contains,
        PULL_REQUEST_MARKER,
    )];
    let index_query = IndexQuery::new(&EVENTS_BY_TENANT, catalog::tenant_key(&criteria.tenant_id))
        .with_sort(SortCondition::from_bounds(criteria.window_start.clone(), None))
        .with_filter(filter::compile(&marker))
        .with_page_size(config.min_page_size());

    let outcome = query::execute(store, session, &index_query)?;
    let report = reducer::reduce(&outcome.items, now).with_query_stats(
        outcome.scanned_count,
        outcome.queries_executed,
        criteria.window_start.clone(),
    );

    info!(
        tenant = %criteria.tenant_id,
        stuck = report.statistics.total_stuck_prs,
        critical = report.statistics.critical_prs,
        warning = report.statistics.warning_prs,
        recent = report.statistics.recent_prs,
        "stuck pull requests reduced"
    );

    Ok(StuckResponse {
        success: true,
        count: outcome.items.len(),
        scanned_count: outcome.scanned_count,
        statistics: report.statistics,
        data: report.entities,
    })
}
