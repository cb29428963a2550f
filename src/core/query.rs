//! Pagination-transparent index queries
//!
//! Walks an index partition page by page until the store stops returning a
//! continuation token, buffering everything. The result limit is applied only
//! after the walk finishes: filters run after each page is read, so stopping
//! early could miss matches further down the partition.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::catalog::IndexSpec;
use crate::core::filter::CompiledFilter;
use crate::core::session::Session;
use crate::core::store::{ContinuationToken, PageRequest, RecordStore, SortCondition, StoreError};

/// Everything needed to walk one index partition
#[derive(Debug, Clone)]
pub struct IndexQuery<'a> {
    pub index: &'a IndexSpec,
    pub partition_value: String,
    pub sort: Option<SortCondition>,
    pub filter: Option<CompiledFilter>,
    pub page_size: usize,
}

impl<'a> IndexQuery<'a> {
    pub fn new(index: &'a IndexSpec, partition_value: impl Into<String>) -> Self {
        Self {
            index,
            partition_value: partition_value.into(),
            sort: None,
            filter: None,
            page_size: crate::core::config::MIN_PAGE_SIZE,
        }
    }

    pub fn with_sort(mut self, sort: Option<SortCondition>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_filter(mut self, filter: Option<CompiledFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Page size for a query returning at most `limit` rows
pub fn page_size_for(limit: usize, min_page_size: usize) -> usize {
    limit.max(min_page_size)
}

/// Records collected from a full partition walk
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    /// Every matching record, newest first
    pub items: Vec<Value>,
    pub scanned_count: usize,
    pub queries_executed: usize,
}

impl QueryOutcome {
    pub fn total_collected(&self) -> usize {
        self.items.len()
    }

    /// Keep the first `limit` records
    pub fn truncate(&mut self, limit: usize) {
        self.items.truncate(limit);
    }
}

/// Walk every page of an index partition
///
/// Any page failure aborts the whole walk; no partial results are returned.
pub fn execute<S: RecordStore + ?Sized>(
    store: &S,
    session: &Session,
    query: &IndexQuery<'_>,
) -> Result<QueryOutcome, StoreError> {
    let mut outcome = QueryOutcome::default();
    let mut token: Option<ContinuationToken> = None;

    loop {
        let request = PageRequest {
            index: query.index,
            partition_value: &query.partition_value,
            sort: query.sort.as_ref(),
            filter: query.filter.as_ref(),
            page_size: query.page_size,
            descending: true,
            start_after: token.as_ref(),
        };
        let page = store.query_page(session, &request)?;
        outcome.queries_executed += 1;

        debug!(
            iteration = outcome.queries_executed,
            items = page.items.len(),
            scanned = page.scanned_count,
            more = page.continuation.is_some(),
            "page read"
        );

        outcome.scanned_count += page.scanned_count;
        outcome.items.extend(page.items);

        match page.continuation {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    info!(
        collection = query.index.collection,
        index = query.index.name,
        collected = outcome.items.len(),
        scanned = outcome.scanned_count,
        queries = outcome.queries_executed,
        "pagination complete"
    );
    Ok(outcome)
}

/// Check whether a collection holds any data at all
///
/// Used to tell "no matches" apart from "empty or unreachable collection".
/// Failures are logged and reported as `None`; they never fail a request.
pub fn probe_collection<S: RecordStore + ?Sized>(
    store: &S,
    session: &Session,
    collection: &str,
) -> Option<bool> {
    match store.probe(session, collection) {
        Ok(found) => {
            info!(collection, has_data = found.is_some(), "probed empty result");
            Some(found.is_some())
        }
        Err(error) => {
            warn!(collection, %error, code = %error.code, "probe failed");
            None
        }
    }
}
