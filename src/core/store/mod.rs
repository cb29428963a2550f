//! Paginated access to the partitioned record store
//!
//! The store exposes one operation that matters: read a single page from a
//! secondary index. Semantics every backend must honour:
//!
//! - `page_size` caps the number of index entries *read*, not returned
//! - the filter is applied after the page is read, so a page can come back
//!   with fewer items than were scanned, including zero
//! - results are ordered by sort key, newest first when `descending`
//! - a continuation token is present whenever more entries may follow
//!
//! Callers never see partially-filtered state; they loop pages until the
//! token is gone or they have what they need.

mod eval;
mod schema;
mod snapshot;

pub use eval::matches;
pub use snapshot::{CollectionStats, SnapshotStore, StoreStatistics};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::catalog::IndexSpec;
use crate::core::filter::CompiledFilter;
use crate::core::session::Session;

/// Code for a missing collection
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

/// Code for a request the store refuses to run
pub const VALIDATION_EXCEPTION: &str = "ValidationException";

/// Code for a failure inside the store itself
pub const INTERNAL_ERROR: &str = "InternalServerError";

/// Error raised by the store, carrying its own code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub code: String,
    pub message: String,
}

impl StoreError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RESOURCE_NOT_FOUND, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(VALIDATION_EXCEPTION, message)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::new(INTERNAL_ERROR, err.to_string())
    }
}

/// Opaque resume position returned with a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(pub Value);

/// Range condition on the index sort key (string comparison, inclusive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortCondition {
    Between(String, String),
    AtLeast(String),
    AtMost(String),
}

impl SortCondition {
    /// Condition for optional lower/upper bounds; `None` when neither is set
    pub fn from_bounds(start: Option<String>, end: Option<String>) -> Option<Self> {
        match (start, end) {
            (Some(lo), Some(hi)) => Some(SortCondition::Between(lo, hi)),
            (Some(lo), None) => Some(SortCondition::AtLeast(lo)),
            (None, Some(hi)) => Some(SortCondition::AtMost(hi)),
            (None, None) => None,
        }
    }

    pub fn accepts(&self, sort_key: &str) -> bool {
        match self {
            SortCondition::Between(lo, hi) => sort_key >= lo.as_str() && sort_key <= hi.as_str(),
            SortCondition::AtLeast(lo) => sort_key >= lo.as_str(),
            SortCondition::AtMost(hi) => sort_key <= hi.as_str(),
        }
    }
}

/// One page read against a secondary index
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub index: &'a IndexSpec,
    pub partition_value: &'a str,
    pub sort: Option<&'a SortCondition>,
    pub filter: Option<&'a CompiledFilter>,
    pub page_size: usize,
    pub descending: bool,
    pub start_after: Option<&'a ContinuationToken>,
}

/// Result of a single page read
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records that passed the filter
    pub items: Vec<Value>,
    /// Index entries read to produce this page
    pub scanned_count: usize,
    pub continuation: Option<ContinuationToken>,
}

/// A store that can serve index page reads
///
/// Each call runs under the credentials of the session passed in; stores
/// must not cache a session between calls.
pub trait RecordStore {
    fn query_page(&self, session: &Session, request: &PageRequest<'_>)
        -> Result<Page, StoreError>;

    /// Read any single record from a collection, `None` when it is empty
    fn probe(&self, session: &Session, collection: &str) -> Result<Option<Value>, StoreError>;
}
