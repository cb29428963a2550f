//! Error taxonomy for the query pipeline
//!
//! Every failure a request can hit falls in one of three buckets:
//! configuration (nothing was queried), malformed input (rejected before any
//! store call) and upstream store errors (surfaced verbatim). Empty results are
//! not errors.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::core::store::StoreError;
use crate::core::vault::VaultError;

/// Envelope code reported for configuration failures
pub const CONFIGURATION_ERROR: &str = "ConfigurationError";

/// Envelope code reported for rejected input
pub const VALIDATION_ERROR: &str = "ValidationError";

/// Input rejected before any store call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in all required fields (missing {field})")]
    MissingField { field: &'static str },

    #[error("Tenant ID must be a valid UUID format")]
    InvalidTenantId,

    #[error("Each custom filter must have both field and value filled in")]
    IncompleteFilter { index: usize },

    #[error("Custom filter on '{field}' must have a scalar value")]
    NonScalarFilterValue { field: String },

    #[error("Malformed filter '{input}': expected FIELD OPERATOR VALUE")]
    FilterSyntax { input: String },

    #[error("Invalid date '{value}': expected an ISO-8601 date or timestamp")]
    InvalidDate { value: String },

    #[error("Start date cannot be after end date")]
    InvalidDateRange,

    #[error("Lookback of {hours} hours reaches past the supported date range")]
    InvalidLookback { hours: u32 },

    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },
}

/// Top-level error for library operations
#[derive(Debug, Error, Diagnostic)]
pub enum ExecscopeError {
    #[error("No profile selected. Please select a profile first.")]
    #[diagnostic(
        code(execscope::config::no_profile),
        help("pass --profile, set EXECSCOPE_PROFILE, or add `profile:` to the config file")
    )]
    NoProfile,

    #[error("Failed to get credentials for profile {profile}: {source}")]
    #[diagnostic(code(execscope::config::credentials))]
    Credentials {
        profile: String,
        #[source]
        source: VaultError,
    },

    #[error("No snapshot store configured")]
    #[diagnostic(
        code(execscope::config::no_store),
        help("pass --store <DIR>, set EXECSCOPE_STORE, or add `store:` to the config file")
    )]
    NoStore,

    #[error("Snapshot store not found: {}", path.display())]
    #[diagnostic(
        code(execscope::config::store_missing),
        help("the store directory must contain one <Collection>.jsonl file per collection")
    )]
    StoreNotFound { path: PathBuf },

    #[error(transparent)]
    #[diagnostic(code(execscope::input))]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(code(execscope::store))]
    Store(#[from] StoreError),
}

impl ExecscopeError {
    /// Code reported in the `{success: false, error, code}` envelope
    pub fn code(&self) -> String {
        match self {
            ExecscopeError::NoProfile
            | ExecscopeError::Credentials { .. }
            | ExecscopeError::NoStore
            | ExecscopeError::StoreNotFound { .. } => CONFIGURATION_ERROR.to_string(),
            ExecscopeError::Validation(_) => VALIDATION_ERROR.to_string(),
            ExecscopeError::Store(err) => err.code.clone(),
        }
    }
}
