//! Core module - query pipeline, store access and reduction

pub mod catalog;
pub mod config;
pub mod criteria;
pub mod error;
pub mod export;
pub mod filter;
pub mod query;
pub mod record;
pub mod reducer;
pub mod service;
pub mod session;
pub mod store;
pub mod vault;

pub use catalog::{IndexSpec, QueryTarget};
pub use config::{Config, CredentialSource};
pub use criteria::{QueryCriteria, QueryRequest, StuckCriteria, StuckRequest};
pub use error::{ExecscopeError, ValidationError};
pub use filter::{CompiledFilter, CustomFilter, FilterOperator};
pub use reducer::{StuckEntity, StuckReport, StuckStatistics, Urgency};
pub use session::Session;
pub use store::{RecordStore, SnapshotStore, StoreError};
pub use vault::{Credentials, VaultClient, VaultError};
