//! CLI command implementations

pub mod completions;
pub mod config;
pub mod events;
pub mod profile;
pub mod query;
pub mod request;
pub mod store;
pub mod stuck;
