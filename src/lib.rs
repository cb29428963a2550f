//! execscope: workflow execution debugging toolkit
//!
//! Queries partitioned, indexed snapshots of job-execution and lifecycle-event
//! records, applies ad-hoc filters, and reduces pull-request event histories to
//! the set of pull requests that are stuck in flight.

pub mod cli;
pub mod core;
