//! Collections and secondary indexes the tool knows how to query

use std::fmt;

/// Job-execution records
pub const JOB_EXECUTIONS: &str = "JobExecutions";

/// Raw lifecycle-event records
pub const LIFECYCLE_EVENTS: &str = "JitEvents";

/// Substring of `jit_event_name` that marks pull-request events
pub const PULL_REQUEST_MARKER: &str = "pull_request";

/// A secondary index: which attribute partitions it and which orders it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub collection: &'static str,
    pub name: &'static str,
    pub partition_attribute: &'static str,
    pub sort_attribute: &'static str,
}

/// Job executions by tenant and status
pub const EXECUTIONS_BY_STATUS: IndexSpec = IndexSpec {
    collection: JOB_EXECUTIONS,
    name: "GSI1",
    partition_attribute: "GSI1PK",
    sort_attribute: "GSI1SK",
};

/// Lifecycle events by tenant and status
pub const EVENTS_BY_STATUS: IndexSpec = IndexSpec {
    collection: LIFECYCLE_EVENTS,
    name: "GSI2",
    partition_attribute: "GSI2PK_TENANT_ID_STATUS",
    sort_attribute: "GSI2SK",
};

/// Lifecycle events by tenant, all statuses
pub const EVENTS_BY_TENANT: IndexSpec = IndexSpec {
    collection: LIFECYCLE_EVENTS,
    name: "GSI1",
    partition_attribute: "GSI1PK_TENANT_ID",
    sort_attribute: "GSI1SK",
};

pub const INDEXES: &[IndexSpec] = &[EXECUTIONS_BY_STATUS, EVENTS_BY_STATUS, EVENTS_BY_TENANT];

/// Indexes defined on a collection
pub fn indexes_for(collection: &str) -> impl Iterator<Item = &'static IndexSpec> + '_ {
    INDEXES.iter().filter(move |idx| idx.collection == collection)
}

/// Partition value for the status indexes
pub fn tenant_status_key(tenant_id: &str, status: &str) -> String {
    format!("TENANT#{}#STATUS#{}", tenant_id, status)
}

/// Partition value for the tenant index
pub fn tenant_key(tenant_id: &str) -> String {
    format!("TENANT#{}", tenant_id)
}

/// Which logical collection a status query runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTarget {
    Executions,
    Events,
}

impl QueryTarget {
    pub fn index(&self) -> &'static IndexSpec {
        match self {
            QueryTarget::Executions => &EXECUTIONS_BY_STATUS,
            QueryTarget::Events => &EVENTS_BY_STATUS,
        }
    }
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTarget::Executions => write!(f, "job executions"),
            QueryTarget::Events => write!(f, "lifecycle events"),
        }
    }
}
