//! Latest-state-per-pull-request reduction
//!
//! Collapses a pull request's event history into its most recent event, keeps
//! the pull requests whose latest event is still in flight, and ranks them by
//! how long they have been waiting.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::core::record::{self, EventRecord};

/// Statuses that mean the work has not finished
pub const IN_FLIGHT_STATUSES: &[&str] = &["started", "creating", "job_sent"];

pub const CRITICAL_MINUTES: i64 = 10;
pub const WARNING_MINUTES: i64 = 3;

/// Identity of one pull request across its events
///
/// Components are kept in canonical text form so a numeric `42` and a string
/// `"42"` name the same pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub owner: String,
    pub repository: String,
    pub branch: String,
    pub pull_request_number: String,
}

impl EntityKey {
    /// Key for a record, `None` when any component is missing
    pub fn from_record(record: &EventRecord<'_>) -> Option<Self> {
        Some(Self {
            owner: record.payload_text("owner")?,
            repository: record.payload_text("original_repository")?,
            branch: record.payload_text("branch")?,
            pull_request_number: record.payload_text("pull_request_number")?,
        })
    }
}

/// How long an entity has been stuck
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Critical,
    Warning,
    Recent,
}

impl Urgency {
    pub fn from_elapsed_minutes(minutes: i64) -> Self {
        if minutes >= CRITICAL_MINUTES {
            Urgency::Critical
        } else if minutes >= WARNING_MINUTES {
            Urgency::Warning
        } else {
            Urgency::Recent
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Critical => "Critical",
            Urgency::Warning => "Warning",
            Urgency::Recent => "Recent",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One stuck pull request, projected for display and export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StuckEntity {
    pub jit_event_id: Option<String>,
    pub execution_id: Option<String>,
    pub created_at: Option<String>,
    pub status: Option<String>,
    pub jit_event_name: Option<String>,
    pub branch: Option<String>,
    pub original_repository: Option<String>,
    pub owner: Option<String>,
    pub pull_request_number: Option<Value>,
    pub pull_request_title: Option<String>,
    pub commit_head_sha: Option<String>,
    pub url: Option<String>,
    pub updated_at: Option<String>,
    pub user_vendor_name: Option<String>,
    pub asset_name: Option<String>,
    pub control_name: Option<String>,
    pub elapsed_minutes: i64,
    pub urgency_level: Urgency,
    pub urgency_text: &'static str,
    pub time_ago: String,
}

impl StuckEntity {
    fn project(record: &EventRecord<'_>, elapsed_minutes: i64) -> Self {
        let urgency = Urgency::from_elapsed_minutes(elapsed_minutes);
        Self {
            jit_event_id: record.text_at(record::EVENT_ID),
            execution_id: record.text_at(record::EXECUTION_ID),
            created_at: record.text_at(record::CREATED_AT),
            status: record.text_at(record::STATUS),
            jit_event_name: record.text_at(record::EVENT_NAME),
            branch: record.payload_text("branch"),
            original_repository: record.payload_text("original_repository"),
            owner: record.payload_text("owner"),
            pull_request_number: record.payload_at("pull_request_number").cloned(),
            pull_request_title: record.payload_text("pull_request_title"),
            commit_head_sha: record.payload_text("commits.head_sha"),
            url: record.payload_text("url"),
            updated_at: record.payload_text("updated_at"),
            user_vendor_name: record.payload_text("user_vendor_name"),
            asset_name: record.text_at("asset_name"),
            control_name: record.text_at("control_name"),
            elapsed_minutes,
            urgency_level: urgency,
            urgency_text: urgency.label(),
            time_ago: time_ago(elapsed_minutes),
        }
    }
}

/// Aggregate figures for a stuck report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StuckStatistics {
    pub total_stuck_prs: usize,
    pub total_pr_events_processed: usize,
    pub total_unique_prs_analyzed: usize,
    pub total_scanned: usize,
    pub queries_executed: usize,
    pub date_range_start: Option<String>,
    pub critical_prs: usize,
    pub warning_prs: usize,
    pub recent_prs: usize,
    pub repositories: Vec<String>,
    pub owners: Vec<String>,
    pub branches: Vec<String>,
    pub oldest_execution: Option<String>,
    pub newest_execution: Option<String>,
    pub event_types: Vec<String>,
    pub stuck_statuses: Vec<String>,
    pub unparseable_timestamps: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StuckReport {
    pub entities: Vec<StuckEntity>,
    pub statistics: StuckStatistics,
}

impl StuckReport {
    /// Attach counters from the query that produced the input records
    pub fn with_query_stats(
        mut self,
        scanned: usize,
        queries: usize,
        window_start: Option<String>,
    ) -> Self {
        self.statistics.total_scanned = scanned;
        self.statistics.queries_executed = queries;
        self.statistics.date_range_start = window_start;
        self
    }
}

/// Latest record per entity, in order of first appearance
///
/// Records without a complete key are skipped. On equal `created_at` the
/// first record seen wins; an unparseable timestamp never beats a parseable one.
pub fn latest_per_entity(records: &[Value]) -> Vec<(EntityKey, &Value)> {
    let mut positions: HashMap<EntityKey, usize> = HashMap::new();
    let mut latest: Vec<(EntityKey, &Value)> = Vec::new();

    for raw in records {
        let record = EventRecord::new(raw);
        let Some(key) = EntityKey::from_record(&record) else {
            continue;
        };

        if let Some(&pos) = positions.get(&key) {
            let current = EventRecord::new(latest[pos].1);
            if record.created_at_utc() > current.created_at_utc() {
                latest[pos].1 = raw;
            }
        } else {
            positions.insert(key.clone(), latest.len());
            latest.push((key, raw));
        }
    }

    latest
}

/// Reduce pull-request events to the ranked list of stuck pull requests
pub fn reduce(records: &[Value], now: DateTime<Utc>) -> StuckReport {
    let latest = latest_per_entity(records);

    let mut flagged: Vec<(StuckEntity, DateTime<Utc>)> = Vec::new();
    let mut unparseable = 0usize;

    for (_, raw) in &latest {
        let record = EventRecord::new(raw);
        if !record.status().is_some_and(|s| IN_FLIGHT_STATUSES.contains(&s)) {
            continue;
        }
        let Some(created) = record.created_at_utc() else {
            unparseable += 1;
            continue;
        };
        let elapsed = (now - created).num_milliseconds().div_euclid(60_000);
        flagged.push((StuckEntity::project(&record, elapsed), created));
    }

    if unparseable > 0 {
        warn!(count = unparseable, "in-flight pull requests with unparseable created_at");
    }

    // stable: equal rank and age keep first-seen order
    flagged.sort_by(|(a, _), (b, _)| {
        a.urgency_level
            .cmp(&b.urgency_level)
            .then(b.elapsed_minutes.cmp(&a.elapsed_minutes))
    });

    let oldest = flagged
        .iter()
        .min_by_key(|(_, created)| *created)
        .and_then(|(e, _)| e.created_at.clone());
    let newest = flagged
        .iter()
        .max_by_key(|(_, created)| *created)
        .and_then(|(e, _)| e.created_at.clone());

    let entities: Vec<StuckEntity> = flagged.into_iter().map(|(e, _)| e).collect();
    let tier = |u: Urgency| entities.iter().filter(|e| e.urgency_level == u).count();

    let statistics = StuckStatistics {
        total_stuck_prs: entities.len(),
        total_pr_events_processed: records.len(),
        total_unique_prs_analyzed: latest.len(),
        critical_prs: tier(Urgency::Critical),
        warning_prs: tier(Urgency::Warning),
        recent_prs: tier(Urgency::Recent),
        repositories: distinct(entities.iter().map(|e| e.original_repository.as_deref())),
        owners: distinct(entities.iter().map(|e| e.owner.as_deref())),
        branches: distinct(entities.iter().map(|e| e.branch.as_deref())),
        oldest_execution: oldest,
        newest_execution: newest,
        event_types: distinct(entities.iter().map(|e| e.jit_event_name.as_deref())),
        stuck_statuses: distinct(entities.iter().map(|e| e.status.as_deref())),
        unparseable_timestamps: unparseable,
        ..Default::default()
    };

    StuckReport {
        entities,
        statistics,
    }
}

/// Human-readable age: minutes under an hour, whole hours after
pub fn time_ago(elapsed_minutes: i64) -> String {
    fn plural(n: i64, unit: &str) -> String {
        if n == 1 {
            format!("{} {} ago", n, unit)
        } else {
            format!("{} {}s ago", n, unit)
        }
    }

    if elapsed_minutes < 60 {
        plural(elapsed_minutes, "minute")
    } else {
        plural(elapsed_minutes / 60, "hour")
    }
}

/// Distinct non-empty values in first-seen order
fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values.flatten() {
        if !value.is_empty() && !out.iter().any(|v| v == value) {
            out.push(value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    /// Event for PR `pr` created `minutes_ago` before `now()`, without a UTC marker
    fn event(id: &str, pr: Value, status: &str, minutes_ago: i64) -> Value {
        let created = now() - Duration::minutes(minutes_ago);
        json!({
            "jit_event_id": id,
            "execution_id": format!("exec-{id}"),
            "status": status,
            "jit_event_name": "pull_request_updated",
            "created_at": created.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            "context": {"jit_event": {
                "owner": "acme",
                "original_repository": "api",
                "branch": "feature/x",
                "pull_request_number": pr,
                "commits": {"head_sha": "deadbeef"}
            }}
        })
    }

    #[test]
    fn test_urgency_boundaries() {
        assert_eq!(Urgency::from_elapsed_minutes(2), Urgency::Recent);
        assert_eq!(Urgency::from_elapsed_minutes(3), Urgency::Warning);
        assert_eq!(Urgency::from_elapsed_minutes(9), Urgency::Warning);
        assert_eq!(Urgency::from_elapsed_minutes(10), Urgency::Critical);
    }

    #[test]
    fn test_urgency_boundaries_at_second_precision() {
        let at_seconds = |id: &str, pr: u32, seconds_ago: i64| {
            let mut record = event(id, json!(pr), "started", 0);
            let created = now() - Duration::seconds(seconds_ago);
            record["created_at"] = json!(created.format("%Y-%m-%dT%H:%M:%S%.3f").to_string());
            record
        };
        let records = vec![
            at_seconds("s179", 1, 179),
            at_seconds("s180", 2, 180),
            at_seconds("s599", 3, 599),
            at_seconds("s600", 4, 600),
        ];

        let report = reduce(&records, now());
        let tier = |id: &str| {
            report
                .entities
                .iter()
                .find(|e| e.jit_event_id.as_deref() == Some(id))
                .map(|e| (e.elapsed_minutes, e.urgency_level))
                .unwrap()
        };
        assert_eq!(tier("s179"), (2, Urgency::Recent));
        assert_eq!(tier("s180"), (3, Urgency::Warning));
        assert_eq!(tier("s599"), (9, Urgency::Warning));
        assert_eq!(tier("s600"), (10, Urgency::Critical));
    }

    #[test]
    fn test_latest_event_wins() {
        // PR 1 completed after it started: not stuck
        let records = vec![
            event("a", json!(1), "completed", 1),
            event("b", json!(1), "started", 30),
        ];
        let report = reduce(&records, now());
        assert!(report.entities.is_empty());
        assert_eq!(report.statistics.total_unique_prs_analyzed, 1);
        assert_eq!(report.statistics.total_pr_events_processed, 2);
    }

    #[test]
    fn test_numeric_and_text_pr_numbers_are_one_entity() {
        let records = vec![
            event("a", json!(42), "job_sent", 5),
            event("b", json!("42"), "completed", 20),
        ];
        assert_eq!(latest_per_entity(&records).len(), 1);
        let report = reduce(&records, now());
        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.entities[0].jit_event_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let records = vec![
            event("first", json!(7), "started", 15),
            event("second", json!(7), "completed", 15),
        ];
        let report = reduce(&records, now());
        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.entities[0].jit_event_id.as_deref(), Some("first"));
    }

    #[test]
    fn test_incomplete_keys_are_excluded() {
        let mut record = event("a", json!(1), "started", 30);
        record["context"]["jit_event"]
            .as_object_mut()
            .unwrap()
            .remove("branch");
        let report = reduce(&[record], now());
        assert_eq!(report.statistics.total_unique_prs_analyzed, 0);
    }

    #[test]
    fn test_ordering_and_statistics() {
        let records = vec![
            event("r", json!(1), "started", 1),
            event("w", json!(2), "creating", 5),
            event("c1", json!(3), "job_sent", 12),
            event("c2", json!(4), "started", 240),
        ];
        let report = reduce(&records, now());
        let ids: Vec<_> = report
            .entities
            .iter()
            .map(|e| e.jit_event_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["c2", "c1", "w", "r"]);

        let first = &report.entities[0];
        assert_eq!(first.elapsed_minutes, 240);
        assert_eq!(first.time_ago, "4 hours ago");
        assert_eq!(first.commit_head_sha.as_deref(), Some("deadbeef"));

        let stats = &report.statistics;
        assert_eq!((stats.critical_prs, stats.warning_prs, stats.recent_prs), (2, 1, 1));
        assert_eq!(stats.repositories, vec!["api"]);
        assert_eq!(stats.stuck_statuses, vec!["started", "job_sent", "creating"]);
        assert_eq!(stats.oldest_execution, report.entities[0].created_at);
        assert_eq!(stats.newest_execution, report.entities[3].created_at);
    }

    #[test]
    fn test_unparseable_timestamps_counted() {
        let mut record = event("a", json!(1), "started", 30);
        record["created_at"] = json!("not a date");
        let report = reduce(&[record], now());
        assert!(report.entities.is_empty());
        assert_eq!(report.statistics.unparseable_timestamps, 1);
    }

    #[test]
    fn test_reduction_is_deterministic() {
        let records = vec![
            event("a", json!(1), "started", 4),
            event("b", json!(2), "started", 4),
            event("c", json!(3), "creating", 50),
        ];
        assert_eq!(reduce(&records, now()), reduce(&records, now()));
    }

    #[test]
    fn test_time_ago() {
        assert_eq!(time_ago(1), "1 minute ago");
        assert_eq!(time_ago(59), "59 minutes ago");
        assert_eq!(time_ago(60), "1 hour ago");
        assert_eq!(time_ago(150), "2 hours ago");
    }
}
