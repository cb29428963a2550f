//! Snapshot-backed record store
//!
//! A snapshot is a directory holding one `<Collection>.jsonl` (one record per
//! line) or `<Collection>.json` (an array of records) file per collection.
//! Everything is loaded into an in-memory SQLite database and indexed with the
//! secondary indexes from the catalog. Records lacking an index's partition or
//! sort attribute are left out of that index.

use std::fs;
use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{
    eval, ContinuationToken, Page, PageRequest, RecordStore, SortCondition, StoreError,
    INTERNAL_ERROR,
};
use crate::core::catalog;
use crate::core::session::Session;

/// Record store backed by an in-memory SQLite snapshot
pub struct SnapshotStore {
    pub(super) conn: Connection,
}

/// Per-collection counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub name: String,
    pub source: String,
    pub item_count: usize,
    pub index_entries: usize,
}

/// What a snapshot holds
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStatistics {
    pub collections: Vec<CollectionStats>,
}

impl StoreStatistics {
    pub fn total_items(&self) -> usize {
        self.collections.iter().map(|c| c.item_count).sum()
    }
}

/// Resume position inside one index partition
#[derive(Debug, Serialize, Deserialize)]
struct Cursor {
    pk: String,
    sk: String,
    seq: i64,
}

impl SnapshotStore {
    /// Empty store with no collections
    pub fn empty() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Load every collection file in a snapshot directory
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let mut store = Self::empty()?;

        let files = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    warn!(%error, "skipping unreadable snapshot entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file());

        for entry in files {
            let path = entry.path();
            let is_array = match path.extension().and_then(|e| e.to_str()) {
                Some("jsonl") => false,
                Some("json") => true,
                _ => continue,
            };
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = fs::read_to_string(path).map_err(|e| {
                StoreError::new(
                    INTERNAL_ERROR,
                    format!("Failed to read {}: {}", path.display(), e),
                )
            })?;
            let records = if is_array {
                parse_array(&content, path)
            } else {
                parse_lines(&content, path)
            };
            store.insert_collection(name, &path.display().to_string(), records)?;
        }

        let stats = store.statistics()?;
        info!(
            dir = %dir.display(),
            collections = stats.collections.len(),
            items = stats.total_items(),
            "loaded snapshot"
        );
        Ok(store)
    }

    /// Build a store from in-memory collections
    pub fn from_collections<I, S>(collections: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: AsRef<str>,
    {
        let mut store = Self::empty()?;
        for (name, records) in collections {
            store.insert_collection(name.as_ref(), "memory", records)?;
        }
        Ok(store)
    }

    /// Add records to a collection, creating it if needed
    pub fn insert_collection(
        &mut self,
        name: &str,
        source: &str,
        records: Vec<Value>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        let first_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM items WHERE collection = ?1",
            params![name],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO collections (name, source, item_count) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                 source = collections.source || ', ' || excluded.source,
                 item_count = collections.item_count + excluded.item_count",
            params![name, source, records.len() as i64],
        )?;

        {
            let mut insert_item =
                tx.prepare("INSERT INTO items (collection, seq, body) VALUES (?1, ?2, ?3)")?;
            let mut insert_entry = tx.prepare(
                "INSERT OR IGNORE INTO index_entries (collection, index_name, pk, sk, seq)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for (offset, record) in records.iter().enumerate() {
                let seq = first_seq + offset as i64;
                insert_item.execute(params![name, seq, record.to_string()])?;

                for index in catalog::indexes_for(name) {
                    let pk = record.get(index.partition_attribute).and_then(Value::as_str);
                    let sk = record.get(index.sort_attribute).and_then(Value::as_str);
                    if let (Some(pk), Some(sk)) = (pk, sk) {
                        insert_entry.execute(params![name, index.name, pk, sk, seq])?;
                    }
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn has_collection(&self, name: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM collections WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn statistics(&self) -> Result<StoreStatistics, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.name, c.source, c.item_count,
                    (SELECT COUNT(*) FROM index_entries e WHERE e.collection = c.name)
             FROM collections c ORDER BY c.name",
        )?;
        let collections = stmt
            .query_map([], |row| {
                Ok(CollectionStats {
                    name: row.get(0)?,
                    source: row.get(1)?,
                    item_count: row.get::<_, i64>(2)? as usize,
                    index_entries: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StoreStatistics { collections })
    }

    fn require_collection(&self, name: &str) -> Result<(), StoreError> {
        if self.has_collection(name)? {
            Ok(())
        } else {
            Err(StoreError::not_found(format!(
                "Requested resource not found: Table: {} not found",
                name
            )))
        }
    }
}

impl RecordStore for SnapshotStore {
    fn query_page(
        &self,
        session: &Session,
        request: &PageRequest<'_>,
    ) -> Result<Page, StoreError> {
        let index = request.index;
        if request.page_size == 0 {
            return Err(StoreError::invalid(
                "Limit must be greater than or equal to 1",
            ));
        }
        self.require_collection(index.collection)?;

        debug!(
            profile = %session.profile,
            region = %session.region,
            collection = index.collection,
            index = index.name,
            partition = request.partition_value,
            "reading page"
        );

        let mut sql = String::from(
            "SELECT e.sk, e.seq, i.body FROM index_entries e
             JOIN items i ON i.collection = e.collection AND i.seq = e.seq
             WHERE e.collection = ? AND e.index_name = ? AND e.pk = ?",
        );
        let mut args: Vec<SqlValue> = vec![
            index.collection.to_string().into(),
            index.name.to_string().into(),
            request.partition_value.to_string().into(),
        ];

        match request.sort {
            Some(SortCondition::Between(lo, hi)) => {
                sql.push_str(" AND e.sk BETWEEN ? AND ?");
                args.push(lo.clone().into());
                args.push(hi.clone().into());
            }
            Some(SortCondition::AtLeast(lo)) => {
                sql.push_str(" AND e.sk >= ?");
                args.push(lo.clone().into());
            }
            Some(SortCondition::AtMost(hi)) => {
                sql.push_str(" AND e.sk <= ?");
                args.push(hi.clone().into());
            }
            None => {}
        }

        let (cmp, order) = if request.descending {
            ("<", "DESC")
        } else {
            (">", "ASC")
        };

        if let Some(token) = request.start_after {
            let cursor: Cursor = serde_json::from_value(token.0.clone())
                .map_err(|_| StoreError::invalid("The provided starting key is invalid"))?;
            if cursor.pk != request.partition_value {
                return Err(StoreError::invalid(
                    "The provided starting key does not match the partition being queried",
                ));
            }
            sql.push_str(&format!(
                " AND (e.sk {cmp} ? OR (e.sk = ? AND e.seq {cmp} ?))"
            ));
            args.push(cursor.sk.clone().into());
            args.push(cursor.sk.into());
            args.push(cursor.seq.into());
        }

        sql.push_str(&format!(" ORDER BY e.sk {order}, e.seq {order} LIMIT ?"));
        args.push((request.page_size as i64).into());

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let scanned_count = rows.len();
        let continuation = match rows.last() {
            Some((sk, seq, _)) if scanned_count == request.page_size => {
                let cursor = Cursor {
                    pk: request.partition_value.to_string(),
                    sk: sk.clone(),
                    seq: *seq,
                };
                let token = serde_json::to_value(cursor)
                    .map_err(|e| StoreError::new(INTERNAL_ERROR, e.to_string()))?;
                Some(ContinuationToken(token))
            }
            _ => None,
        };

        let mut items = Vec::with_capacity(scanned_count);
        for (_, _, body) in rows {
            let item: Value = serde_json::from_str(&body)
                .map_err(|e| StoreError::new(INTERNAL_ERROR, e.to_string()))?;
            if request.filter.map_or(true, |f| eval::matches(f, &item)) {
                items.push(item);
            }
        }

        Ok(Page {
            items,
            scanned_count,
            continuation,
        })
    }

    fn probe(&self, session: &Session, collection: &str) -> Result<Option<Value>, StoreError> {
        self.require_collection(collection)?;
        debug!(profile = %session.profile, collection, "probing collection");

        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM items WHERE collection = ?1 ORDER BY seq LIMIT 1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| serde_json::from_str(&b))
            .transpose()
            .map_err(|e| StoreError::new(INTERNAL_ERROR, e.to_string()))
    }
}

fn parse_lines(content: &str, path: &Path) -> Vec<Value> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<Value>(line) {
            Ok(v) if v.is_object() => Some(v),
            Ok(_) => {
                warn!(file = %path.display(), line = n + 1, "skipping non-object record");
                None
            }
            Err(error) => {
                warn!(file = %path.display(), line = n + 1, %error, "skipping unparseable record");
                None
            }
        })
        .collect()
}

fn parse_array(content: &str, path: &Path) -> Vec<Value> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => items.into_iter().filter(Value::is_object).collect(),
        Ok(_) => {
            warn!(file = %path.display(), "expected a JSON array of records, skipping file");
            Vec::new()
        }
        Err(error) => {
            warn!(file = %path.display(), %error, "skipping unparseable collection file");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{tenant_status_key, EXECUTIONS_BY_STATUS, JOB_EXECUTIONS};
    use crate::core::filter::{compile, CustomFilter, FilterOperator};
    use serde_json::json;
    use tempfile::tempdir;

    fn execution(n: u32, status: &str) -> Value {
        json!({
            "execution_id": format!("exec-{n}"),
            "tenant_id": "t1",
            "status": status,
            "GSI1PK": tenant_status_key("t1", status),
            "GSI1SK": format!("2024-01-{:02}T00:00:00.000Z", n),
        })
    }

    fn store_with(records: Vec<Value>) -> SnapshotStore {
        SnapshotStore::from_collections([(JOB_EXECUTIONS, records)]).unwrap()
    }

    fn request<'a>(
        pk: &'a str,
        page_size: usize,
        start_after: Option<&'a ContinuationToken>,
    ) -> PageRequest<'a> {
        PageRequest {
            index: &EXECUTIONS_BY_STATUS,
            partition_value: pk,
            sort: None,
            filter: None,
            page_size,
            descending: true,
            start_after,
        }
    }

    #[test]
    fn test_page_is_descending_and_capped() {
        let store = store_with((1..=5).map(|n| execution(n, "failed")).collect());
        let session = Session::anonymous();
        let pk = tenant_status_key("t1", "failed");

        let page = store.query_page(&session, &request(&pk, 2, None)).unwrap();
        assert_eq!(page.scanned_count, 2);
        assert_eq!(page.items[0]["execution_id"], "exec-5");
        assert_eq!(page.items[1]["execution_id"], "exec-4");
        assert!(page.continuation.is_some());
    }

    #[test]
    fn test_continuation_resumes_without_overlap() {
        let store = store_with((1..=5).map(|n| execution(n, "failed")).collect());
        let session = Session::anonymous();
        let pk = tenant_status_key("t1", "failed");

        let mut seen = Vec::new();
        let mut token: Option<ContinuationToken> = None;
        loop {
            let page = store
                .query_page(&session, &request(&pk, 2, token.as_ref()))
                .unwrap();
            seen.extend(page.items.iter().map(|i| i["execution_id"].clone()));
            match page.continuation {
                Some(t) => token = Some(t),
                None => break,
            }
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[4], "exec-1");
    }

    #[test]
    fn test_filter_applies_after_read() {
        let mut records: Vec<Value> = (1..=4).map(|n| execution(n, "failed")).collect();
        records[3]["owner"] = json!("acme");
        let store = store_with(records);
        let session = Session::anonymous();
        let pk = tenant_status_key("t1", "failed");
        let filter = compile(&[CustomFilter::new("owner", FilterOperator::Eq, "acme")]).unwrap();

        let mut req = request(&pk, 2, None);
        req.filter = Some(&filter);
        let page = store.query_page(&session, &req).unwrap();

        // newest two are read, only one of them matches
        assert_eq!(page.scanned_count, 2);
        assert_eq!(page.items.len(), 1);
        assert!(page.continuation.is_some());
    }

    #[test]
    fn test_sort_condition_and_partition_isolation() {
        let mut records: Vec<Value> = (1..=5).map(|n| execution(n, "failed")).collect();
        records.push(execution(3, "completed"));
        let store = store_with(records);
        let session = Session::anonymous();
        let pk = tenant_status_key("t1", "failed");
        let sort = SortCondition::Between(
            "2024-01-02T00:00:00.000Z".into(),
            "2024-01-04T00:00:00.000Z".into(),
        );

        let mut req = request(&pk, 100, None);
        req.sort = Some(&sort);
        let page = store.query_page(&session, &req).unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.continuation.is_none());
    }

    #[test]
    fn test_records_without_index_keys_are_not_indexed() {
        let store = store_with(vec![json!({"execution_id": "loose", "status": "failed"})]);
        let stats = store.statistics().unwrap();
        assert_eq!(stats.collections[0].item_count, 1);
        assert_eq!(stats.collections[0].index_entries, 0);
    }

    #[test]
    fn test_unknown_collection_and_bad_page_size() {
        let store = SnapshotStore::empty().unwrap();
        let session = Session::anonymous();

        let err = store.query_page(&session, &request("x", 10, None)).unwrap_err();
        assert_eq!(err.code, "ResourceNotFoundException");

        let err = store.query_page(&session, &request("x", 0, None)).unwrap_err();
        assert_eq!(err.code, "ValidationException");
    }

    #[test]
    fn test_foreign_token_rejected() {
        let store = store_with(vec![execution(1, "failed")]);
        let session = Session::anonymous();
        let token = ContinuationToken(json!({"pk": "other", "sk": "x", "seq": 0}));
        let pk = tenant_status_key("t1", "failed");

        let err = store
            .query_page(&session, &request(&pk, 10, Some(&token)))
            .unwrap_err();
        assert_eq!(err.code, "ValidationException");
    }

    #[test]
    fn test_probe() {
        let store = SnapshotStore::from_collections([
            ("Empty", Vec::new()),
            (JOB_EXECUTIONS, vec![execution(1, "failed")]),
        ])
        .unwrap();
        let session = Session::anonymous();

        assert!(store.probe(&session, "Empty").unwrap().is_none());
        assert!(store.probe(&session, JOB_EXECUTIONS).unwrap().is_some());
        assert!(store.probe(&session, "Missing").is_err());
    }

    #[test]
    fn test_open_directory_skips_corrupt_lines() {
        let dir = tempdir().unwrap();
        let line = execution(1, "failed").to_string();
        fs::write(
            dir.path().join("JobExecutions.jsonl"),
            format!("{line}\nnot json\n\n[1,2]\n"),
        )
        .unwrap();
        fs::write(dir.path().join("JitEvents.json"), "[]").unwrap();
        fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let store = SnapshotStore::open(dir.path()).unwrap();
        let stats = store.statistics().unwrap();
        let names: Vec<_> = stats.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["JitEvents", "JobExecutions"]);
        assert_eq!(stats.total_items(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_open_directory_skips_non_file_entries() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("JobExecutions.jsonl"),
            execution(1, "failed").to_string(),
        )
        .unwrap();
        fs::create_dir(dir.path().join("archive.jsonl")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("missing.jsonl"),
            dir.path().join("JitEvents.jsonl"),
        )
        .unwrap();

        let store = SnapshotStore::open(dir.path()).unwrap();
        let stats = store.statistics().unwrap();
        let names: Vec<_> = stats.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["JobExecutions"]);
        assert_eq!(stats.total_items(), 1);
    }
}
