//! Snapshot database schema

use super::{SnapshotStore, StoreError};

impl SnapshotStore {
    /// Create the in-memory tables
    pub(super) fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            -- One row per loaded collection
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                item_count INTEGER NOT NULL DEFAULT 0
            );

            -- Raw records, in load order
            CREATE TABLE IF NOT EXISTS items (
                collection TEXT NOT NULL,
                seq INTEGER NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, seq)
            );

            -- Sparse secondary index entries: a record appears in an index
            -- only when it carries both the partition and sort attributes
            CREATE TABLE IF NOT EXISTS index_entries (
                collection TEXT NOT NULL,
                index_name TEXT NOT NULL,
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                seq INTEGER NOT NULL,
                PRIMARY KEY (collection, index_name, pk, sk, seq)
            );
            "#,
        )?;
        Ok(())
    }
}
