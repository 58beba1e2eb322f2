//! Core Store implementation

use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::record::{Filter, Record};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE TABLE IF NOT EXISTS record_indexes (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    field TEXT NOT NULL,
    value,
    PRIMARY KEY (collection, id, field),
    FOREIGN KEY (collection, id) REFERENCES records(collection, id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_record_indexes_lookup ON record_indexes(collection, field, value);
"#;

/// SQLite-backed record store
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create a store at the given database path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create store directory")?;
        }
        let conn = Connection::open(&path).context(format!("Failed to open database: {}", path.display()))?;
        let store = Self::init(conn, Some(path))?;
        info!(path = ?store.path, "Opened store");
        Ok(store)
    }

    /// Open a private in-memory store (tests, previews)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA).context("Failed to apply schema")?;
        Ok(Self { conn, path })
    }

    /// Database path, or None for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert a new record. Fails if the id already exists in the collection.
    pub fn create<T: Record>(&mut self, record: &T) -> Result<String> {
        debug!(collection = T::collection_name(), id = record.id(), "create: called");
        let tx = self.conn.transaction()?;
        insert_record(&tx, record)?;
        tx.commit()?;
        Ok(record.id().to_string())
    }

    /// Fetch a record by id
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        get_record(&self.conn, id)
    }

    /// Replace an existing record. Fails if it does not exist.
    pub fn update<T: Record>(&mut self, record: &T) -> Result<()> {
        debug!(collection = T::collection_name(), id = record.id(), "update: called");
        let tx = self.conn.transaction()?;
        update_record(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace a record only if its stored `updated_at` still equals `expected_updated_at`
    ///
    /// Returns false when another writer got there first (or the record is gone).
    pub fn update_checked<T: Record>(&mut self, record: &T, expected_updated_at: i64) -> Result<bool> {
        debug!(
            collection = T::collection_name(),
            id = record.id(),
            expected_updated_at,
            "update_checked: called"
        );
        let tx = self.conn.transaction()?;
        let data = serde_json::to_string(record)?;
        let changed = tx.execute(
            "UPDATE records SET data = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2 AND updated_at = ?5",
            params![T::collection_name(), record.id(), data, record.updated_at(), expected_updated_at],
        )?;
        if changed == 0 {
            debug!(id = record.id(), "update_checked: stamp mismatch, not updated");
            return Ok(false);
        }
        write_indexes(&tx, record)?;
        tx.commit()?;
        Ok(true)
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<bool> {
        debug!(collection = T::collection_name(), %id, "delete: called");
        delete_record::<T>(&self.conn, id)
    }

    /// List records matching all filters, ordered by id
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        list_records(&self.conn, filters)
    }

    /// Run `f` inside a single transaction
    ///
    /// Every write made through the batch becomes visible together when `f`
    /// returns Ok; any error rolls all of them back.
    pub fn batch<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Batch<'_>) -> Result<R>,
    {
        let tx = self.conn.transaction()?;
        let mut batch = Batch { tx, writes: 0 };
        match f(&mut batch) {
            Ok(value) => {
                let writes = batch.writes;
                batch.tx.commit().context("Failed to commit batch")?;
                debug!(writes, "batch: committed");
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, writes = batch.writes, "batch: rolled back");
                batch.tx.rollback()?;
                Err(e)
            }
        }
    }
}

/// Writes staged inside one transaction (see [`Store::batch`])
pub struct Batch<'conn> {
    tx: Transaction<'conn>,
    writes: usize,
}

impl Batch<'_> {
    pub fn create<T: Record>(&mut self, record: &T) -> Result<()> {
        insert_record(&self.tx, record)?;
        self.writes += 1;
        Ok(())
    }

    pub fn update<T: Record>(&mut self, record: &T) -> Result<()> {
        update_record(&self.tx, record)?;
        self.writes += 1;
        Ok(())
    }

    pub fn delete<T: Record>(&mut self, id: &str) -> Result<bool> {
        let existed = delete_record::<T>(&self.tx, id)?;
        self.writes += 1;
        Ok(existed)
    }

    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        get_record(&self.tx, id)
    }

    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        list_records(&self.tx, filters)
    }

    /// Number of writes staged so far
    pub fn writes(&self) -> usize {
        self.writes
    }
}

fn insert_record<T: Record>(conn: &Connection, record: &T) -> Result<()> {
    let data = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![T::collection_name(), record.id(), data, record.updated_at()],
    )
    .context(format!("Failed to insert {}/{}", T::collection_name(), record.id()))?;
    write_indexes(conn, record)
}

fn update_record<T: Record>(conn: &Connection, record: &T) -> Result<()> {
    let data = serde_json::to_string(record)?;
    let changed = conn.execute(
        "UPDATE records SET data = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
        params![T::collection_name(), record.id(), data, record.updated_at()],
    )?;
    if changed == 0 {
        return Err(eyre!("Record not found: {}/{}", T::collection_name(), record.id()));
    }
    write_indexes(conn, record)
}

fn write_indexes<T: Record>(conn: &Connection, record: &T) -> Result<()> {
    conn.execute(
        "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
        params![T::collection_name(), record.id()],
    )?;
    let mut stmt =
        conn.prepare_cached("INSERT INTO record_indexes (collection, id, field, value) VALUES (?1, ?2, ?3, ?4)")?;
    for (field, value) in record.indexed_fields() {
        stmt.execute(params![T::collection_name(), record.id(), field, value.sql_value()])?;
    }
    Ok(())
}

fn delete_record<T: Record>(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM records WHERE collection = ?1 AND id = ?2",
        params![T::collection_name(), id],
    )?;
    Ok(deleted > 0)
}

fn get_record<T: Record>(conn: &Connection, id: &str) -> Result<Option<T>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
            params![T::collection_name(), id],
            |row| row.get(0),
        )
        .optional()?;
    match data {
        Some(data) => Ok(Some(
            serde_json::from_str(&data).context(format!("Corrupt record {}/{}", T::collection_name(), id))?,
        )),
        None => Ok(None),
    }
}

fn list_records<T: Record>(conn: &Connection, filters: &[Filter]) -> Result<Vec<T>> {
    let mut sql = String::from("SELECT r.data FROM records r WHERE r.collection = ?1");
    let mut values = vec![rusqlite::types::Value::Text(T::collection_name().to_string())];

    for filter in filters {
        values.push(rusqlite::types::Value::Text(filter.field.clone()));
        let field_param = values.len();
        values.push(filter.value.sql_value());
        let value_param = values.len();
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM record_indexes i WHERE i.collection = r.collection AND i.id = r.id \
             AND i.field = ?{} AND i.value {} ?{})",
            field_param,
            filter.op.as_sql(),
            value_param
        ));
    }
    sql.push_str(" ORDER BY r.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;

    let mut records = Vec::new();
    for row in rows {
        let data = row?;
        records.push(serde_json::from_str(&data)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FilterOp, IndexValue};
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        topic: String,
        rank: i64,
        updated_at: i64,
    }

    impl Note {
        fn new(id: &str, topic: &str, rank: i64) -> Self {
            Self {
                id: id.to_string(),
                topic: topic.to_string(),
                rank,
                updated_at: 1,
            }
        }
    }

    impl Record for Note {
        fn id(&self) -> &str {
            &self.id
        }

        fn updated_at(&self) -> i64 {
            self.updated_at
        }

        fn collection_name() -> &'static str {
            "notes"
        }

        fn indexed_fields(&self) -> HashMap<String, IndexValue> {
            let mut fields = HashMap::new();
            fields.insert("topic".to_string(), IndexValue::String(self.topic.clone()));
            fields.insert("rank".to_string(), IndexValue::Int(self.rank));
            fields
        }
    }

    #[test]
    fn test_create_and_get() {
        let mut store = Store::open_in_memory().unwrap();
        store.create(&Note::new("n1", "graph", 1)).unwrap();

        let note: Note = store.get("n1").unwrap().unwrap();
        assert_eq!(note.topic, "graph");
        assert!(store.get::<Note>("missing").unwrap().is_none());
    }

    #[test]
    fn test_create_duplicate_fails() {
        let mut store = Store::open_in_memory().unwrap();
        store.create(&Note::new("n1", "graph", 1)).unwrap();
        assert!(store.create(&Note::new("n1", "other", 2)).is_err());
    }

    #[test]
    fn test_list_with_filters() {
        let mut store = Store::open_in_memory().unwrap();
        store.create(&Note::new("n1", "graph", 1)).unwrap();
        store.create(&Note::new("n2", "graph", 5)).unwrap();
        store.create(&Note::new("n3", "dates", 7)).unwrap();

        let graph: Vec<Note> = store
            .list(&[Filter::eq("topic", IndexValue::String("graph".to_string()))])
            .unwrap();
        assert_eq!(graph.len(), 2);

        let ranked: Vec<Note> = store
            .list(&[Filter::new("rank", FilterOp::Gt, IndexValue::Int(4))])
            .unwrap();
        let ids: Vec<&str> = ranked.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n2", "n3"]);

        let both: Vec<Note> = store
            .list(&[
                Filter::eq("topic", IndexValue::String("graph".to_string())),
                Filter::new("rank", FilterOp::Gte, IndexValue::Int(5)),
            ])
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, "n2");
    }

    #[test]
    fn test_update_reindexes() {
        let mut store = Store::open_in_memory().unwrap();
        let mut note = Note::new("n1", "graph", 1);
        store.create(&note).unwrap();

        note.topic = "dates".to_string();
        store.update(&note).unwrap();

        let graph: Vec<Note> = store
            .list(&[Filter::eq("topic", IndexValue::String("graph".to_string()))])
            .unwrap();
        assert!(graph.is_empty());
        assert!(store.update(&Note::new("missing", "x", 0)).is_err());
    }

    #[test]
    fn test_update_checked_detects_stale_stamp() {
        let mut store = Store::open_in_memory().unwrap();
        let mut note = Note::new("n1", "graph", 1);
        store.create(&note).unwrap();

        note.updated_at = 2;
        assert!(store.update_checked(&note, 1).unwrap());

        // A second writer still holding stamp 1 loses
        let mut stale = Note::new("n1", "stale", 1);
        stale.updated_at = 3;
        assert!(!store.update_checked(&stale, 1).unwrap());

        let stored: Note = store.get("n1").unwrap().unwrap();
        assert_eq!(stored.topic, "graph");
        assert_eq!(stored.updated_at, 2);
    }

    #[test]
    fn test_delete_removes_indexes() {
        let mut store = Store::open_in_memory().unwrap();
        store.create(&Note::new("n1", "graph", 1)).unwrap();
        assert!(store.delete::<Note>("n1").unwrap());
        assert!(!store.delete::<Note>("n1").unwrap());

        let graph: Vec<Note> = store
            .list(&[Filter::eq("topic", IndexValue::String("graph".to_string()))])
            .unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_batch_commits_all() {
        let mut store = Store::open_in_memory().unwrap();
        let writes = store
            .batch(|b| {
                b.create(&Note::new("n1", "graph", 1))?;
                b.create(&Note::new("n2", "graph", 2))?;
                Ok(b.writes())
            })
            .unwrap();

        assert_eq!(writes, 2);
        assert_eq!(store.list::<Note>(&[]).unwrap().len(), 2);
    }

    #[test]
    fn test_batch_rolls_back_on_error() {
        let mut store = Store::open_in_memory().unwrap();
        let result: Result<()> = store.batch(|b| {
            b.create(&Note::new("n1", "graph", 1))?;
            b.create(&Note::new("n2", "graph", 2))?;
            Err(eyre!("injected failure"))
        });

        assert!(result.is_err());
        assert!(store.list::<Note>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_batch_rolls_back_on_constraint_violation() {
        let mut store = Store::open_in_memory().unwrap();
        let result: Result<()> = store.batch(|b| {
            b.create(&Note::new("n1", "graph", 1))?;
            b.create(&Note::new("n1", "graph", 2))?;
            Ok(())
        });

        assert!(result.is_err());
        assert!(store.get::<Note>("n1").unwrap().is_none());
    }

    #[test]
    fn test_open_persists_to_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("wbs.db");
        {
            let mut store = Store::open(&path).unwrap();
            store.create(&Note::new("n1", "graph", 1)).unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(store.get::<Note>("n1").unwrap().is_some());
    }
}
