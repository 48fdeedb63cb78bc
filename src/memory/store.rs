//! SQLite-backed memory layer.
//!
//! Every write embeds the memory text, then inserts the row, its vector and an
//! audit entry in one transaction. Deleting a memory also removes its content
//! chunks (rows cascade; chunk vectors are removed explicitly since vec0 tables
//! take no foreign keys).

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

use super::page::source_id_for;
use super::types::{CreatedAt, MemoryKind, MemoryRecord};
use super::{embedding_to_bytes, l2_to_similarity, MemoryStore};
use crate::embedding::EmbeddingProvider;

/// Tags written into the memory text; metadata keeps the full list.
const TAGS_IN_TEXT: usize = 5;

/// A page visit to be stored as a browser-tab memory.
#[derive(Debug, Clone)]
pub struct PageVisit {
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub synopsis: String,
    pub tags: Vec<String>,
    /// Leading page text kept in metadata until chunks are stored.
    pub preview: String,
}

impl PageVisit {
    fn memory_text(&self) -> String {
        browser_memory_text(&self.title, &self.url, &self.synopsis, &self.tags)
    }
}

fn browser_memory_text(title: &str, url: &str, synopsis: &str, tags: &[String]) -> String {
    let shown: Vec<&str> = tags.iter().take(TAGS_IN_TEXT).map(String::as_str).collect();
    format!(
        "Visited: {title}\nURL: {url}\nSummary: {synopsis}\nTags: {}",
        shown.join(", ")
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub deleted: bool,
    pub chunks_removed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearOutcome {
    pub memories_removed: usize,
    pub chunks_removed: usize,
}

pub struct SqliteMemoryStore {
    conn: Arc<Mutex<Connection>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteMemoryStore {
    pub fn new(conn: Arc<Mutex<Connection>>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { conn, embedder }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))
    }

    /// Store a free-text memory. Returns its id.
    pub fn add_memory(
        &self,
        user_id: &str,
        text: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String> {
        self.add_memory_at(user_id, text, metadata, Utc::now())
    }

    /// [`add_memory`](Self::add_memory) with an explicit creation time.
    pub fn add_memory_at(
        &self,
        user_id: &str,
        text: &str,
        metadata: Option<Map<String, Value>>,
        created_at: DateTime<Utc>,
    ) -> Result<String> {
        anyhow::ensure!(!text.trim().is_empty(), "memory text must not be empty");

        let mut metadata = metadata.unwrap_or_default();
        let epoch = created_at.timestamp_millis() as f64 / 1000.0;
        metadata
            .entry("creation_timestamp")
            .or_insert_with(|| json!(epoch));
        metadata
            .entry("temporal_id")
            .or_insert_with(|| json!(format!("gen_{}_{user_id}", created_at.timestamp())));

        let embedding = self.embedder.embed(text).context("failed to embed memory")?;
        let id = uuid::Uuid::now_v7().to_string();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let kind = kind_of(&metadata);
        let metadata_json = Value::Object(metadata).to_string();
        tx.execute(
            "INSERT INTO memories (id, user_id, kind, content, created_at, updated_at, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)",
            params![
                id,
                user_id,
                kind.as_str(),
                text,
                format_timestamp(created_at),
                metadata_json
            ],
        )?;
        tx.execute(
            "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(&embedding)],
        )?;
        write_audit_log(&tx, "create", &id, None)?;
        tx.commit()?;

        tracing::debug!(id = %id, user_id, "memory stored");
        Ok(id)
    }

    /// Store a page visit with its page fields in metadata.
    pub fn add_browser_memory(&self, visit: &PageVisit) -> Result<String> {
        let now = Utc::now();
        let mut metadata = Map::new();
        metadata.insert("url".into(), json!(visit.url));
        metadata.insert("title".into(), json!(visit.title));
        metadata.insert("synopsis".into(), json!(visit.synopsis));
        metadata.insert("tags".into(), json!(visit.tags));
        metadata.insert(
            "domain".into(),
            json!(source_id_for(&visit.url)),
        );
        metadata.insert("content_type".into(), json!(MemoryKind::BrowserTab.as_str()));
        if !visit.preview.is_empty() {
            metadata.insert("preview".into(), json!(visit.preview));
        }
        metadata.insert(
            "temporal_id".into(),
            json!(format!("mem_{}_{}", now.timestamp(), visit.user_id)),
        );

        self.add_memory_at(&visit.user_id, &visit.memory_text(), Some(metadata), now)
    }

    /// Replace the synopsis and tags of a browser-tab memory and re-embed it.
    ///
    /// Returns `false` when no memory has that id.
    pub fn update_page_summary(&self, id: &str, synopsis: &str, tags: &[String]) -> Result<bool> {
        let Some(record) = self.get(id)? else {
            return Ok(false);
        };

        let mut metadata = record.metadata.clone().unwrap_or_default();
        metadata.insert("synopsis".into(), json!(synopsis));
        metadata.insert("tags".into(), json!(tags));

        let info = record.page_info();
        let url = info.url.unwrap_or_default();
        let text = browser_memory_text(&info.title, &url, synopsis, tags);
        let embedding = self
            .embedder
            .embed(&text)
            .context("failed to embed updated memory")?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE memories SET content = ?1, metadata = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                text,
                Value::Object(metadata).to_string(),
                format_timestamp(Utc::now()),
                id
            ],
        )?;
        tx.execute("DELETE FROM memories_vec WHERE id = ?1", [id])?;
        tx.execute(
            "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(&embedding)],
        )?;
        write_audit_log(&tx, "update", id, Some(&json!({"reason": "page_summary"})))?;
        tx.commit()?;
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT id, content, created_at, metadata, user_id FROM memories WHERE id = ?1",
                [id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Delete one memory of `user_id` and every content chunk derived from it.
    pub fn delete(&self, id: &str, user_id: &str) -> Result<DeleteOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let owned: bool = tx
            .query_row(
                "SELECT COUNT(*) FROM memories WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |r| r.get::<_, i64>(0),
            )
            .map(|n| n > 0)?;
        if !owned {
            return Ok(DeleteOutcome::default());
        }

        let chunks_removed = tx.execute(
            "DELETE FROM chunks_vec WHERE id IN (SELECT id FROM content_chunks WHERE memory_id = ?1)",
            [id],
        )?;
        tx.execute("DELETE FROM content_chunks WHERE memory_id = ?1", [id])?;
        tx.execute("DELETE FROM memories_vec WHERE id = ?1", [id])?;
        tx.execute("DELETE FROM memories WHERE id = ?1", [id])?;
        write_audit_log(&tx, "delete", id, Some(&json!({"chunks_removed": chunks_removed})))?;
        tx.commit()?;

        tracing::info!(id, user_id, chunks_removed, "memory deleted");
        Ok(DeleteOutcome {
            deleted: true,
            chunks_removed,
        })
    }

    /// Delete every memory of `user_id` together with their chunks.
    pub fn clear(&self, user_id: &str) -> Result<ClearOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let chunks_removed = tx.execute(
            "DELETE FROM chunks_vec WHERE id IN (
                 SELECT c.id FROM content_chunks c
                 JOIN memories m ON m.id = c.memory_id
                 WHERE m.user_id = ?1)",
            [user_id],
        )?;
        tx.execute(
            "DELETE FROM content_chunks WHERE memory_id IN (SELECT id FROM memories WHERE user_id = ?1)",
            [user_id],
        )?;
        tx.execute(
            "DELETE FROM memories_vec WHERE id IN (SELECT id FROM memories WHERE user_id = ?1)",
            [user_id],
        )?;
        let memories_removed = tx.execute("DELETE FROM memories WHERE user_id = ?1", [user_id])?;
        write_audit_log(
            &tx,
            "clear",
            user_id,
            Some(&json!({"memories": memories_removed, "chunks": chunks_removed})),
        )?;
        tx.commit()?;

        tracing::warn!(user_id, memories_removed, chunks_removed, "cleared all memories");
        Ok(ClearOutcome {
            memories_removed,
            chunks_removed,
        })
    }

    pub fn count(&self, user_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE user_id = ?1",
            [user_id],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    /// Newest memories first.
    pub fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, created_at, metadata, user_id FROM memories \
             WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let records = stmt
            .query_map(params![user_id, sql_limit(limit)], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl MemoryStore for SqliteMemoryStore {
    fn get_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, created_at, metadata, user_id FROM memories WHERE user_id = ?1",
        )?;
        let records = stmt
            .query_map([user_id], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let embedding = self.embedder.embed(query).context("failed to embed query")?;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT m.id, m.content, m.created_at, m.metadata, m.user_id, \
                    vec_distance_l2(v.embedding, ?1) AS distance \
             FROM memories m JOIN memories_vec v ON v.id = m.id \
             WHERE m.user_id = ?2 \
             ORDER BY distance ASC LIMIT ?3",
        )?;
        let records = stmt
            .query_map(
                params![embedding_to_bytes(&embedding), user_id, sql_limit(limit)],
                |row| {
                    let distance: f64 = row.get(5)?;
                    Ok(row_to_record(row)?.with_score(l2_to_similarity(distance)))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(query, user_id, hits = records.len(), "memory search");
        Ok(records)
    }
}

/// `LIMIT` bound clamped so huge requests never wrap negative.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Fixed-width UTC timestamps so `ORDER BY created_at` is chronological.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn kind_of(metadata: &Map<String, Value>) -> MemoryKind {
    metadata
        .get("content_type")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(MemoryKind::Conversation)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let created_at: String = row.get(2)?;
    let metadata: Option<String> = row.get(3)?;
    let mut record = MemoryRecord::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)
        .with_created_at(CreatedAt::Iso(created_at));
    record.metadata = metadata
        .and_then(|m| serde_json::from_str::<Value>(&m).ok())
        .and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        });
    record.user_id = row.get(4)?;
    Ok(record)
}

/// Append an entry to the `memory_log` audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    memory_id: &str,
    details: Option<&Value>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO memory_log (operation, memory_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            operation,
            memory_id,
            details.map(Value::to_string),
            format_timestamp(Utc::now())
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use chrono::Duration;

    /// Maps known words to unit spikes; everything else lands on the last dimension.
    struct WordEmbedder;

    impl EmbeddingProvider for WordEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut v = vec![0.0f32; 384];
            let lower = text.to_lowercase();
            let dim = if lower.contains("rust") {
                0
            } else if lower.contains("python") {
                1
            } else {
                383
            };
            v[dim] = 1.0;
            Ok(v)
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimensions(&self) -> usize {
            384
        }
    }

    fn store() -> SqliteMemoryStore {
        let conn = crate::db::open_memory_database().unwrap();
        SqliteMemoryStore::new(Arc::new(Mutex::new(conn)), Arc::new(WordEmbedder))
    }

    fn visit(url: &str, title: &str) -> PageVisit {
        PageVisit {
            user_id: "u".into(),
            url: url.into(),
            title: title.into(),
            synopsis: "Processing...".into(),
            tags: vec!["browser".into(), "tab".into()],
            preview: String::new(),
        }
    }

    #[test]
    fn browser_memory_carries_page_metadata() {
        let store = store();
        let id = store
            .add_browser_memory(&visit("https://www.rust-lang.org/learn", "Learn Rust"))
            .unwrap();

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(
            record.memory,
            "Visited: Learn Rust\nURL: https://www.rust-lang.org/learn\nSummary: Processing...\nTags: browser, tab"
        );
        assert_eq!(record.kind(), Some(MemoryKind::BrowserTab));
        let meta = record.metadata.as_ref().unwrap();
        assert_eq!(meta["domain"], "rust-lang.org");
        assert!(meta["temporal_id"].as_str().unwrap().starts_with("mem_"));
        assert!(meta["creation_timestamp"].as_f64().is_some());
        assert_eq!(record.user_id, "u");
    }

    #[test]
    fn huge_limits_return_everything() {
        let store = store();
        store.add_memory("u", "notes about rust lifetimes", None).unwrap();
        store.add_memory("u", "python packaging", None).unwrap();

        assert_eq!(sql_limit(usize::MAX), i64::MAX);
        assert_eq!(store.search("rust", "u", usize::MAX).unwrap().len(), 2);
        assert_eq!(store.recent("u", usize::MAX).unwrap().len(), 2);
    }

    #[test]
    fn text_lists_at_most_five_tags() {
        let tags: Vec<String> = (0..8).map(|i| format!("t{i}")).collect();
        let text = browser_memory_text("T", "https://a.io", "s", &tags);
        assert!(text.ends_with("Tags: t0, t1, t2, t3, t4"));
    }

    #[test]
    fn search_scores_by_similarity_and_filters_user() {
        let store = store();
        store.add_memory("u", "notes about rust lifetimes", None).unwrap();
        store.add_memory("u", "python packaging", None).unwrap();
        store.add_memory("other", "rust for someone else", None).unwrap();

        let hits = store.search("rust", "u", 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].memory, "notes about rust lifetimes");
        assert!((hits[0].score.unwrap() - 1.0).abs() < 1e-6);
        assert!(hits[1].score.unwrap().abs() < 1e-6);
    }

    #[test]
    fn update_page_summary_rewrites_text_and_vector() {
        let store = store();
        let id = store
            .add_browser_memory(&visit("https://docs.python.org/3/", "Docs"))
            .unwrap();

        let tags = vec!["rust".to_string(), "ffi".to_string()];
        assert!(store
            .update_page_summary(&id, "Calling rust from python", &tags)
            .unwrap());

        let record = store.get(&id).unwrap().unwrap();
        assert!(record.memory.contains("Summary: Calling rust from python"));
        assert!(record.memory.ends_with("Tags: rust, ffi"));
        assert_eq!(record.metadata.unwrap()["tags"], json!(["rust", "ffi"]));

        let hits = store.search("rust", "u", 1).unwrap();
        assert_eq!(hits[0].id, id);

        assert!(!store.update_page_summary("missing", "s", &[]).unwrap());
    }

    #[test]
    fn recent_orders_newest_first() {
        let store = store();
        let now = Utc::now();
        for (text, hours) in [("old", 30), ("newest", 1), ("middle", 5)] {
            store
                .add_memory_at("u", text, None, now - Duration::hours(hours))
                .unwrap();
        }
        let recent: Vec<_> = store
            .recent("u", 2)
            .unwrap()
            .into_iter()
            .map(|r| r.memory)
            .collect();
        assert_eq!(recent, vec!["newest", "middle"]);
    }

    #[test]
    fn delete_requires_owner() {
        let store = store();
        let id = store.add_memory("u", "rust", None).unwrap();

        assert!(!store.delete(&id, "intruder").unwrap().deleted);
        assert!(store.delete(&id, "u").unwrap().deleted);
        assert!(store.get(&id).unwrap().is_none());
        assert_eq!(store.count("u").unwrap(), 0);
    }

    #[test]
    fn clear_only_touches_one_user() {
        let store = store();
        store.add_memory("u", "a", None).unwrap();
        store.add_memory("u", "b", None).unwrap();
        store.add_memory("v", "c", None).unwrap();

        let outcome = store.clear("u").unwrap();
        assert_eq!(outcome.memories_removed, 2);
        assert_eq!(store.count("u").unwrap(), 0);
        assert_eq!(store.get_all("v").unwrap().len(), 1);
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(store().add_memory("u", "   ", None).is_err());
    }

    #[test]
    fn kind_defaults_to_conversation() {
        let store = store();
        let mut meta = Map::new();
        meta.insert("content_type".into(), json!("personal_info"));
        let id = store.add_memory("u", "my name is Sam", Some(meta)).unwrap();
        let conn = store.lock().unwrap();
        let kind: String = conn
            .query_row("SELECT kind FROM memories WHERE id = ?1", [&id], |r| r.get(0))
            .unwrap();
        assert_eq!(kind, "personal_info");
    }
}
