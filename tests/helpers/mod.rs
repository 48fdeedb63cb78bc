#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

use tabrecall::config::TabRecallConfig;
use tabrecall::content::rerank::{PassthroughReranker, Reranker};
use tabrecall::content::store::SqliteContentStore;
use tabrecall::db;
use tabrecall::embedding::{EmbeddingError, EmbeddingProvider, EMBEDDING_DIM};
use tabrecall::memory::store::SqliteMemoryStore;
use tabrecall::search::UnifiedSearch;
use tabrecall::temporal::TemporalIntelligence;

/// Topics the test embedder separates. Text mentioning none lands on the last axis.
pub const TOPICS: [&str; 4] = ["tokio", "rust", "sourdough", "tomato"];

/// One axis per topic mentioned, L2-normalized. Deterministic and model-free.
pub struct TopicEmbedder;

impl EmbeddingProvider for TopicEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let lower = text.to_lowercase();
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for (i, topic) in TOPICS.iter().enumerate() {
            if lower.contains(topic) {
                v[i] = 1.0;
            }
        }
        if v.iter().all(|x| *x == 0.0) {
            v[EMBEDDING_DIM - 1] = 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        Ok(v.into_iter().map(|x| x / norm).collect())
    }
}

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Both stores and the search pipeline over one in-memory database.
pub struct Stack {
    pub memories: Arc<SqliteMemoryStore>,
    pub content: Arc<SqliteContentStore>,
    pub search: UnifiedSearch,
}

pub fn stack() -> Stack {
    stack_with(TabRecallConfig::default())
}

pub fn stack_with(config: TabRecallConfig) -> Stack {
    let conn = Arc::new(Mutex::new(test_db()));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(TopicEmbedder);
    let memories = Arc::new(SqliteMemoryStore::new(conn.clone(), embedder.clone()));
    let content = Arc::new(SqliteContentStore::new(conn, embedder.clone(), &config));
    let reranker: Arc<dyn Reranker> = Arc::new(PassthroughReranker);
    let search = UnifiedSearch::new(
        memories.clone(),
        content.clone(),
        reranker,
        Arc::new(TemporalIntelligence::new(embedder)),
        &config.retrieval,
    );
    Stack {
        memories,
        content,
        search,
    }
}

/// Page-visit metadata as the extension path writes it.
pub fn page_metadata(url: &str, title: &str, domain: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("url".into(), json!(url));
    m.insert("title".into(), json!(title));
    m.insert("domain".into(), json!(domain));
    m.insert("content_type".into(), json!("browser_tab"));
    m
}

pub fn hours_before(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    now - Duration::hours(hours)
}

/// A few paragraphs about `topic`, varied enough to pass the chunk quality filters.
pub fn article(topic: &str) -> String {
    format!(
        "{topic} is the subject of this page. Readers begin with a short history of how {topic} \
         came about and which problems it was meant to solve.\n\n\
         Next, the guide walks through a worked example step by step, pointing out mistakes \
         beginners often make and how experienced people avoid them.\n\n\
         A later section compares several alternative approaches, weighing speed, clarity, \
         maintenance cost and long term reliability for each option.\n\n\
         Finally, the page collects further reading, community forums and a checklist \
         summarizing every important idea about {topic}."
    )
}
