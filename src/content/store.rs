//! SQLite-backed content layer: page chunks and their vectors.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

use super::chunking::{enhance_text_for_embedding, EmbeddingContext};
use super::types::{ContentChunk, PageChunk};
use super::ContentStore;
use crate::config::TabRecallConfig;
use crate::embedding::EmbeddingProvider;
use crate::memory::store::sql_limit;
use crate::memory::{embedding_to_bytes, l2_to_similarity};
use crate::temporal::timestamp::epoch_seconds;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Similarity boosted by up to 2x for new chunks, decaying linearly per day of age.
pub fn time_weighted_similarity(similarity: f64, created_at: f64, now: f64, decay: f64) -> f64 {
    let age_days = (now - created_at) / SECONDS_PER_DAY;
    similarity * (1.0 + (1.0 - (age_days * decay).min(1.0)))
}

pub struct SqliteContentStore {
    conn: Arc<Mutex<Connection>>,
    embedder: Arc<dyn EmbeddingProvider>,
    contextual_embeddings: bool,
    time_weight_decay: f64,
}

impl SqliteContentStore {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &TabRecallConfig,
    ) -> Self {
        Self {
            conn,
            embedder,
            contextual_embeddings: config.content.contextual_embeddings,
            time_weight_decay: config.retrieval.time_weight_decay,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))
    }

    /// Embed and store the chunks of one memory. Returns how many were stored.
    pub fn add_chunks(&self, memory_id: &str, chunks: &[PageChunk]) -> Result<usize> {
        self.add_chunks_at(memory_id, chunks, Utc::now())
    }

    /// Chunks that fail to embed are logged and left out.
    pub fn add_chunks_at(
        &self,
        memory_id: &str,
        chunks: &[PageChunk],
        created_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let text = if self.contextual_embeddings {
                let ctx = EmbeddingContext {
                    title: Some(&chunk.title),
                    content_type: Some(chunk.content_type),
                    source_id: Some(&chunk.source_id),
                };
                enhance_text_for_embedding(&chunk.content, &ctx)
            } else {
                chunk.content.clone()
            };
            match self.embedder.embed(&text) {
                Ok(vector) => embedded.push((chunk, vector)),
                Err(e) => tracing::warn!(
                    memory_id,
                    chunk = chunk.chunk_number,
                    error = %e,
                    "failed to embed chunk"
                ),
            }
        }

        let created = epoch_seconds(created_at);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (chunk, vector) in &embedded {
            let id = ContentChunk::chunk_id(memory_id, chunk.chunk_number);
            tx.execute(
                "INSERT INTO content_chunks (id, memory_id, url, title, chunk_number, chunk_index, \
                 total_chunks, content, original_content, source_id, content_type, quality_score, \
                 word_count, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    id,
                    memory_id,
                    chunk.url,
                    chunk.title,
                    chunk.chunk_number as i64,
                    chunk.chunk_index as i64,
                    chunk.total_chunks as i64,
                    chunk.content,
                    chunk.original_content,
                    chunk.source_id,
                    chunk.content_type.as_str(),
                    chunk.quality_score,
                    chunk.word_count as i64,
                    created,
                ],
            )
            .with_context(|| format!("failed to insert chunk {id}"))?;
            tx.execute(
                "INSERT INTO chunks_vec (id, embedding) VALUES (?1, ?2)",
                params![id, embedding_to_bytes(vector)],
            )?;
        }
        tx.commit()?;

        tracing::debug!(memory_id, stored = embedded.len(), "chunks stored");
        Ok(embedded.len())
    }

    pub fn delete_for_memory(&self, memory_id: &str) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM chunks_vec WHERE id IN (SELECT id FROM content_chunks WHERE memory_id = ?1)",
            [memory_id],
        )?;
        let removed = tx.execute("DELETE FROM content_chunks WHERE memory_id = ?1", [memory_id])?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM content_chunks", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Distinct source domains, sorted.
    pub fn unique_sources(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT source_id FROM content_chunks ORDER BY source_id")?;
        let sources = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(sources)
    }
}

impl ContentStore for SqliteContentStore {
    fn search_chunks(
        &self,
        query: &str,
        source_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ContentChunk>> {
        let query_text = match source_filter {
            Some(domain) => enhance_text_for_embedding(
                query,
                &EmbeddingContext {
                    source_id: Some(domain),
                    ..Default::default()
                },
            ),
            None => query.to_string(),
        };
        let embedding = self
            .embedder
            .embed(&query_text)
            .context("failed to embed content query")?;

        let fetch = limit.saturating_mul(2);
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT c.id, c.memory_id, c.url, c.title, c.chunk_number, c.chunk_index, \
                        c.total_chunks, c.content, c.original_content, c.source_id, \
                        c.content_type, c.quality_score, c.word_count, c.created_at, \
                        vec_distance_l2(v.embedding, ?1) AS distance \
                 FROM content_chunks c JOIN chunks_vec v ON v.id = c.id \
                 WHERE (?2 IS NULL OR c.source_id = ?2) \
                 ORDER BY distance ASC LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(
                    params![embedding_to_bytes(&embedding), source_filter, sql_limit(fetch)],
                    |row| {
                        let distance: f64 = row.get(14)?;
                        Ok((row_to_chunk(row)?, distance))
                    },
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let now = epoch_seconds(Utc::now());
        let mut scored: Vec<ContentChunk> = rows
            .into_iter()
            .map(|(mut chunk, distance)| {
                chunk.similarity = time_weighted_similarity(
                    l2_to_similarity(distance),
                    chunk.created_at,
                    now,
                    self.time_weight_decay,
                );
                chunk
            })
            .collect();
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(limit);

        tracing::debug!(query, ?source_filter, hits = scored.len(), "content search");
        Ok(scored)
    }
}

fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<ContentChunk> {
    let content_type: String = row.get(10)?;
    Ok(ContentChunk {
        id: row.get(0)?,
        memory_id: row.get(1)?,
        chunk: PageChunk {
            url: row.get(2)?,
            title: row.get(3)?,
            chunk_number: row.get::<_, i64>(4)? as usize,
            chunk_index: row.get::<_, i64>(5)? as usize,
            total_chunks: row.get::<_, i64>(6)? as usize,
            content: row.get(7)?,
            original_content: row.get(8)?,
            source_id: row.get(9)?,
            content_type: content_type.parse().unwrap_or(super::types::ContentType::General),
            quality_score: row.get(11)?,
            word_count: row.get::<_, i64>(12)? as usize,
        },
        created_at: row.get(13)?,
        similarity: 0.0,
        rerank_score: None,
    })
}
