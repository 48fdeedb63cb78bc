//! Cross-encoder reranking of content chunks.
//!
//! A cross-encoder reads the query and a chunk together and emits one relevance
//! logit. ms-marco-MiniLM-L-6-v2 is loaded from `retrieval.reranker_dir`; without it
//! (or with reranking disabled) a [`PassthroughReranker`] keeps search order.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::types::ContentChunk;
use crate::config::RetrievalConfig;
use crate::embedding::local::load_model;

/// ms-marco-MiniLM was trained on 512-token pairs.
const MAX_PAIR_LEN: usize = 512;

pub trait Reranker: Send + Sync {
    /// One relevance score per document, higher is better.
    fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>>;

    fn name(&self) -> &'static str;

    /// `false` when scores carry no information and order should be kept.
    fn reorders(&self) -> bool {
        true
    }
}

/// Keeps the incoming order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughReranker;

impl Reranker for PassthroughReranker {
    fn score(&self, _query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        Ok(vec![0.0; documents.len()])
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn reorders(&self) -> bool {
        false
    }
}

pub struct CrossEncoderReranker {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
unsafe impl Send for CrossEncoderReranker {}
unsafe impl Sync for CrossEncoderReranker {}

impl CrossEncoderReranker {
    pub fn new(dir: &Path) -> Result<Self> {
        let (session, tokenizer) = load_model(dir, MAX_PAIR_LEN)
            .with_context(|| format!("failed to load reranker from {}", dir.display()))?;
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

impl Reranker for CrossEncoderReranker {
    fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        let pairs: Vec<(&str, &str)> = documents.iter().map(|d| (query, *d)).collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| anyhow::anyhow!("pair tokenization failed: {e}"))?;

        let batch = encodings.len();
        let seq_len = encodings[0].get_ids().len();
        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut mask = Vec::with_capacity(batch * seq_len);
        let mut segments = Vec::with_capacity(batch * seq_len);
        for enc in &encodings {
            ids.extend(enc.get_ids().iter().map(|&v| v as i64));
            mask.extend(enc.get_attention_mask().iter().map(|&v| v as i64));
            // query is segment 0, document segment 1
            segments.extend(enc.get_type_ids().iter().map(|&v| v as i64));
        }

        let shape = vec![batch as i64, seq_len as i64];
        let ids = Tensor::from_array((shape.clone(), ids.into_boxed_slice()))?;
        let mask = Tensor::from_array((shape.clone(), mask.into_boxed_slice()))?;
        let segments = Tensor::from_array((shape, segments.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("reranker session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! {
            "input_ids" => ids,
            "attention_mask" => mask,
            "token_type_ids" => segments,
        })?;

        let logits = outputs.get("logits").unwrap_or_else(|| &outputs[0]);
        let (shape, data) = logits.try_extract_tensor::<f32>()?;
        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.first() == Some(&(batch as i64)) && !data.is_empty(),
            "unexpected logits shape {dims:?}"
        );
        let width = data.len() / batch;
        Ok((0..batch).map(|b| data[b * width]).collect())
    }

    fn name(&self) -> &'static str {
        "cross-encoder/ms-marco-MiniLM-L-6-v2"
    }
}

/// Build the configured reranker, falling back to pass-through when the model is unavailable.
pub fn create_reranker(config: &RetrievalConfig) -> Arc<dyn Reranker> {
    if !config.use_reranking {
        return Arc::new(PassthroughReranker);
    }
    let dir = crate::config::expand_tilde(&config.reranker_dir);
    match CrossEncoderReranker::new(&dir) {
        Ok(reranker) => {
            tracing::info!(dir = %dir.display(), "cross-encoder reranker ready");
            Arc::new(reranker)
        }
        Err(e) => {
            tracing::warn!(error = %e, "reranker unavailable, keeping search order");
            Arc::new(PassthroughReranker)
        }
    }
}

/// Reorder `chunks` by cross-encoder relevance and keep the best `top_k`.
///
/// Short lists come back untouched. Scoring failures keep the first `top_k`
/// in their original order.
pub fn rerank(
    reranker: &dyn Reranker,
    query: &str,
    chunks: Vec<ContentChunk>,
    top_k: usize,
) -> Vec<ContentChunk> {
    if chunks.len() <= top_k {
        return chunks;
    }
    if !reranker.reorders() {
        return chunks.into_iter().take(top_k).collect();
    }

    let texts: Vec<&str> = chunks.iter().map(ContentChunk::text).collect();
    let scores = match reranker.score(query, &texts) {
        Ok(scores) if scores.len() == chunks.len() => scores,
        Ok(scores) => {
            tracing::warn!(
                expected = chunks.len(),
                got = scores.len(),
                "reranker returned wrong number of scores"
            );
            return chunks.into_iter().take(top_k).collect();
        }
        Err(e) => {
            tracing::warn!(error = %e, "reranking failed, keeping search order");
            return chunks.into_iter().take(top_k).collect();
        }
    };

    let mut scored: Vec<(ContentChunk, f32)> = chunks.into_iter().zip(scores).collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(top_k)
        .map(|(mut chunk, score)| {
            chunk.rerank_score = Some(score);
            chunk
        })
        .collect()
}
