//! Unified search: temporal routing, then per-domain content enrichment.
//!
//! A query first pulls `limit * initial_search_multiplier` semantic candidates,
//! which feed intent analysis. The routed strategy picks the final memories:
//!
//! - `timestamp_direct` re-reads the whole collection and orders it by time;
//! - `semantic_temporal_hybrid` narrows the candidates, optionally merges the
//!   newest memories the semantic pass missed, and fuses recency into the score;
//! - `semantic_only` keeps the store's order.
//!
//! Memories are then grouped by source domain. Each domain gets one content
//! search sized at [`MAX_CHUNKS_PER_MEMORY`] per memory, and the chunks are
//! dealt out to the group's members in order.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::{
    ContentSearchResponse, LastVisitedResponse, SearchHit, TemporalReport,
    UnifiedSearchResponse, VisitedPage, EMPTY_QUERY_FALLBACK,
};
use crate::config::RetrievalConfig;
use crate::content::rerank::{rerank, Reranker};
use crate::content::{ContentChunk, ContentStore};
use crate::memory::types::MemoryRecord;
use crate::memory::MemoryStore;
use crate::temporal::timestamp::record_timestamp;
use crate::temporal::{QueryIntent, RankedMemory, Strategy, TemporalIntelligence, TemporalProfile};

/// Most page excerpts attached to one memory.
pub const MAX_CHUNKS_PER_MEMORY: usize = 3;

#[derive(Debug, Clone, Copy)]
struct SearchLimits {
    initial_search_multiplier: usize,
    fresh_memory_limit: usize,
}

/// Query orchestrator over both stores. Cheap to clone.
#[derive(Clone)]
pub struct UnifiedSearch {
    memories: Arc<dyn MemoryStore>,
    content: Arc<dyn ContentStore>,
    reranker: Arc<dyn Reranker>,
    temporal: Arc<TemporalIntelligence>,
    limits: SearchLimits,
}

struct Routing {
    intent: QueryIntent,
    confidence: f64,
    strategy: Strategy,
}

/// Memories chosen by a strategy, before grouping.
struct Selection {
    ranked: Vec<RankedMemory>,
    profile: Option<TemporalProfile>,
    considered: usize,
    rerank_content: bool,
}

impl UnifiedSearch {
    pub fn new(
        memories: Arc<dyn MemoryStore>,
        content: Arc<dyn ContentStore>,
        reranker: Arc<dyn Reranker>,
        temporal: Arc<TemporalIntelligence>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            memories,
            content,
            reranker,
            temporal,
            limits: SearchLimits {
                initial_search_multiplier: config.initial_search_multiplier.max(1),
                fresh_memory_limit: config.fresh_memory_limit,
            },
        }
    }

    pub async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<UnifiedSearchResponse> {
        let (query, user_id) = (query.to_string(), user_id.to_string());
        self.on_blocking_pool(move |this| this.search_at(&query, &user_id, limit, Utc::now()))
            .await
    }

    pub async fn content_search(
        &self,
        query: &str,
        source_filter: Option<&str>,
        limit: usize,
    ) -> Result<ContentSearchResponse> {
        let query = query.to_string();
        let source_filter = source_filter.map(str::to_string);
        self.on_blocking_pool(move |this| {
            this.content_search_now(&query, source_filter.as_deref(), limit)
        })
        .await?
    }

    pub async fn last_visited(&self, user_id: &str, limit: usize) -> Result<LastVisitedResponse> {
        let user_id = user_id.to_string();
        self.on_blocking_pool(move |this| this.last_visited_at(&user_id, limit, Utc::now()))
            .await?
    }

    async fn on_blocking_pool<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(UnifiedSearch) -> T + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(this))
            .await
            .context("search task panicked")
    }

    /// Run a unified search as seen at `now`. Never fails; collaborator errors
    /// shrink the result instead.
    pub fn search_at(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> UnifiedSearchResponse {
        let query = match query.trim() {
            "" => EMPTY_QUERY_FALLBACK,
            q => q,
        };
        let limit = limit.max(1);

        let candidates = self.candidates(
            query,
            user_id,
            limit.saturating_mul(self.limits.initial_search_multiplier),
        );
        let (intent, confidence) = self.temporal.analyze_intent(query, &candidates, now);
        let strategy = self.temporal.route(query, &candidates, intent, confidence);
        tracing::debug!(
            query,
            candidates = candidates.len(),
            intent = %intent,
            confidence,
            strategy = %strategy,
            "unified search routed"
        );

        let routing = Routing {
            intent,
            confidence,
            strategy,
        };
        let selection = self.execute(&routing, candidates, user_id, limit, now);
        let explanation =
            self.temporal
                .explain(&selection.ranked, intent, selection.profile.as_ref());

        let method = routing.strategy.name();
        let enrichment = self.enrich(
            query,
            selection.ranked,
            method,
            confidence,
            selection.rerank_content,
        );

        tracing::info!(
            query,
            results = enrichment.results.len(),
            enriched = enrichment.enriched,
            domains = enrichment.domains,
            strategy = method,
            "unified search complete"
        );

        UnifiedSearchResponse {
            kind: "unified_search",
            query: query.to_string(),
            results: enrichment.results,
            total_memories: selection.considered,
            enriched_results: enrichment.enriched,
            domains_searched: enrichment.domains,
            temporal_intelligence: TemporalReport {
                intent,
                confidence,
                strategy: method,
                explanation,
            },
        }
    }

    fn candidates(&self, query: &str, user_id: &str, limit: usize) -> Vec<MemoryRecord> {
        self.memories
            .search(query, user_id, limit)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "memory search failed, continuing without candidates");
                Vec::new()
            })
    }

    fn execute(
        &self,
        routing: &Routing,
        candidates: Vec<MemoryRecord>,
        user_id: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Selection {
        match routing.strategy {
            Strategy::TimestampDirect {
                time_filter_hours, ..
            } => {
                let considered = candidates.len();
                let all = self.memories.get_all(user_id).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "could not load collection for timestamp ordering");
                    Vec::new()
                });
                Selection {
                    ranked: self
                        .temporal
                        .by_timestamp(all, limit, time_filter_hours, now),
                    profile: None,
                    considered,
                    rerank_content: true,
                }
            }
            Strategy::SemanticTemporalHybrid {
                semantic_limit_multiplier,
                use_fresh_memory_boost,
                ..
            } => {
                let mut candidates = candidates;
                candidates.truncate(limit.saturating_mul(semantic_limit_multiplier));
                if use_fresh_memory_boost {
                    self.merge_fresh(&mut candidates, user_id);
                }
                let considered = candidates.len();
                let (mut ranked, profile) =
                    self.temporal
                        .score(candidates, routing.intent, routing.confidence, now);
                ranked.truncate(limit);
                Selection {
                    ranked,
                    profile: Some(profile),
                    considered,
                    rerank_content: true,
                }
            }
            Strategy::SemanticOnly { use_reranking, .. } => Selection {
                considered: candidates.len(),
                ranked: candidates
                    .into_iter()
                    .take(limit)
                    .map(RankedMemory::passthrough)
                    .collect(),
                profile: None,
                rerank_content: use_reranking,
            },
        }
    }

    /// Append the newest memories the semantic pass did not return, up to
    /// `fresh_memory_limit`. Undated records sort last.
    fn merge_fresh(&self, candidates: &mut Vec<MemoryRecord>, user_id: &str) {
        let all = match self.memories.get_all(user_id) {
            Ok(all) => all,
            Err(e) => {
                tracing::warn!(error = %e, "fresh memory lookup failed, skipping boost");
                return;
            }
        };

        let seen: HashSet<String> = candidates.iter().map(|r| r.id.clone()).collect();
        let mut missing: Vec<(f64, MemoryRecord)> = all
            .into_iter()
            .filter(|r| !seen.contains(&r.id))
            .map(|r| (record_timestamp(&r).unwrap_or(f64::NEG_INFINITY), r))
            .collect();
        missing.sort_by(|a, b| b.0.total_cmp(&a.0));

        let before = candidates.len();
        candidates.extend(
            missing
                .into_iter()
                .take(self.limits.fresh_memory_limit)
                .map(|(_, r)| r),
        );
        tracing::debug!(added = candidates.len() - before, "fresh memories merged");
    }

    fn enrich(
        &self,
        query: &str,
        ranked: Vec<RankedMemory>,
        method: &'static str,
        confidence: f64,
        rerank_content: bool,
    ) -> Enrichment {
        let mut results = Vec::with_capacity(ranked.len());
        let mut groups: Vec<(String, Vec<SearchHit>)> = Vec::new();

        for memory in ranked {
            let hit = to_hit(memory, method, confidence);
            let Some(domain) = hit.source_domain.clone() else {
                results.push(hit);
                continue;
            };
            match groups.iter_mut().find(|(d, _)| *d == domain) {
                Some((_, members)) => members.push(hit),
                None => groups.push((domain, vec![hit])),
            }
        }

        let domains = groups.len();
        let mut enriched = 0;
        for (domain, mut members) in groups {
            let wanted = members.len().saturating_mul(MAX_CHUNKS_PER_MEMORY);
            match self.content.search_chunks(query, Some(&domain), wanted) {
                Ok(chunks) if !chunks.is_empty() => {
                    let chunks = if rerank_content {
                        rerank(self.reranker.as_ref(), query, chunks, wanted)
                    } else {
                        chunks
                    };
                    enriched += distribute_chunks(&mut members, &chunks);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(domain = %domain, error = %e, "content enrichment failed");
                }
            }
            results.extend(members);
        }

        Enrichment {
            results,
            enriched,
            domains,
        }
    }

    /// Chunk search, fetching twice `limit` so the reranker has room to reorder.
    pub fn content_search_now(
        &self,
        query: &str,
        source_filter: Option<&str>,
        limit: usize,
    ) -> Result<ContentSearchResponse> {
        let limit = limit.max(1);
        let chunks = self
            .content
            .search_chunks(query, source_filter, limit.saturating_mul(2))
            .context("content search failed")?;
        let content_chunks = rerank(self.reranker.as_ref(), query, chunks, limit);
        Ok(ContentSearchResponse {
            kind: "content_search",
            query: query.to_string(),
            source_filter: source_filter.map(str::to_string),
            content_chunks,
        })
    }

    /// The newest `limit` memories, by creation time alone.
    pub fn last_visited_at(
        &self,
        user_id: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<LastVisitedResponse> {
        let all = self
            .memories
            .get_all(user_id)
            .context("failed to load memories")?;
        let results: Vec<VisitedPage> = self
            .temporal
            .by_timestamp(all, limit, None, now)
            .into_iter()
            .enumerate()
            .map(|(i, ranked)| {
                let info = ranked.record.page_info();
                VisitedPage {
                    rank: i + 1,
                    title: info.title,
                    url: info.url.unwrap_or_else(|| "Unknown".into()),
                    memory_content: ranked.record.memory,
                    created_at: ranked.record.created_at,
                    age_hours: ranked.age_hours.unwrap_or(0.0),
                }
            })
            .collect();

        Ok(LastVisitedResponse {
            kind: "timestamp_direct",
            method: "chronological_order",
            total_found: results.len(),
            results,
        })
    }
}

struct Enrichment {
    results: Vec<SearchHit>,
    enriched: usize,
    domains: usize,
}

fn to_hit(memory: RankedMemory, method: &'static str, confidence: f64) -> SearchHit {
    let info = memory.record.page_info();
    let (source_url, source_domain) = match (info.url, info.domain) {
        (Some(url), Some(domain)) => (Some(url), Some(domain)),
        _ => (None, None),
    };
    SearchHit {
        id: memory.record.id,
        memory_summary: memory.record.memory,
        score: memory.final_score,
        created_at: memory.record.created_at,
        source: "memory",
        source_url,
        source_domain,
        detailed_content: Vec::new(),
        ranking_method: method,
        intent_confidence: confidence,
    }
}

/// Give member `i` the slice starting at `i * (len / n)`, at most
/// [`MAX_CHUNKS_PER_MEMORY`] long. Returns the number of members counted as enriched.
fn distribute_chunks(members: &mut [SearchHit], chunks: &[ContentChunk]) -> usize {
    if members.is_empty() {
        return 0;
    }
    let per_memory = chunks.len() / members.len();
    let take = per_memory.min(MAX_CHUNKS_PER_MEMORY);
    for (i, hit) in members.iter_mut().enumerate() {
        let start = (i * per_memory).min(chunks.len());
        let end = (start + take).min(chunks.len());
        hit.detailed_content = chunks[start..end].to_vec();
    }
    members.len()
}
