//! Query-side orchestration over the memory and content stores.
//!
//! [`unified::UnifiedSearch`] runs a query through the temporal pipeline, then
//! groups the surviving memories by site and attaches matching page excerpts.
//! The payload types below are what the MCP tools serialize.

pub mod unified;

use serde::Serialize;

use crate::content::ContentChunk;
use crate::memory::types::CreatedAt;
use crate::temporal::QueryIntent;

pub use unified::UnifiedSearch;

/// Stand-in query when the caller sends nothing searchable.
pub const EMPTY_QUERY_FALLBACK: &str = "recent memories";

/// One memory in a unified search result, with any page excerpts attached.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub memory_summary: String,
    pub score: f64,
    pub created_at: Option<CreatedAt>,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_domain: Option<String>,
    pub detailed_content: Vec<ContentChunk>,
    pub ranking_method: &'static str,
    pub intent_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemporalReport {
    pub intent: QueryIntent,
    pub confidence: f64,
    pub strategy: &'static str,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifiedSearchResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub query: String,
    pub results: Vec<SearchHit>,
    /// Candidates considered after any fresh-memory merge.
    pub total_memories: usize,
    /// Memories whose domain produced at least one chunk.
    pub enriched_results: usize,
    pub domains_searched: usize,
    pub temporal_intelligence: TemporalReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentSearchResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub query: String,
    pub source_filter: Option<String>,
    pub content_chunks: Vec<ContentChunk>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitedPage {
    pub rank: usize,
    pub title: String,
    pub url: String,
    pub memory_content: String,
    pub created_at: Option<CreatedAt>,
    pub age_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastVisitedResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub method: &'static str,
    pub total_found: usize,
    pub results: Vec<VisitedPage>,
}
