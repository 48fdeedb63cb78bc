//! Content layer: full page text split into embedded chunks for retrieval.

pub mod chunking;
pub mod rerank;
pub mod store;
pub mod types;

use anyhow::Result;

pub use types::{ContentChunk, PageChunk};

/// Read side of the content layer, as consumed by unified search.
pub trait ContentStore: Send + Sync {
    /// Up to `limit` chunks relevant to `query`, best first, optionally from one domain only.
    fn search_chunks(
        &self,
        query: &str,
        source_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ContentChunk>>;
}
