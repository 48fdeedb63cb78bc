//! Memory layer: short notes about visited pages and saved facts.

pub mod page;
pub mod store;
pub mod types;

use anyhow::Result;

use types::MemoryRecord;

/// Read side of the memory layer, as consumed by unified search.
///
/// Both calls return an empty list rather than failing when a user has no memories.
pub trait MemoryStore: Send + Sync {
    /// Every memory of `user_id`, in no particular order.
    fn get_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>>;

    /// Up to `limit` memories most similar to `query`, best first, with `score` set.
    fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<MemoryRecord>>;
}

/// View an f32 embedding as the raw little-endian bytes sqlite-vec expects.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

/// Cosine similarity of two unit vectors from their L2 distance.
pub fn l2_to_similarity(distance: f64) -> f64 {
    1.0 - distance * distance / 2.0
}
