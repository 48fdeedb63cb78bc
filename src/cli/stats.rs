use anyhow::Result;
use rusqlite::{params, Connection};
use std::path::Path;

use crate::config::TabRecallConfig;
use crate::memory::types::MemoryKind;

const KINDS: [MemoryKind; 3] = [
    MemoryKind::BrowserTab,
    MemoryKind::Conversation,
    MemoryKind::PersonalInfo,
];

/// Store-wide figures for one user.
#[derive(Debug)]
pub struct StoreStats {
    pub total_memories: u64,
    pub by_kind: Vec<(MemoryKind, u64)>,
    pub chunk_count: u64,
    /// Sites with the most stored chunks, busiest first.
    pub top_sources: Vec<(String, u64)>,
    pub oldest_memory: Option<String>,
    pub newest_memory: Option<String>,
    pub db_size_bytes: u64,
}

/// Gather statistics for `user_id`. Pass no `db_path` for in-memory databases.
pub fn store_stats(conn: &Connection, user_id: &str, db_path: Option<&Path>) -> Result<StoreStats> {
    let mut by_kind = Vec::with_capacity(KINDS.len());
    for kind in KINDS {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE user_id = ?1 AND kind = ?2",
            params![user_id, kind.as_str()],
            |row| row.get(0),
        )?;
        by_kind.push((kind, count as u64));
    }
    let total_memories = by_kind.iter().map(|(_, n)| n).sum();

    let chunk_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM content_chunks c JOIN memories m ON m.id = c.memory_id \
         WHERE m.user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT c.source_id, COUNT(*) AS n FROM content_chunks c \
         JOIN memories m ON m.id = c.memory_id WHERE m.user_id = ?1 \
         GROUP BY c.source_id ORDER BY n DESC, c.source_id LIMIT 5",
    )?;
    let top_sources = stmt
        .query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let (oldest_memory, newest_memory) = conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM memories WHERE user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StoreStats {
        total_memories,
        by_kind,
        chunk_count: chunk_count as u64,
        top_sources,
        oldest_memory,
        newest_memory,
        db_size_bytes,
    })
}

/// Display memory statistics in the terminal.
pub fn stats(config: &TabRecallConfig, user_id: &str) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;

    let response = store_stats(&conn, user_id, Some(&db_path))?;

    println!("Memory Statistics for {user_id}");
    println!("{}", "=".repeat(40));
    println!("  Total memories:      {}", response.total_memories);
    for (kind, count) in &response.by_kind {
        println!("  {:<20} {}", kind.as_str(), count);
    }
    println!();

    println!("Content chunks:        {}", response.chunk_count);
    if !response.top_sources.is_empty() {
        println!("Top sources:");
        for (source, count) in &response.top_sources {
            println!("  {:<30} {}", source, count);
        }
    }
    println!();

    println!("Database size:         {} bytes", response.db_size_bytes);
    if let Some(ref oldest) = response.oldest_memory {
        println!("Oldest memory:         {oldest}");
    }
    if let Some(ref newest) = response.newest_memory {
        println!("Newest memory:         {newest}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn insert_memory(conn: &Connection, id: &str, user: &str, kind: &str, created: &str) {
        conn.execute(
            "INSERT INTO memories (id, user_id, kind, content, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 'note', ?4, ?4)",
            params![id, user, kind, created],
        )
        .unwrap();
    }

    fn insert_chunk(conn: &Connection, memory_id: &str, n: i64, source: &str) {
        conn.execute(
            "INSERT INTO content_chunks (id, memory_id, url, title, chunk_number, chunk_index, \
             total_chunks, content, original_content, source_id, content_type, quality_score, \
             word_count, created_at) \
             VALUES (?1, ?2, 'https://x', 't', ?3, ?3, 3, 'c', 'c', ?4, 'general', 0.5, 1, 0)",
            params![format!("{memory_id}_{n}"), memory_id, n, source],
        )
        .unwrap();
    }

    #[test]
    fn empty_database() {
        let conn = open_memory_database().unwrap();
        let stats = store_stats(&conn, "u", None).unwrap();
        assert_eq!(stats.total_memories, 0);
        assert_eq!(stats.chunk_count, 0);
        assert!(stats.top_sources.is_empty());
        assert!(stats.oldest_memory.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn counts_are_per_user_and_kind() {
        let conn = open_memory_database().unwrap();
        insert_memory(&conn, "a", "u", "browser_tab", "2026-01-02T00:00:00.000Z");
        insert_memory(&conn, "b", "u", "browser_tab", "2026-01-05T00:00:00.000Z");
        insert_memory(&conn, "c", "u", "personal_info", "2026-01-01T00:00:00.000Z");
        insert_memory(&conn, "d", "other", "conversation", "2025-01-01T00:00:00.000Z");
        insert_chunk(&conn, "a", 1, "docs.rs");
        insert_chunk(&conn, "a", 2, "docs.rs");
        insert_chunk(&conn, "b", 1, "tokio.rs");
        insert_chunk(&conn, "d", 1, "elsewhere.org");

        let stats = store_stats(&conn, "u", None).unwrap();
        assert_eq!(stats.total_memories, 3);
        assert_eq!(
            stats.by_kind,
            vec![
                (MemoryKind::BrowserTab, 2),
                (MemoryKind::Conversation, 0),
                (MemoryKind::PersonalInfo, 1),
            ]
        );
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(
            stats.top_sources,
            vec![("docs.rs".to_string(), 2), ("tokio.rs".to_string(), 1)]
        );
        assert_eq!(stats.oldest_memory.as_deref(), Some("2026-01-01T00:00:00.000Z"));
        assert_eq!(stats.newest_memory.as_deref(), Some("2026-01-05T00:00:00.000Z"));
    }
}
