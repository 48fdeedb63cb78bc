mod helpers;

use tabrecall::db;

fn names(conn: &rusqlite::Connection, kind: &str) -> Vec<String> {
    conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
        .unwrap()
        .query_map([kind], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn full_schema_creates_all_tables_and_indexes() {
    let conn = helpers::test_db();

    let tables = names(&conn, "table");
    for table in [
        "memories",
        "memories_vec",
        "content_chunks",
        "chunks_vec",
        "memory_log",
        "schema_meta",
    ] {
        assert!(tables.iter().any(|t| t == table), "{table} table missing");
    }

    let indexes = names(&conn, "index");
    for index in [
        "idx_memories_user",
        "idx_memories_created",
        "idx_chunks_memory",
        "idx_chunks_source",
        "idx_memories_user_created",
        "idx_chunks_created",
    ] {
        assert!(indexes.iter().any(|i| i == index), "{index} index missing");
    }
}

#[test]
fn kind_check_rejects_unknown_values() {
    let conn = helpers::test_db();
    conn.execute(
        "INSERT INTO memories (id, user_id, kind, content, created_at, updated_at)
         VALUES ('ok', 'u', 'browser_tab', 'Visited: Rust', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        [],
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO memories (id, user_id, kind, content, created_at, updated_at)
         VALUES ('bad', 'u', 'episodic', 'x', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        [],
    );
    assert!(result.is_err(), "unknown kind should be rejected by CHECK constraint");
}

#[test]
fn chunks_cascade_with_their_memory() {
    let conn = helpers::test_db();
    conn.execute_batch(
        "INSERT INTO memories (id, user_id, kind, content, created_at, updated_at)
             VALUES ('m1', 'u', 'browser_tab', 'Visited: Rust', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');
         INSERT INTO content_chunks (id, memory_id, url, title, chunk_number, chunk_index, total_chunks,
             content, original_content, source_id, content_type, quality_score, word_count, created_at)
             VALUES ('m1_1', 'm1', 'https://docs.rs', 'Rust', 1, 0, 1, 'c', 'c', 'docs.rs', 'general', 0.5, 1, 0);",
    )
    .unwrap();

    conn.execute("DELETE FROM memories WHERE id = 'm1'", []).unwrap();
    let left: i64 = conn
        .query_row("SELECT COUNT(*) FROM content_chunks", [], |r| r.get(0))
        .unwrap();
    assert_eq!(left, 0);
}

#[test]
fn vec_tables_accept_384_dim_vectors() {
    let conn = helpers::test_db();
    let embedding = vec![0.5f32; 384];
    conn.execute(
        "INSERT INTO chunks_vec (id, embedding) VALUES (?1, ?2)",
        rusqlite::params!["v1", tabrecall::memory::embedding_to_bytes(&embedding)],
    )
    .unwrap();

    let wrong = vec![0.5f32; 12];
    let result = conn.execute(
        "INSERT INTO chunks_vec (id, embedding) VALUES (?1, ?2)",
        rusqlite::params!["v2", tabrecall::memory::embedding_to_bytes(&wrong)],
    );
    assert!(result.is_err(), "vec0 should reject a dimension mismatch");
}

#[test]
fn health_report_counts_rows() {
    let conn = helpers::test_db();
    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.memory_count, 0);
    assert_eq!(report.chunk_count, 0);
    assert_eq!(report.log_count, 0);
    assert_eq!(
        report.embedding_model.as_deref(),
        Some(db::migrations::DEFAULT_EMBEDDING_MODEL)
    );
}
