//! Forward-only schema migrations.
//!
//! `schema_meta.schema_version` holds the applied version. Each step in
//! [`MIGRATIONS`] runs inside its own transaction together with the version bump.

use rusqlite::{Connection, OptionalExtension};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

type Migration = fn(&Connection) -> rusqlite::Result<()>;

/// `(target_version, step)` in ascending order.
const MIGRATIONS: &[(u32, Migration)] = &[(2, add_recency_index)];

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn meta_get(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM schema_meta WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .optional()
}

fn meta_set(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO schema_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

/// Embedding model that produced the stored vectors, if recorded.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    meta_get(conn, "embedding_model")
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    meta_set(conn, "embedding_model", model)
}

/// Apply every migration newer than the stored version.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let current = get_schema_version(conn)?;
    tracing::debug!(
        schema_version = current,
        target = CURRENT_SCHEMA_VERSION,
        "checking migrations"
    );

    for &(target, step) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        tracing::info!(to = target, "running migration");
        let tx = conn.unchecked_transaction()?;
        step(&tx)?;
        meta_set(&tx, "schema_version", &target.to_string())?;
        tx.commit()?;
    }
    Ok(())
}

/// v2: `recent` and the fresh-memory merge read newest-first per user.
fn add_recency_index(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_memories_user_created
             ON memories(user_id, created_at DESC);
         CREATE INDEX IF NOT EXISTS idx_chunks_created ON content_chunks(created_at);",
    )
}
