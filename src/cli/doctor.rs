//! CLI `doctor` command: database diagnostics plus a check of the configured models.

use anyhow::{Context, Result};

use crate::config::{expand_tilde, TabRecallConfig};
use crate::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &TabRecallConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `tabrecall serve` to initialize it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("TabRecall Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!(
        "  Stored:          {}",
        report.embedding_model.as_deref().unwrap_or("(not set)")
    );
    println!("  Configured:      {}", config.embedding.model);
    match report.embedding_model {
        Some(ref stored) if stored != &config.embedding.model => {
            println!("  WARNING: model mismatch, stored vectors will rank poorly.");
        }
        Some(_) => println!("  Status:          OK (match)"),
        None => {}
    }
    println!(
        "  Files:           {}",
        presence(&expand_tilde(&config.embedding.cache_dir))
    );
    if config.retrieval.use_reranking {
        println!(
            "Reranker files:    {}",
            presence(&expand_tilde(&config.retrieval.reranker_dir))
        );
    } else {
        println!("Reranker:          disabled");
    }
    println!(
        "LLM summaries:     {}",
        if config.llm.api_key.is_some() {
            "API key configured"
        } else {
            "no API key, titles only"
        }
    );
    println!();
    println!("Row counts:");
    println!("  Memories:        {}", report.memory_count);
    println!("  Content chunks:  {}", report.chunk_count);
    println!("  Audit log:       {}", report.log_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or move the file aside and let `tabrecall serve` create a fresh one.");
    }

    Ok(())
}

fn presence(dir: &std::path::Path) -> String {
    let complete = ["model.onnx", "tokenizer.json"]
        .iter()
        .all(|f| dir.join(f).exists());
    if complete {
        format!("present in {}", dir.display())
    } else {
        format!("missing, run `tabrecall model download` ({})", dir.display())
    }
}

fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b < 1024 => format!("{b} B"),
        b if b < 1024 * 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
    }
}
