use anyhow::Result;

use super::one_line;
use crate::server::AppState;

/// Run a unified search from the terminal.
pub async fn search(state: &AppState, query: &str, user_id: &str, limit: usize) -> Result<()> {
    let response = state.search.search(query, user_id, limit).await?;

    let report = &response.temporal_intelligence;
    println!(
        "Intent: {} (confidence {:.2}), strategy: {}",
        report.intent, report.confidence, report.strategy
    );

    if response.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!(
        "{} result(s) from {} candidate(s), {} enriched across {} site(s)\n",
        response.results.len(),
        response.total_memories,
        response.enriched_results,
        response.domains_searched
    );

    for (i, hit) in response.results.iter().enumerate() {
        println!(
            "  {}. {} (score: {:.4}) {}",
            i + 1,
            hit.id,
            hit.score,
            hit.source_domain.as_deref().unwrap_or("-"),
        );
        println!("     {}", one_line(&hit.memory_summary, 120));
        for chunk in &hit.detailed_content {
            println!("       > {}", one_line(&chunk.chunk.original_content, 100));
        }
        println!();
    }

    println!("{}", report.explanation);
    Ok(())
}
