use anyhow::Result;

use super::one_line;
use crate::server::AppState;

/// List a user's newest memories, as stored.
pub fn recent(state: &AppState, user_id: &str, limit: usize) -> Result<()> {
    let records = state.memories.recent(user_id, limit)?;

    if records.is_empty() {
        println!("No memories for {user_id}.");
        return Ok(());
    }

    for (i, record) in records.iter().enumerate() {
        let info = record.page_info();
        let created = record
            .created_at
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unknown".into());
        println!("  {}. {} [{created}]", i + 1, one_line(&info.title, 80));
        if let Some(url) = info.url {
            println!("     {url}");
        }
    }
    Ok(())
}
