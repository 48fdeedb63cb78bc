//! Tab ingestion.
//!
//! Saving a tab writes a placeholder memory at once so the page is searchable
//! right away. A detached task then asks the summarizer for a synopsis and
//! tags, rewrites the memory with them, and chunks and embeds the page text.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::config::ContentConfig;
use crate::content::chunking::smart_chunk;
use crate::content::store::SqliteContentStore;
use crate::memory::store::{PageVisit, SqliteMemoryStore};
use crate::summarize::LlmSummarizer;

/// Tags a tab carries until its summary arrives.
pub const PLACEHOLDER_TAGS: [&str; 2] = ["browser", "tab"];

/// A tab as sent by the browser extension.
#[derive(Debug, Clone)]
pub struct TabSnapshot {
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub content: String,
}

pub struct SavedTab {
    pub memory_id: String,
    /// Background summarize-and-chunk pass. Dropping the handle detaches it.
    pub enrichment: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub summary_applied: bool,
    pub chunks_stored: usize,
}

#[derive(Clone)]
pub struct TabIngestor {
    memories: Arc<SqliteMemoryStore>,
    content: Arc<SqliteContentStore>,
    summarizer: Arc<LlmSummarizer>,
    config: ContentConfig,
}

impl TabIngestor {
    pub fn new(
        memories: Arc<SqliteMemoryStore>,
        content: Arc<SqliteContentStore>,
        summarizer: Arc<LlmSummarizer>,
        config: ContentConfig,
    ) -> Self {
        Self {
            memories,
            content,
            summarizer,
            config,
        }
    }

    /// Store the placeholder memory and schedule enrichment.
    pub async fn save_tab(&self, tab: TabSnapshot) -> Result<SavedTab> {
        let visit = PageVisit {
            user_id: tab.user_id.clone(),
            url: tab.url.clone(),
            title: tab.title.clone(),
            synopsis: format!("Visited: {}", tab.title),
            tags: PLACEHOLDER_TAGS.iter().map(|t| t.to_string()).collect(),
            preview: tab
                .content
                .chars()
                .take(self.config.stored_preview_chars)
                .collect(),
        };

        let memories = Arc::clone(&self.memories);
        let memory_id = tokio::task::spawn_blocking(move || memories.add_browser_memory(&visit))
            .await
            .context("save task panicked")??;
        tracing::info!(memory_id = %memory_id, url = %tab.url, "tab saved, enriching in background");

        let this = self.clone();
        let id = memory_id.clone();
        let enrichment = tokio::spawn(async move {
            match this.enrich(&id, &tab).await {
                Ok(report) => tracing::info!(
                    memory_id = %id,
                    summary_applied = report.summary_applied,
                    chunks = report.chunks_stored,
                    "tab enrichment complete"
                ),
                Err(e) => tracing::error!(memory_id = %id, error = %e, "tab enrichment failed"),
            }
        });

        Ok(SavedTab {
            memory_id,
            enrichment,
        })
    }

    /// Summarize, rewrite and chunk one saved tab.
    ///
    /// A failed summary update is logged and chunking still runs. If the memory
    /// has been deleted in the meantime nothing is stored.
    pub async fn enrich(&self, memory_id: &str, tab: &TabSnapshot) -> Result<EnrichmentReport> {
        let summary = self.summarizer.summarize(&tab.content, &tab.title).await;

        let memories = Arc::clone(&self.memories);
        let id = memory_id.to_string();
        let updated = tokio::task::spawn_blocking(move || {
            memories.update_page_summary(&id, &summary.synopsis, &summary.tags)
        })
        .await
        .context("summary update task panicked")?;

        let summary_applied = match updated {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!(memory_id, "memory gone before enrichment, skipping chunks");
                return Ok(EnrichmentReport {
                    summary_applied: false,
                    chunks_stored: 0,
                });
            }
            Err(e) => {
                tracing::error!(memory_id, error = %e, "failed to apply page summary");
                false
            }
        };

        let content = Arc::clone(&self.content);
        let config = self.config.clone();
        let id = memory_id.to_string();
        let tab = tab.clone();
        let chunks_stored = tokio::task::spawn_blocking(move || {
            let chunks = smart_chunk(&tab.content, &tab.title, &tab.url, &config);
            content.add_chunks(&id, &chunks)
        })
        .await
        .context("chunking task panicked")??;

        Ok(EnrichmentReport {
            summary_applied,
            chunks_stored,
        })
    }
}
