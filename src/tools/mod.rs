pub mod delete_tab_memory;
pub mod save_conversation_memory;
pub mod save_tab_memory;
pub mod search_content;
pub mod unified_search;
pub mod user_scope;

use chrono::Utc;
use delete_tab_memory::DeleteTabMemoryParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use save_conversation_memory::{is_personal_info, SaveConversationMemoryParams};
use save_tab_memory::SaveTabMemoryParams;
use search_content::SearchContentParams;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use unified_search::UnifiedSearchParams;
use user_scope::{LastVisitedParams, UserScopeParams};

use crate::embedding::EmbeddingProvider;
use crate::ingest::TabSnapshot;
use crate::memory::types::MemoryKind;
use crate::server::AppState;

/// The tabrecall MCP tool handler. Holds the shared [`AppState`] and exposes
/// all MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct TabRecallTools {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

/// Run store work on the blocking pool, flattening both failure layers into a message.
async fn run_blocking<T, F>(f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("db task failed: {e}"))?
        .map_err(|e| format!("{e:#}"))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

impl TabRecallTools {
    fn user(&self, user_id: Option<String>) -> String {
        user_id
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.state.config.storage.default_user.clone())
    }

    fn limit(&self, limit: Option<usize>) -> usize {
        limit
            .unwrap_or(self.state.config.retrieval.default_limit)
            .max(1)
    }
}

#[tool_router]
impl TabRecallTools {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            state,
        }
    }

    /// Save a browser tab. Returns at once; summary and chunks follow in the background.
    #[tool(description = "Save a visited browser tab. Stored immediately; an LLM synopsis and searchable content chunks are added in the background.")]
    async fn save_tab_memory(
        &self,
        Parameters(params): Parameters<SaveTabMemoryParams>,
    ) -> Result<String, String> {
        let user_id = self.user(params.user_id);
        tracing::info!(
            url = %params.url,
            content_len = params.content.len(),
            user_id = %user_id,
            "save_tab_memory called"
        );

        let title = params.title.clone();
        let saved = self
            .state
            .ingestor
            .save_tab(TabSnapshot {
                user_id,
                url: params.url,
                title: params.title,
                content: params.content,
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "save_tab_memory failed");
                format!("Error saving memory: {e:#}")
            })?;

        tracing::debug!(memory_id = %saved.memory_id, "tab stored");
        Ok(format!(
            "Saved memory: {title} (processing content in background)"
        ))
    }

    /// Temporal-aware memory search with page excerpts.
    #[tool(description = "Search saved tabs and memories. Detects time-oriented questions (\"what did I just read\") and ranks by recency when appropriate; attaches matching page excerpts grouped by site.")]
    async fn unified_search(
        &self,
        Parameters(params): Parameters<UnifiedSearchParams>,
    ) -> Result<String, String> {
        let user_id = self.user(params.user_id);
        let limit = self.limit(params.limit);
        tracing::info!(query = %params.query, user_id = %user_id, limit, "unified_search called");

        let response = self
            .state
            .search
            .search(&params.query, &user_id, limit)
            .await
            .map_err(|e| format!("Error in unified search: {e:#}"))?;
        to_json(&response)
    }

    #[tool(description = "Deprecated: use unified_search. Same parameters and result.")]
    async fn search_memories(
        &self,
        Parameters(params): Parameters<UnifiedSearchParams>,
    ) -> Result<String, String> {
        tracing::warn!("search_memories is deprecated, use unified_search instead");
        self.unified_search(Parameters(params)).await
    }

    /// Search within stored page content.
    #[tool(description = "Search inside saved page content. Pass a source_domain from unified_search as source_filter to stay on one site.")]
    async fn search_content(
        &self,
        Parameters(params): Parameters<SearchContentParams>,
    ) -> Result<String, String> {
        let limit = self.limit(params.limit);
        tracing::info!(
            query = %params.query,
            source_filter = ?params.source_filter,
            limit,
            "search_content called"
        );

        let response = self
            .state
            .search
            .content_search(&params.query, params.source_filter.as_deref(), limit)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "search_content failed");
                format!("Error searching content: {e:#}")
            })?;
        to_json(&response)
    }

    /// Delete one memory and its content chunks.
    #[tool(description = "Delete a saved memory and all content chunks stored for it.")]
    async fn delete_tab_memory(
        &self,
        Parameters(params): Parameters<DeleteTabMemoryParams>,
    ) -> Result<String, String> {
        let user_id = self.user(params.user_id);
        let memories = Arc::clone(&self.state.memories);
        let id = params.memory_id.clone();

        let outcome = run_blocking(move || memories.delete(&id, &user_id))
            .await
            .map_err(|e| format!("Error deleting memory: {e}"))?;

        if !outcome.deleted {
            return Err(format!("Failed to delete memory {}", params.memory_id));
        }
        Ok(format!(
            "Successfully deleted memory {} and {} content chunks",
            params.memory_id, outcome.chunks_removed
        ))
    }

    /// Remember something said in conversation.
    #[tool(description = "Save personal information from a conversation, e.g. \"User's name is John\". Short personal facts are stored on a fast path.")]
    async fn save_conversation_memory(
        &self,
        Parameters(params): Parameters<SaveConversationMemoryParams>,
    ) -> Result<String, String> {
        if params.information.trim().is_empty() {
            return Err("information must not be empty".into());
        }
        let user_id = self.user(params.user_id);
        let fast_path = is_personal_info(&params.information);
        let now = Utc::now();

        let mut metadata = Map::new();
        metadata.insert("timestamp".into(), json!(now.to_rfc3339()));
        if fast_path {
            metadata.insert("type".into(), json!("personal_info"));
            metadata.insert("fast_store".into(), json!(true));
            metadata.insert(
                "temporal_id".into(),
                json!(format!("conv_{}_{user_id}", now.timestamp())),
            );
            metadata.insert("content_type".into(), json!(MemoryKind::PersonalInfo.as_str()));
        } else {
            metadata.insert("source".into(), json!("conversation"));
            metadata.insert("content_type".into(), json!(MemoryKind::Conversation.as_str()));
        }

        let memories = Arc::clone(&self.state.memories);
        let text = params.information.clone();
        let memory_id = run_blocking(move || memories.add_memory(&user_id, &text, Some(metadata)))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "save_conversation_memory failed");
                format!("Failed to save conversation memory: {e}")
            })?;

        let message = if fast_path {
            format!("Quickly saved personal info: {}", params.information)
        } else {
            format!("Saved conversation memory: {}", params.information)
        };
        to_json(&json!({
            "success": true,
            "memory_id": memory_id,
            "message": message,
            "fast_path": fast_path,
        }))
    }

    /// Delete every memory of a user.
    #[tool(description = "Delete ALL memories and page content of a user. Use with caution.")]
    async fn clear_all_tab_memories(
        &self,
        Parameters(params): Parameters<UserScopeParams>,
    ) -> Result<String, String> {
        let user_id = self.user(params.user_id);
        tracing::warn!(user_id = %user_id, "clearing all memories");

        let memories = Arc::clone(&self.state.memories);
        let user = user_id.clone();
        let outcome = run_blocking(move || memories.clear(&user))
            .await
            .map_err(|e| format!("Error clearing memories: {e}"))?;

        Ok(format!(
            "Successfully cleared {} memories and {} content chunks for user {user_id}",
            outcome.memories_removed, outcome.chunks_removed
        ))
    }

    /// Counts of memories, chunks and sites, plus embedding cache behaviour.
    #[tool(description = "Get statistics: memory count, content chunk count, unique sites and embedding cache hit rate.")]
    async fn get_memory_stats(
        &self,
        Parameters(params): Parameters<UserScopeParams>,
    ) -> Result<String, String> {
        let user_id = self.user(params.user_id);
        let memories = Arc::clone(&self.state.memories);
        let content = Arc::clone(&self.state.content);
        let user = user_id.clone();

        let (memory_count, chunk_count, domains) = run_blocking(move || {
            Ok((memories.count(&user)?, content.count()?, content.unique_sources()?))
        })
        .await
        .map_err(|e| format!("Error getting memory stats: {e}"))?;

        let cache = self.state.embedding.stats();
        to_json(&json!({
            "user_id": user_id,
            "memory_count": memory_count,
            "content_chunks_count": chunk_count,
            "unique_domains": domains.len(),
            "storage_type": "SQLite + sqlite-vec",
            "embedding_cache": {
                "hits": cache.hits,
                "misses": cache.misses,
                "size": cache.size,
                "capacity": cache.capacity,
                "hit_rate": cache.hit_rate(),
            },
        }))
    }

    /// Liveness probe. Touches no storage.
    #[tool(description = "Fast health check: confirms the server responds and reports configuration.")]
    async fn health_check(&self) -> Result<String, String> {
        let llm_key = if self.state.summarizer.is_configured() {
            "configured"
        } else {
            "missing"
        };
        to_json(&json!({
            "server": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
            "status": "MCP server is running and responsive",
            "fast_check": true,
            "dependencies": {
                "llm_key": llm_key,
                "llm_model": self.state.summarizer.model(),
                "embedding_model": self.state.config.embedding.model,
                "reranker": self.state.reranker.name(),
            },
        }))
    }

    /// Exercise the database, the embedding model and the LLM endpoint.
    #[tool(description = "Thorough health check: database integrity, an embedding round trip and LLM endpoint reachability.")]
    async fn deep_health_check(&self) -> Result<String, String> {
        let mut dependencies = Map::new();
        let mut healthy = true;

        let db = Arc::clone(&self.state.db);
        let database = run_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            crate::db::check_database_health(&conn)
        })
        .await;
        let database = match database {
            Ok(report) if report.integrity_ok => json!({ "status": "connected", "report": report }),
            Ok(report) => {
                healthy = false;
                json!({ "status": format!("integrity: {}", report.integrity_details), "report": report })
            }
            Err(e) => {
                healthy = false;
                json!({ "status": format!("error: {e}") })
            }
        };
        dependencies.insert("database".into(), database);

        let embedder = Arc::clone(&self.state.embedding);
        let embedding = run_blocking(move || Ok(embedder.embed("health check")?)).await;
        let embedding = match embedding {
            Ok(v) => json!({ "status": "ok", "dimensions": v.len() }),
            Err(e) => {
                healthy = false;
                json!({ "status": format!("error: {e}") })
            }
        };
        dependencies.insert("embedding".into(), embedding);

        let llm = match self.state.summarizer.ping().await {
            Ok(()) => Value::from("connected"),
            Err(e) => Value::from(format!("error: {e:#}")),
        };
        dependencies.insert("llm".into(), llm);

        let server = if healthy { "healthy" } else { "degraded" };
        to_json(&json!({
            "server": server,
            "timestamp": Utc::now().to_rfc3339(),
            "dependencies": dependencies,
        }))
    }

    /// Most recent pages by time alone.
    #[tool(description = "List the most recently visited pages in chronological order, newest first. Ignores relevance; use for \"last page I visited\" style questions.")]
    async fn get_last_visited_pages(
        &self,
        Parameters(params): Parameters<LastVisitedParams>,
    ) -> Result<String, String> {
        let user_id = self.user(params.user_id);
        let limit = self.limit(params.limit);

        let response = self
            .state
            .search
            .last_visited(&user_id, limit)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "get_last_visited_pages failed");
                format!("Error getting last visited pages: {e:#}")
            })?;
        to_json(&response)
    }
}

#[tool_handler]
impl ServerHandler for TabRecallTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "tabrecall remembers the browser tabs you save. Use save_tab_memory to store a \
                 page, unified_search to find pages and memories (time-aware), search_content \
                 to dig into one site's text and get_last_visited_pages for pure recency."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
