//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! [`AppState::open`] wires the database, the cached embedding provider, both
//! stores, the reranker and the summarizer together; [`serve_stdio`] and
//! [`serve_http`] expose that state through [`TabRecallTools`].

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::config::TabRecallConfig;
use crate::content::rerank::{create_reranker, Reranker};
use crate::content::store::SqliteContentStore;
use crate::db;
use crate::embedding::cache::CachedEmbeddingProvider;
use crate::embedding::{self, EmbeddingProvider};
use crate::ingest::TabIngestor;
use crate::memory::store::SqliteMemoryStore;
use crate::search::UnifiedSearch;
use crate::summarize::LlmSummarizer;
use crate::temporal::TemporalIntelligence;
use crate::tools::TabRecallTools;

/// Everything the tools and CLI commands share. Built once per process.
pub struct AppState {
    pub config: Arc<TabRecallConfig>,
    pub db: Arc<Mutex<Connection>>,
    pub embedding: Arc<CachedEmbeddingProvider>,
    pub memories: Arc<SqliteMemoryStore>,
    pub content: Arc<SqliteContentStore>,
    pub reranker: Arc<dyn Reranker>,
    pub summarizer: Arc<LlmSummarizer>,
    pub search: UnifiedSearch,
    pub ingestor: TabIngestor,
}

impl AppState {
    /// Open the configured database and load the local embedding model.
    pub fn open(config: TabRecallConfig) -> Result<Self> {
        let db_path = config.resolved_db_path();
        let conn = db::open_database(&db_path)?;
        tracing::info!(db = %db_path.display(), "database ready");

        if let Ok(Some(stored_model)) = db::migrations::get_embedding_model(&conn) {
            if stored_model != config.embedding.model {
                tracing::warn!(
                    stored = %stored_model,
                    configured = %config.embedding.model,
                    "embedding model differs from the one stored vectors were built with"
                );
            }
        }

        let provider = embedding::create_provider(&config.embedding)?;
        tracing::info!("embedding provider ready");

        Self::from_parts(config, conn, Arc::from(provider))
    }

    /// Assemble the state around an already opened connection and provider.
    pub fn from_parts(
        config: TabRecallConfig,
        conn: Connection,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let db = Arc::new(Mutex::new(conn));

        let embedding = Arc::new(CachedEmbeddingProvider::new(
            provider,
            config.embedding.cache_capacity,
        ));
        let embedder: Arc<dyn EmbeddingProvider> = embedding.clone();

        let memories = Arc::new(SqliteMemoryStore::new(db.clone(), embedder.clone()));
        let content = Arc::new(SqliteContentStore::new(
            db.clone(),
            embedder.clone(),
            &config,
        ));
        let reranker = create_reranker(&config.retrieval);
        let summarizer =
            Arc::new(LlmSummarizer::new(&config.llm).context("failed to set up summarizer")?);
        if !summarizer.is_configured() {
            tracing::info!("no LLM API key, page summaries will come from titles");
        }

        let temporal = Arc::new(TemporalIntelligence::new(embedder));
        let search = UnifiedSearch::new(
            memories.clone(),
            content.clone(),
            reranker.clone(),
            temporal,
            &config.retrieval,
        );
        let ingestor = TabIngestor::new(
            memories.clone(),
            content.clone(),
            summarizer.clone(),
            config.content.clone(),
        );

        Ok(Self {
            config,
            db,
            embedding,
            memories,
            content,
            reranker,
            summarizer,
            search,
            ingestor,
        })
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: TabRecallConfig) -> Result<()> {
    tracing::info!("starting tabrecall MCP server on stdio");

    let state = Arc::new(AppState::open(config)?);

    let tools = TabRecallTools::new(state);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over streamable HTTP.
pub async fn serve_http(config: TabRecallConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting tabrecall MCP server on HTTP");

    let state = Arc::new(AppState::open(config)?);

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(TabRecallTools::new(state.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
