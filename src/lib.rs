//! Browsing memory for AI assistants, served over MCP.
//!
//! TabRecall keeps two layers for every visited page a browser extension sends it:
//!
//! | Layer | Holds | Used for |
//! |-------|-------|----------|
//! | **Memory** | One short note per page: title, URL, synopsis, tags | Finding which pages matter |
//! | **Content** | The page text split into embedded chunks | Quoting what the pages said |
//!
//! Queries go through [`search::UnifiedSearch`], which reads the temporal intent of
//! the question ("what did I read yesterday" versus "how does borrowing work"),
//! picks a retrieval strategy, then attaches the best content excerpts per site.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec) for vector search
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions), behind an LRU cache
//! - **Reranking**: Optional ms-marco cross-encoder over content chunks
//! - **Summaries**: OpenAI-compatible chat completions, with a title-only fallback
//! - **Transport**: MCP over stdio or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: TOML files and environment variables
//! - [`db`]: schema, migrations and health checks
//! - [`embedding`]: text-to-vector pipeline and its cache
//! - [`memory`]: the memory layer
//! - [`content`]: chunking, the content layer and reranking
//! - [`temporal`]: intent analysis, routing, time-aware scoring
//! - [`search`]: the unified search pipeline
//! - [`ingest`]: saving tabs and enriching them in the background
//! - [`tools`]: the MCP tool surface

pub mod config;
pub mod content;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod memory;
pub mod search;
pub mod server;
pub mod summarize;
pub mod temporal;
pub mod tools;
