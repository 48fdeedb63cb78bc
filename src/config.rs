use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TabRecallConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub content: ContentConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub default_user: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    /// Maximum number of distinct texts kept in the embedding LRU cache.
    pub cache_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    /// Semantic candidates fetched per requested result before intent analysis.
    pub initial_search_multiplier: usize,
    /// Upper bound on records merged in by the fresh-memory boost.
    pub fresh_memory_limit: usize,
    pub use_reranking: bool,
    pub reranker_dir: String,
    /// Per-day decay applied to content chunk similarity.
    pub time_weight_decay: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContentConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub content_filtering: bool,
    pub contextual_embeddings: bool,
    /// Characters of page content kept on the immediate save path.
    pub stored_preview_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8052,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_data_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            default_user: "browser_user".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_data_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            cache_capacity: 1000,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let reranker_dir = default_data_dir()
            .join("models")
            .join("reranker")
            .to_string_lossy()
            .into_owned();
        Self {
            default_limit: 5,
            initial_search_multiplier: 4,
            fresh_memory_limit: 10,
            use_reranking: true,
            reranker_dir,
            time_weight_decay: 0.001,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            chunk_size: 3000,
            chunk_overlap: 300,
            content_filtering: true,
            contextual_embeddings: true,
            stored_preview_chars: 1000,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Returns `~/.tabrecall/`, or `./.tabrecall` when no home directory is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tabrecall")
}

/// Returns the default config file path: `~/.tabrecall/config.toml`
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

impl TabRecallConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            TabRecallConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TABRECALL_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("TABRECALL_USER") {
            self.storage.default_user = val;
        }
        if let Ok(val) = std::env::var("TABRECALL_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("TABRECALL_TRANSPORT") {
            self.server.transport = val;
        }
        if let Ok(val) = std::env::var("TABRECALL_LLM_MODEL") {
            self.llm.model = val;
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            if !val.trim().is_empty() {
                self.llm.api_key = Some(val);
            }
        }
        if let Ok(val) = std::env::var("USE_RERANKING") {
            self.retrieval.use_reranking = val.eq_ignore_ascii_case("true");
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TabRecallConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.port, 8052);
        assert_eq!(config.storage.default_user, "browser_user");
        assert_eq!(config.retrieval.initial_search_multiplier, 4);
        assert_eq!(config.content.chunk_size, 3000);
        assert!(config.llm.api_key.is_none());
        assert!(config.storage.db_path.ends_with("memory.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
port = 9000

[storage]
db_path = "/tmp/test.db"
default_user = "alice"

[retrieval]
use_reranking = false

[content]
chunk_overlap = 100
"#;
        let config: TabRecallConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.storage.default_user, "alice");
        assert!(!config.retrieval.use_reranking);
        assert_eq!(config.content.chunk_overlap, 100);
        // defaults still apply for unset fields
        assert_eq!(config.retrieval.default_limit, 5);
        assert_eq!(config.content.chunk_size, 3000);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = TabRecallConfig::default();
        std::env::set_var("TABRECALL_DB", "/tmp/override.db");
        std::env::set_var("TABRECALL_USER", "env-user");
        std::env::set_var("TABRECALL_LOG_LEVEL", "trace");
        std::env::set_var("USE_RERANKING", "false");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.storage.default_user, "env-user");
        assert_eq!(config.server.log_level, "trace");
        assert!(!config.retrieval.use_reranking);

        std::env::remove_var("TABRECALL_DB");
        std::env::remove_var("TABRECALL_USER");
        std::env::remove_var("TABRECALL_LOG_LEVEL");
        std::env::remove_var("USE_RERANKING");
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TabRecallConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.retrieval.fresh_memory_limit, 10);
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/db.sqlite"), PathBuf::from("/var/db.sqlite"));
    }
}
