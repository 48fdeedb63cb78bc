//! Memory record definitions.
//!
//! Defines [`MemoryKind`] (what produced a memory), [`CreatedAt`] (the two
//! timestamp encodings a record may carry), [`MemoryRecord`] (one stored note)
//! and [`RecordSource`], which separates records whose page fields come from
//! reliable metadata from records whose fields must be inferred from text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::page::{extract_domain, infer_page_info, PageInfo};

/// Origin of a stored memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A visited browser tab saved by the extension.
    BrowserTab,
    /// Information captured from a conversation.
    Conversation,
    /// Short personal facts stored on the fast path.
    PersonalInfo,
}

impl MemoryKind {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrowserTab => "browser_tab",
            Self::Conversation => "conversation",
            Self::PersonalInfo => "personal_info",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "browser_tab" => Ok(Self::BrowserTab),
            "conversation" => Ok(Self::Conversation),
            "personal_info" => Ok(Self::PersonalInfo),
            _ => Err(format!("unknown memory kind: {s}")),
        }
    }
}

/// Creation time as stored: an ISO-8601 string or epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedAt {
    Epoch(f64),
    Iso(String),
}

impl From<&str> for CreatedAt {
    fn from(value: &str) -> Self {
        Self::Iso(value.to_string())
    }
}

impl From<f64> for CreatedAt {
    fn from(value: f64) -> Self {
        Self::Epoch(value)
    }
}

impl std::fmt::Display for CreatedAt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Epoch(secs) => write!(f, "{secs}"),
            Self::Iso(s) => f.write_str(s),
        }
    }
}

/// One stored note as handed to the temporal engine.
///
/// `score` is the semantic relevance assigned by the store's search (higher is
/// better); it is `None` for records fetched without a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub memory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<CreatedAt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub user_id: String,
}

/// Page fields carried in metadata by browser-tab memories.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMeta {
    pub url: String,
    pub title: String,
    pub synopsis: Option<String>,
    pub domain: Option<String>,
    pub tags: Vec<String>,
}

/// Where a record's page fields come from.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSource<'a> {
    /// Metadata names the page explicitly.
    Structured(PageMeta),
    /// Only the body text is available; fields must be inferred.
    Unstructured(&'a str),
}

impl MemoryRecord {
    pub fn new(id: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            memory: memory.into(),
            created_at: None,
            score: None,
            metadata: None,
            user_id: String::new(),
        }
    }

    pub fn with_created_at(mut self, created_at: impl Into<CreatedAt>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()?
            .get(key)?
            .as_str()
            .filter(|s| !s.trim().is_empty())
    }

    /// Metadata `content_type`, if present.
    pub fn kind(&self) -> Option<MemoryKind> {
        self.meta_str("content_type")?.parse().ok()
    }

    /// Classify the record by how reliably its page fields are known.
    pub fn source(&self) -> RecordSource<'_> {
        let Some(url) = self.meta_str("url") else {
            return RecordSource::Unstructured(&self.memory);
        };

        let tags = self
            .metadata
            .as_ref()
            .and_then(|m| m.get("tags"))
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        RecordSource::Structured(PageMeta {
            url: url.to_string(),
            title: self.meta_str("title").unwrap_or("Untitled").to_string(),
            synopsis: self.meta_str("synopsis").map(str::to_string),
            domain: self
                .meta_str("domain")
                .map(str::to_string)
                .or_else(|| extract_domain(url)),
            tags,
        })
    }

    /// Page fields, metadata first, then inferred from the body.
    pub fn page_info(&self) -> PageInfo {
        match self.source() {
            RecordSource::Structured(meta) => PageInfo {
                title: meta.title,
                url: Some(meta.url),
                synopsis: meta.synopsis,
                domain: meta.domain,
            },
            RecordSource::Unstructured(text) => infer_page_info(text),
        }
    }
}
