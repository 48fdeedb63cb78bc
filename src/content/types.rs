use serde::Serialize;

/// Coarse topic of a chunk, by keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Commerce,
    Instructional,
    News,
    Organizational,
    General,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commerce => "commerce",
            Self::Instructional => "instructional",
            Self::News => "news",
            Self::Organizational => "organizational",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commerce" => Ok(Self::Commerce),
            "instructional" => Ok(Self::Instructional),
            "news" => Ok(Self::News),
            "organizational" => Ok(Self::Organizational),
            "general" => Ok(Self::General),
            _ => Err(format!("unknown content type: {s}")),
        }
    }
}

/// One piece of page text produced by the chunker, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageChunk {
    pub url: String,
    pub title: String,
    /// 1-based position among the splitter's output, before quality filtering.
    pub chunk_number: usize,
    /// Text that gets embedded, possibly prefixed with title and site context.
    pub content: String,
    pub original_content: String,
    pub source_id: String,
    pub content_type: ContentType,
    pub quality_score: f64,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub word_count: usize,
}

/// A stored chunk, as returned by content search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentChunk {
    /// `{memory_id}_{chunk_number}`.
    pub id: String,
    pub memory_id: String,
    #[serde(flatten)]
    pub chunk: PageChunk,
    /// Epoch seconds.
    pub created_at: f64,
    /// Time-weighted similarity from the last search; 0.0 outside a search.
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl ContentChunk {
    pub fn chunk_id(memory_id: &str, chunk_number: usize) -> String {
        format!("{memory_id}_{chunk_number}")
    }

    /// The page text without the context prefix added for embedding.
    pub fn text(&self) -> &str {
        &self.chunk.original_content
    }
}
