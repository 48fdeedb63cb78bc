//! MCP `unified_search` / `search_memories` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UnifiedSearchParams {
    #[schemars(
        description = "Natural language query. Time-oriented phrasing (\"what did I just read\") favours recent pages."
    )]
    pub query: String,

    #[schemars(description = "User identifier. Defaults to 'browser_user'.")]
    pub user_id: Option<String>,

    #[schemars(description = "Maximum number of memories to return. Defaults to 5.")]
    pub limit: Option<usize>,
}
