//! MCP `save_tab_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `save_tab_memory` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SaveTabMemoryParams {
    #[schemars(description = "URL of the visited page")]
    pub url: String,

    #[schemars(description = "Page title")]
    pub title: String,

    /// Full extracted page text. Chunked and embedded in the background.
    #[schemars(description = "Extracted text content of the page")]
    pub content: String,

    #[schemars(description = "User identifier. Defaults to 'browser_user'.")]
    pub user_id: Option<String>,
}
