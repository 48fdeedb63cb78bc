//! MCP `search_content` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchContentParams {
    #[schemars(description = "What to look for inside saved page content")]
    pub query: String,

    /// Domain as reported in `source_domain` by `unified_search`.
    #[schemars(
        description = "Restrict to one site, e.g. 'docs.rs'. Use a source_domain from unified_search results."
    )]
    pub source_filter: Option<String>,

    /// Accepted for symmetry with the other tools; page chunks are not partitioned by user.
    #[schemars(description = "User identifier. Defaults to 'browser_user'.")]
    pub user_id: Option<String>,

    #[schemars(description = "Maximum number of chunks to return. Defaults to 5.")]
    pub limit: Option<usize>,
}
