//! Parameters for tools that only need a user, and optionally a limit.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Used by `clear_all_tab_memories` and `get_memory_stats`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UserScopeParams {
    #[schemars(description = "User identifier. Defaults to 'browser_user'.")]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LastVisitedParams {
    #[schemars(description = "User identifier. Defaults to 'browser_user'.")]
    pub user_id: Option<String>,

    #[schemars(description = "Number of pages to return, newest first. Defaults to 5.")]
    pub limit: Option<usize>,
}
