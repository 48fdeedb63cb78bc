use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteTabMemoryParams {
    #[schemars(description = "ID of the memory to delete, as returned by search results")]
    pub memory_id: String,

    #[schemars(description = "User who owns the memory. Defaults to 'browser_user'.")]
    pub user_id: Option<String>,
}
