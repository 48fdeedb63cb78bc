//! MCP `save_conversation_memory` tool parameter definition and path selection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Words that mark a short personal fact, stored without further processing.
pub const PERSONAL_INFO_KEYWORDS: [&str; 9] = [
    "name",
    "age",
    "location",
    "preference",
    "like",
    "dislike",
    "born",
    "live",
    "work",
];

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SaveConversationMemoryParams {
    #[schemars(
        description = "Information worth remembering, e.g. \"User's name is John\" or \"User prefers dark roast coffee\""
    )]
    pub information: String,

    #[schemars(description = "User identifier. Defaults to 'browser_user'.")]
    pub user_id: Option<String>,
}

/// `true` when the text reads like a simple personal fact.
///
/// Matching is by substring on the lowercased text, so "language" counts via "age".
pub fn is_personal_info(information: &str) -> bool {
    let lower = information.to_lowercase();
    PERSONAL_INFO_KEYWORDS.iter().any(|k| lower.contains(k))
}
