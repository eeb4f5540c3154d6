//! Page navigation, resolved by the client.

use super::ToolDefinition;
use serde_json::json;

pub const NAVIGATE_TOOL: &str = "navigate_to_page";

/// Declaration of the navigation tool. There is no server executor: the
/// client opens the URL and acknowledges the call itself.
pub fn navigate_definition() -> ToolDefinition {
    ToolDefinition::new(
        NAVIGATE_TOOL,
        "Navigate the user to a specific url. Always pass a full https:// url.",
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The target url to navigate to."
                }
            },
            "required": ["url"]
        }),
    )
}
