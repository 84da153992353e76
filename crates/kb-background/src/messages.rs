//! Runtime messaging protocol between the background and other contexts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message received by the background, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Sent by the page scanner when a keyword shows up in page text
    #[serde(rename_all = "camelCase")]
    ContentBlocked {
        original_url: String,
        keyword_found: String,
    },
    /// Sent by the settings UI after it wrote the list
    UpdateBlockedItems,
}

impl Message {
    pub fn from_value(value: &Value) -> Result<Self, String> {
        Message::deserialize(value).map_err(|e| format!("Unrecognized message: {}", e))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn with_count(item_count: usize) -> Self {
        Self {
            success: true,
            item_count: Some(item_count),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            item_count: None,
            error: Some(error.into()),
        }
    }
}
