use serde::{Deserialize, Serialize};

/// One entry of a backend's shareable-users listing. Only `id` and `email`
/// matter for cross-instance correlation; anything else is carried untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
