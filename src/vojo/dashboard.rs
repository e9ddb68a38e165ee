use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lightweight listing entry. Only `id` and `title` can be trusted here;
/// the full record is fetched per id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full dashboard record. The typed fields are the ones the migration
/// touches; everything else the source returns rides along in `extra` and is
/// transmitted unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets: Option<Vec<WidgetRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_rules: Option<Vec<AccessRule>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WidgetRecord {
    /// Names of the required fields this widget is missing or carries with an
    /// out-of-range value. An empty result means the widget is valid.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.as_deref().unwrap_or("").is_empty() {
            missing.push("id");
        }
        if self.width.unwrap_or(0) < 1 {
            missing.push("width");
        }
        if self.height.unwrap_or(0) < 1 {
            missing.push("height");
        }
        if self.config.is_none() {
            missing.push("config");
        }
        missing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
}

impl AccessRule {
    /// The one access-rule shape the target API persists reliably: a global
    /// read-write rule with an empty related id.
    pub fn global_read_write() -> AccessRule {
        AccessRule {
            access_type: Some("READ_WRITE".to_string()),
            relation_type: Some("GLOBAL".to_string()),
            related_id: Some(String::new()),
        }
    }
}
