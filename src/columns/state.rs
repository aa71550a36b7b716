use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored per-grid column document.
///
/// A document whose `version` differs from the version the grid expects is
/// ignored outright; there is no migration path between versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedColumnState {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub columns: Vec<PersistedColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedColumn {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl PersistedColumnState {
    pub fn column(&self, key: &str) -> Option<&PersistedColumn> {
        self.columns.iter().find(|column| column.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_sparse_documents() {
        let state: PersistedColumnState = serde_json::from_value(json!({
            "version": 3,
            "updatedAt": "2026-01-02T03:04:05Z",
            "columns": [{"key": "name"}, {"key": "email", "hidden": true, "order": 0, "width": 220.0}]
        }))
        .unwrap();
        assert_eq!(state.version, 3);
        assert_eq!(state.column("name").and_then(|c| c.hidden), None);
        assert_eq!(state.column("email").and_then(|c| c.width), Some(220.0));
        assert!(state.column("missing").is_none());
    }

    #[test]
    fn encodes_camel_case_timestamp() {
        let state = PersistedColumnState {
            version: 1,
            updated_at: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
            columns: vec![],
        };
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("updatedAt").is_some());
    }
}
