//! Backend registration messages

use crate::types::BackendRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to register a search backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBackend {
    pub label: String,
    pub provider: String,
    /// Serialized credential document; validated when a battle runs
    #[serde(default)]
    pub credentials: Option<String>,
}

/// Backend listing entry; credentials are never echoed back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendView {
    pub id: Uuid,
    pub label: String,
    pub provider: String,
    pub has_credentials: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&BackendRecord> for BackendView {
    fn from(record: &BackendRecord) -> Self {
        Self {
            id: record.id,
            label: record.label.clone(),
            provider: record.provider.clone(),
            has_credentials: record
                .credentials
                .as_deref()
                .map(|c| !c.trim().is_empty())
                .unwrap_or(false),
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_hides_credentials() {
        let record = BackendRecord::new("prod", "algolia", Some("{\"version\":1}".into()));
        let view = BackendView::from(&record);
        let encoded = serde_json::to_value(&view).unwrap();
        assert!(encoded.get("credentials").is_none());
        assert_eq!(encoded["hasCredentials"], true);
    }

    #[test]
    fn test_blank_credentials_are_reported_absent() {
        let record = BackendRecord::new("prod", "algolia", Some("   ".into()));
        assert!(!BackendView::from(&record).has_credentials);
    }
}
