//! Dashboard entity records as returned by the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry of the features catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A review panel and its roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// A scheduled panel session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub panel_id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_deserialize_with_defaults() {
        let json = r#"{"id":"f1","name":"Dark mode","updatedAt":"2026-01-02T03:04:05Z"}"#;
        let feature: Feature = serde_json::from_str(json).unwrap();
        assert_eq!(feature.name, "Dark mode");
        assert!(feature.description.is_none());
        assert!(!feature.enabled);
    }

    #[test]
    fn test_session_uses_camel_case() {
        let json = r#"{"id":"s1","panelId":"p1","title":"Kickoff","startsAt":"2026-03-01T09:00:00Z"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.panel_id, "p1");
        assert!(session.ends_at.is_none());

        let back = serde_json::to_value(&session).unwrap();
        assert_eq!(back["panelId"], "p1");
    }
}
