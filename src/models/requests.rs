//! Request DTOs for the dashboard API
//!
//! Bodies of create/update mutations.

use serde::{Deserialize, Serialize};

/// Maximum accepted length of a display name
pub const MAX_NAME_LENGTH: usize = 200;

fn validate_name(field: &str, value: &str) -> Option<String> {
    if value.trim().is_empty() {
        return Some(format!("{field} cannot be empty"));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Some(format!(
            "{field} exceeds maximum length of {MAX_NAME_LENGTH} characters"
        ));
    }
    None
}

/// Body of POST /api/features
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeature {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

impl NewFeature {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_name("Feature name", &self.name)
    }
}

/// Body of PUT /api/features/{id}; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl FeatureUpdate {
    pub fn validate(&self) -> Option<String> {
        self.name
            .as_deref()
            .and_then(|name| validate_name("Feature name", name))
    }
}

/// Body of POST /api/panels and PUT /api/panels/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelInput {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl PanelInput {
    pub fn validate(&self) -> Option<String> {
        validate_name("Panel name", &self.name)
    }
}

/// Body of POST /api/sessions and PUT /api/sessions/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInput {
    pub panel_id: String,
    pub title: String,
    pub starts_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SessionInput {
    pub fn validate(&self) -> Option<String> {
        if self.panel_id.trim().is_empty() {
            return Some("Session panel cannot be empty".to_string());
        }
        if let Some(ends_at) = self.ends_at {
            if ends_at < self.starts_at {
                return Some("Session cannot end before it starts".to_string());
            }
        }
        validate_name("Session title", &self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_new_feature_validate() {
        let mut feature = NewFeature {
            name: "Dark mode".to_string(),
            description: None,
            category: None,
            enabled: true,
        };
        assert!(feature.validate().is_none());

        feature.name = "   ".to_string();
        assert!(feature.validate().is_some());

        feature.name = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(feature.validate().is_some());
    }

    #[test]
    fn test_feature_update_skips_absent_fields() {
        let update = FeatureUpdate {
            enabled: Some(false),
            ..FeatureUpdate::default()
        };
        assert!(update.validate().is_none());
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"enabled":false}"#);
    }

    #[test]
    fn test_session_validate_time_range() {
        let now = Utc::now();
        let session = SessionInput {
            panel_id: "p1".to_string(),
            title: "Review".to_string(),
            starts_at: now,
            ends_at: Some(now - Duration::hours(1)),
        };
        assert!(session.validate().is_some());
    }
}
