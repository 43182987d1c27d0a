//! Persisted provenance for one logical path.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provenance and annotations for one artifact.
///
/// Every field is optional; fields are merged in place by the store so that
/// setting one never clears another. Aliases accept the older key names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default, alias = "repo_id", skip_serializing_if = "Option::is_none")]
    pub origin_repo: Option<String>,

    #[serde(default, alias = "filename", skip_serializing_if = "Option::is_none")]
    pub origin_filename: Option<String>,

    #[serde(default, alias = "readme", skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,

    #[serde(default, alias = "preview", skip_serializing_if = "Option::is_none")]
    pub preview_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// ISO-8601 creation time, written once
    #[serde(default, alias = "added_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Keys this version does not know, kept so saving loses nothing
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataRecord {
    /// A fresh record stamped with the current time
    pub fn created_now() -> Self {
        Self {
            created_at: Some(timestamp_now()),
            ..Default::default()
        }
    }
}

/// Current UTC time as an RFC 3339 string with second precision
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_keys_are_accepted() {
        let json = r#"{
            "repo_id": "user/repo",
            "filename": "model.safetensors",
            "readme": "readmes/abc/README.md",
            "preview": "previews/x.png",
            "added_at": "2024-05-01T10:00:00"
        }"#;

        let record: MetadataRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.origin_repo.as_deref(), Some("user/repo"));
        assert_eq!(record.origin_filename.as_deref(), Some("model.safetensors"));
        assert_eq!(record.document_path.as_deref(), Some("readmes/abc/README.md"));
        assert_eq!(record.preview_path.as_deref(), Some("previews/x.png"));
        assert_eq!(record.created_at.as_deref(), Some("2024-05-01T10:00:00"));
        assert!(record.notes.is_none());
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let record = MetadataRecord {
            notes: Some("good for portraits".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"notes":"good for portraits"}"#);
    }

    #[test]
    fn test_created_now_is_iso8601() {
        let record = MetadataRecord::created_now();
        let stamp = record.created_at.unwrap();
        assert!(stamp.contains('T'));
        assert!(stamp.ends_with('Z'));
    }
}
