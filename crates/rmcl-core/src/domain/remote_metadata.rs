use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One element of the JSON array document-storage endpoints accept and
/// return. Field names and casing match the wire protocol exactly
/// (`VissibleName` is the remote's own spelling, not a typo introduced here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMetadata {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Version")]
    pub version: i64,

    #[serde(rename = "Type")]
    pub item_type: RemoteItemType,

    #[serde(rename = "VissibleName")]
    pub visible_name: String,

    #[serde(rename = "Parent")]
    pub parent: String,

    #[serde(rename = "ModifiedClient")]
    pub modified_client: Option<DateTime<Utc>>,

    #[serde(rename = "BlobURLGet", default)]
    pub blob_url_get: Option<String>,

    #[serde(rename = "BlobURLGetExpires", default)]
    pub blob_url_get_expires: Option<DateTime<Utc>>,

    #[serde(rename = "BlobURLPut", default)]
    pub blob_url_put: Option<String>,

    #[serde(rename = "Success", default = "default_success")]
    pub success: bool,

    #[serde(rename = "Message", default)]
    pub message: String,

    /// Fields neither read nor written by this implementation, preserved so
    /// a round-tripped metadata object is never silently lossy.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_success() -> bool {
    true
}

/// The remote's own type discriminant, distinct from (but related to) the
/// richer `Item` enum built from it: a `DocumentType` becomes a `Document`,
/// a `CollectionType` becomes a `Folder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteItemType {
    DocumentType,
    CollectionType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_document_entry() {
        let json = r#"{
            "ID": "abc-123",
            "Version": 3,
            "Type": "DocumentType",
            "VissibleName": "My Notes",
            "Parent": "",
            "ModifiedClient": "2026-01-02T03:04:05Z"
        }"#;
        let meta: RemoteMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.id, "abc-123");
        assert_eq!(meta.version, 3);
        assert_eq!(meta.item_type, RemoteItemType::DocumentType);
        assert!(meta.success);
        assert!(meta.blob_url_get.is_none());
    }

    #[test]
    fn preserves_unknown_fields_via_flatten() {
        let json = r#"{
            "ID": "abc",
            "Version": 1,
            "Type": "CollectionType",
            "VissibleName": "Folder",
            "Parent": "",
            "ModifiedClient": null,
            "SomeFutureField": 42
        }"#;
        let meta: RemoteMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(
            meta.extra.get("SomeFutureField"),
            Some(&serde_json::json!(42))
        );
        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["SomeFutureField"], serde_json::json!(42));
    }
}
