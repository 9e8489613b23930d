use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

const AMZ_META_PREFIX: &str = "x-amz-meta-";

/// A finalized object reported by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadEvent {
    pub bucket: String,
    #[serde(alias = "name", alias = "key")]
    pub path: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl UploadEvent {
    #[cfg(test)]
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
            metadata: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Looks up a metadata value by any of `aliases`, comparing normalized keys.
    /// Blank values count as absent.
    pub fn metadata_value(&self, aliases: &[&str]) -> Option<&str> {
        let wanted: Vec<String> = aliases.iter().map(|a| normalize_metadata_key(a)).collect();
        self.metadata
            .iter()
            .find(|(k, _)| wanted.contains(&normalize_metadata_key(k)))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Id of the pre-existing record this upload belongs to, set by the uploading client.
    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata_value(&["resumeId"])
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.metadata_value(&["ownerId", "userId"])
    }

    pub fn category_id(&self) -> Option<&str> {
        self.metadata_value(&["categoryId", "category"])
    }

    pub fn file_url(&self) -> Option<&str> {
        self.metadata_value(&["fileUrl"])
    }
}

/// `X-Amz-Meta-Resume-Id`, `resumeId` and `resume_id` all normalize to `resumeid`.
pub fn normalize_metadata_key(key: &str) -> String {
    let lower = key.trim().to_ascii_lowercase();
    let bare = lower.strip_prefix(AMZ_META_PREFIX).unwrap_or(&lower);
    bare.chars().filter(|c| *c != '-' && *c != '_').collect()
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("object key '{0}' is not valid URL-encoded UTF-8")]
    BadKey(String),
}

/// S3 / MinIO bucket-notification envelope.
#[derive(Debug, Deserialize)]
pub struct BucketNotification {
    #[serde(rename = "Records")]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: String,
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct S3Object {
    pub key: String,
    #[serde(rename = "userMetadata", default)]
    pub user_metadata: HashMap<String, String>,
}

impl NotificationRecord {
    /// AWS sends `ObjectCreated:Put`, MinIO `s3:ObjectCreated:Put`. A missing name is accepted.
    fn is_object_created(&self) -> bool {
        self.event_name.is_empty()
            || self
                .event_name
                .trim_start_matches("s3:")
                .starts_with("ObjectCreated:")
    }
}

/// Body accepted by the object-finalized webhook.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Notification(BucketNotification),
    Single(UploadEvent),
}

impl EventPayload {
    /// Flattens the payload into upload events. Non-creation notification records are dropped.
    pub fn into_events(self) -> Result<Vec<UploadEvent>, EventError> {
        match self {
            EventPayload::Single(event) => Ok(vec![event]),
            EventPayload::Notification(notification) => notification
                .records
                .into_iter()
                .filter(NotificationRecord::is_object_created)
                .map(|record| -> Result<UploadEvent, EventError> {
                    Ok(UploadEvent {
                        bucket: record.s3.bucket.name,
                        path: decode_object_key(&record.s3.object.key)?,
                        metadata: record.s3.object.user_metadata,
                    })
                })
                .collect(),
        }
    }
}

/// Notification keys are form-encoded: `+` is a space, everything else percent-escaped.
pub fn decode_object_key(raw: &str) -> Result<String, EventError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| EventError::BadKey(raw.to_string()))
}
