use std::time::Duration;

use google_cloud_storage::client::Client as GcsClient;
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use thiserror::Error;

// Blob-store round-trips are hard-failed past this rather than holding the
// request open indefinitely.
const BLOB_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload of {key} failed: {message}")]
    Upload { key: String, message: String },
    #[error("delete of {key} failed: {message}")]
    Delete { key: String, message: String },
    #[error("{operation} of {key} timed out")]
    Timeout { operation: &'static str, key: String },
}

/// Thin client for the video bucket: upload without overwrite, public URL,
/// delete by key. All bytes live here; the database only holds keys and URLs.
#[derive(Clone)]
pub struct BlobStore {
    client: GcsClient,
    bucket: String,
}

impl BlobStore {
    pub fn new(client: GcsClient, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload bytes under `key`, refusing to overwrite an existing object
    /// (generation precondition 0 = "only if absent").
    pub async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let upload_type = UploadType::Simple(Media {
            name: key.to_string().into(),
            content_type: content_type.to_string().into(),
            content_length: Some(data.len() as u64),
        });

        let request = UploadObjectRequest {
            bucket: self.bucket.clone(),
            if_generation_match: Some(0),
            ..Default::default()
        };

        let upload = self.client.upload_object(&request, data, &upload_type);
        match tokio::time::timeout(BLOB_CALL_TIMEOUT, upload).await {
            Ok(Ok(_object)) => Ok(()),
            Ok(Err(e)) => Err(StorageError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(StorageError::Timeout {
                operation: "upload",
                key: key.to_string(),
            }),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("https://storage.googleapis.com/{}/{}", self.bucket, key)
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let request = DeleteObjectRequest {
            bucket: self.bucket.clone(),
            object: key.to_string(),
            ..Default::default()
        };

        let delete = self.client.delete_object(&request);
        match tokio::time::timeout(BLOB_CALL_TIMEOUT, delete).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(StorageError::Delete {
                key: key.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(StorageError::Timeout {
                operation: "delete",
                key: key.to_string(),
            }),
        }
    }
}

/// Build the storage key for an upload: namespaced by owner, qualified by a
/// millisecond timestamp so concurrent uploads of the same filename cannot
/// collide.
pub fn build_object_key(user_id: i32, sanitized_name: &str, timestamp_millis: i64) -> String {
    let name = if sanitized_name.is_empty() {
        "video"
    } else {
        sanitized_name
    };
    format!("{}/{}_{}", user_id, timestamp_millis, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_is_namespaced_and_timestamped() {
        let key = build_object_key(42, "Squat_Day.mp4", 1_754_300_000_000);
        assert_eq!(key, "42/1754300000000_Squat_Day.mp4");
        assert!(key.starts_with("42/"));
    }

    #[test]
    fn object_key_falls_back_when_name_is_empty() {
        let key = build_object_key(7, "", 1_754_300_000_000);
        assert_eq!(key, "7/1754300000000_video");
    }

    #[test]
    fn storage_errors_carry_the_key() {
        let err = StorageError::Upload {
            key: "42/x.mp4".into(),
            message: "boom".into(),
        };
        assert!(err.to_string().contains("42/x.mp4"));
    }
}
