// service/storage.rs
use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

/// MIME types a ticket attachment may carry.
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/csv",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Extensions rejected regardless of the declared MIME type.
const BLOCKED_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "scr", "msi", "dll", "sh", "php", "js", "jar", "vbs", "ps1",
];

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("File exceeds the {max} byte upload limit")]
    FileTooLarge { size: usize, max: usize },

    #[error("File type '{0}' is not allowed")]
    DisallowedType(String),

    #[error("File extension '.{0}' is not allowed")]
    BlockedExtension(String),

    #[error("Uploaded file has no name")]
    MissingFileName,

    #[error("Storage operation '{0}' timed out")]
    Timeout(&'static str),

    #[error("Storage error: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub content_type: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
    pub metadata: HashMap<String, String>,
}

/// Rejects bad uploads before any network call is made.
pub fn validate_upload(file: &UploadFile, max_bytes: usize) -> Result<(), StorageError> {
    if file.file_name.trim().is_empty() {
        return Err(StorageError::MissingFileName);
    }
    if file.bytes.is_empty() {
        return Err(StorageError::EmptyFile);
    }
    if file.bytes.len() > max_bytes {
        return Err(StorageError::FileTooLarge {
            size: file.bytes.len(),
            max: max_bytes,
        });
    }
    if !ALLOWED_CONTENT_TYPES.contains(&file.content_type.as_str()) {
        return Err(StorageError::DisallowedType(file.content_type.clone()));
    }
    if let Some(extension) = file.file_name.rsplit('.').next() {
        let extension = extension.to_lowercase();
        if file.file_name.contains('.') && BLOCKED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(StorageError::BlockedExtension(extension));
        }
    }
    Ok(())
}

/// Collision-resistant object key namespaced by ticket (or uploader when
/// no ticket exists yet).
pub fn object_key(file_name: &str, user_id: Uuid, ticket_id: Option<Uuid>) -> String {
    let safe_name: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    match ticket_id {
        Some(ticket_id) => format!("tickets/{}/{}-{}", ticket_id, Uuid::new_v4(), safe_name),
        None => format!("users/{}/{}-{}", user_id, Uuid::new_v4(), safe_name),
    }
}

#[derive(Debug, Clone)]
pub struct StorageService {
    client: Client,
    bucket: String,
    max_upload_bytes: usize,
    op_timeout: Duration,
    signed_url_expiry: Duration,
}

impl StorageService {
    pub fn new(client: Client, config: &Config) -> Self {
        StorageService {
            client,
            bucket: config.s3_bucket.clone(),
            max_upload_bytes: config.max_upload_bytes,
            op_timeout: Duration::from_secs(config.storage_timeout_secs),
            signed_url_expiry: Duration::from_secs(config.signed_url_expiry_secs),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    async fn timed<T, E, F>(&self, op: &'static str, fut: F) -> Result<T, StorageError>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(|e| StorageError::Upstream(format!("{}: {}", op, e))),
            Err(_) => Err(StorageError::Timeout(op)),
        }
    }

    pub async fn upload_file(
        &self,
        file: UploadFile,
        user_id: Uuid,
        ticket_id: Option<Uuid>,
    ) -> Result<StoredObject, StorageError> {
        validate_upload(&file, self.max_upload_bytes)?;

        let key = object_key(&file.file_name, user_id, ticket_id);

        self.timed(
            "put_object",
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(file.bytes.clone()))
                .content_type(&file.content_type)
                .metadata("original-name", &file.file_name)
                .metadata("uploaded-by", user_id.to_string())
                .metadata("uploaded-at", Utc::now().to_rfc3339())
                .send(),
        )
        .await?;

        Ok(StoredObject {
            key,
            content_type: file.content_type,
            file_name: file.file_name,
        })
    }

    /// Time-boxed read URL for direct client fetches.
    pub async fn get_signed_url(
        &self,
        key: &str,
        expires_in: Option<Duration>,
    ) -> Result<String, StorageError> {
        let expiry = expires_in.unwrap_or(self.signed_url_expiry);
        let presigning = PresigningConfig::expires_in(expiry)
            .map_err(|e| StorageError::Upstream(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Upstream(format!("presign: {}", e)))?;

        Ok(request.uri().to_string())
    }

    pub async fn get_file_stream(&self, key: &str) -> Result<ByteStream, StorageError> {
        let output = self
            .timed(
                "get_object",
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send(),
            )
            .await?;

        Ok(output.body)
    }

    pub async fn delete_file(&self, key: &str) -> Result<(), StorageError> {
        self.timed(
            "delete_object",
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send(),
        )
        .await?;

        Ok(())
    }

    /// Best-effort batch delete: failures are logged per key and never
    /// abort the remaining deletions.
    pub async fn delete_files(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete_file(key).await {
                tracing::warn!("failed to delete storage object {}: {}", key, e);
            }
        }
    }

    pub async fn get_file_metadata(&self, key: &str) -> Result<FileMetadata, StorageError> {
        let output = self
            .timed(
                "head_object",
                self.client
                    .head_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send(),
            )
            .await?;

        Ok(FileMetadata {
            content_type: output.content_type().map(|s| s.to_string()),
            content_length: output.content_length(),
            metadata: output.metadata().cloned().unwrap_or_default(),
        })
    }

    pub async fn file_exists(&self, key: &str) -> Result<bool, StorageError> {
        let result = tokio::time::timeout(
            self.op_timeout,
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send(),
        )
        .await
        .map_err(|_| StorageError::Timeout("head_object"))?;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|se| se.is_not_found()) == Some(true) {
                    Ok(false)
                } else {
                    Err(StorageError::Upstream(format!("head_object: {}", e)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_type: &str, len: usize) -> UploadFile {
        UploadFile {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    const MAX: usize = 5 * 1024 * 1024;

    #[test]
    fn test_accepts_ordinary_attachment() {
        assert!(validate_upload(&file("receipt.pdf", "application/pdf", 1024), MAX).is_ok());
        assert!(validate_upload(&file("photo.jpg", "image/jpeg", 1024), MAX).is_ok());
    }

    #[test]
    fn test_rejects_empty_buffer() {
        assert!(matches!(
            validate_upload(&file("a.pdf", "application/pdf", 0), MAX),
            Err(StorageError::EmptyFile)
        ));
    }

    #[test]
    fn test_rejects_oversize_file() {
        assert!(matches!(
            validate_upload(&file("a.pdf", "application/pdf", MAX + 1), MAX),
            Err(StorageError::FileTooLarge { .. })
        ));
        assert!(validate_upload(&file("a.pdf", "application/pdf", MAX), MAX).is_ok());
    }

    #[test]
    fn test_rejects_executable_mime_before_any_network_call() {
        assert!(matches!(
            validate_upload(&file("setup.bin", "application/x-msdownload", 10), MAX),
            Err(StorageError::DisallowedType(_))
        ));
    }

    #[test]
    fn test_rejects_dangerous_extension_despite_benign_mime() {
        assert!(matches!(
            validate_upload(&file("invoice.exe", "application/pdf", 10), MAX),
            Err(StorageError::BlockedExtension(_))
        ));
        assert!(matches!(
            validate_upload(&file("script.PS1", "text/plain", 10), MAX),
            Err(StorageError::BlockedExtension(_))
        ));
    }

    #[test]
    fn test_rejects_missing_file_name() {
        assert!(matches!(
            validate_upload(&file("   ", "application/pdf", 10), MAX),
            Err(StorageError::MissingFileName)
        ));
    }

    #[test]
    fn test_object_key_is_namespaced_and_sanitized() {
        let user = Uuid::new_v4();
        let ticket = Uuid::new_v4();

        let key = object_key("my receipt (1).pdf", user, Some(ticket));
        assert!(key.starts_with(&format!("tickets/{}/", ticket)));
        assert!(key.ends_with("my_receipt__1_.pdf"));
        assert!(!key.contains(' '));

        let key = object_key("a.txt", user, None);
        assert!(key.starts_with(&format!("users/{}/", user)));
    }

    #[test]
    fn test_object_keys_do_not_collide() {
        let user = Uuid::new_v4();
        let a = object_key("same.pdf", user, None);
        let b = object_key("same.pdf", user, None);
        assert_ne!(a, b);
    }
}
