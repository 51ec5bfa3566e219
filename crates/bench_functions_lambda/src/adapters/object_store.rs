use std::fs::File;
use std::io::Write;
use std::path::Path;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use thiserror::Error;

use crate::adapters::bridge;
use crate::runtime::config::BenchConfig;

pub trait BlobStore {
    /// Fetches `remote_name` into `local_path`, replacing any file already there.
    fn download(&self, remote_name: &str, local_path: &Path) -> Result<(), TransferError>;

    /// Pushes `local_path` to `remote_name`, overwriting an existing object.
    fn upload(&self, local_path: &Path, remote_name: &str) -> Result<(), TransferError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOperation {
    Download,
    Upload,
}

impl std::fmt::Display for TransferOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Download => f.write_str("download"),
            Self::Upload => f.write_str("upload"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} of '{remote_name}' failed: {message}")]
pub struct TransferError {
    pub operation: TransferOperation,
    pub remote_name: String,
    pub message: String,
}

impl TransferError {
    pub fn new(
        operation: TransferOperation,
        remote_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            remote_name: remote_name.into(),
            message: message.into(),
        }
    }
}

/// Handle on one bucket of an S3-compatible object store.
///
/// Google Cloud Storage is reached through its XML interoperability endpoint;
/// any other S3-compatible endpoint works the same way.
#[derive(Debug, Clone)]
pub struct CloudStorageGateway {
    project_id: String,
    bucket: String,
    chunk_size: Option<u64>,
    s3_client: aws_sdk_s3::Client,
}

impl CloudStorageGateway {
    /// Builds the client only; no request is sent until the first transfer.
    pub async fn connect(config: &BenchConfig) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.storage_region.clone()))
            .endpoint_url(config.storage_endpoint.clone())
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            project_id: config.project_id.clone(),
            bucket: config.bucket.clone(),
            chunk_size: None,
            s3_client: aws_sdk_s3::Client::from_conf(s3_config),
        }
    }

    /// Splits transfers into ranged reads and multipart writes of `chunk_size` bytes.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size).filter(|size| *size > 0);
        self
    }

    /// Project the handle belongs to. S3-interop requests address the bucket
    /// alone, so the project only identifies the handle in log events.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn download_object(&self, key: &str, local_path: &Path) -> Result<(), String> {
        let mut file = File::create(local_path)
            .map_err(|error| format!("failed to create '{}': {error}", local_path.display()))?;

        let Some(chunk_size) = self.chunk_size else {
            return self.copy_range(key, None, &mut file).await;
        };

        let head = self
            .s3_client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| format!("failed to stat object: {}", DisplayErrorContext(&error)))?;
        let total = head
            .content_length()
            .and_then(|length| u64::try_from(length).ok())
            .unwrap_or(0);

        let mut start = 0u64;
        while start < total {
            let end = start.saturating_add(chunk_size).min(total) - 1;
            self.copy_range(key, Some(format!("bytes={start}-{end}")), &mut file)
                .await?;
            start = end + 1;
        }
        Ok(())
    }

    async fn copy_range(
        &self,
        key: &str,
        range: Option<String>,
        file: &mut File,
    ) -> Result<(), String> {
        let output = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range)
            .send()
            .await
            .map_err(|error| format!("failed to read object: {}", DisplayErrorContext(&error)))?;

        let mut body = output.body;
        while let Some(bytes) = body
            .try_next()
            .await
            .map_err(|error| format!("object stream interrupted: {error}"))?
        {
            file.write_all(&bytes)
                .map_err(|error| format!("failed to write local file: {error}"))?;
        }
        file.flush()
            .map_err(|error| format!("failed to flush local file: {error}"))
    }

    async fn upload_object(&self, local_path: &Path, key: &str) -> Result<(), String> {
        let file_len = std::fs::metadata(local_path)
            .map_err(|error| format!("failed to stat '{}': {error}", local_path.display()))?
            .len();

        match self.chunk_size {
            Some(part_size) if file_len > part_size => {
                self.upload_multipart(local_path, key, file_len, part_size)
                    .await
            }
            _ => {
                let body = ByteStream::from_path(local_path)
                    .await
                    .map_err(|error| format!("failed to open local file: {error}"))?;
                self.s3_client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .body(body)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| {
                        format!("failed to write object: {}", DisplayErrorContext(&error))
                    })
            }
        }
    }

    async fn upload_multipart(
        &self,
        local_path: &Path,
        key: &str,
        file_len: u64,
        part_size: u64,
    ) -> Result<(), String> {
        let created = self
            .s3_client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| {
                format!(
                    "failed to start multipart upload: {}",
                    DisplayErrorContext(&error)
                )
            })?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| "multipart upload response carried no upload id".to_string())?
            .to_string();

        match self
            .upload_parts(local_path, key, &upload_id, file_len, part_size)
            .await
        {
            Ok(parts) => self
                .s3_client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(parts))
                        .build(),
                )
                .send()
                .await
                .map(|_| ())
                .map_err(|error| {
                    format!(
                        "failed to complete multipart upload: {}",
                        DisplayErrorContext(&error)
                    )
                }),
            Err(message) => {
                let _ = self
                    .s3_client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                Err(message)
            }
        }
    }

    async fn upload_parts(
        &self,
        local_path: &Path,
        key: &str,
        upload_id: &str,
        file_len: u64,
        part_size: u64,
    ) -> Result<Vec<CompletedPart>, String> {
        let mut parts = Vec::new();
        let mut offset = 0u64;
        let mut part_number = 1i32;

        while offset < file_len {
            let length = part_size.min(file_len - offset);
            let body = ByteStream::read_from()
                .path(local_path)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await
                .map_err(|error| format!("failed to read part {part_number}: {error}"))?;

            let uploaded = self
                .s3_client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to upload part {part_number}: {}",
                        DisplayErrorContext(&error)
                    )
                })?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            offset += length;
            part_number += 1;
        }

        Ok(parts)
    }
}

impl BlobStore for CloudStorageGateway {
    fn download(&self, remote_name: &str, local_path: &Path) -> Result<(), TransferError> {
        bridge::block_on(self.download_object(remote_name, local_path))
            .and_then(|result| result)
            .map_err(|message| {
                TransferError::new(TransferOperation::Download, remote_name, message)
            })
    }

    fn upload(&self, local_path: &Path, remote_name: &str) -> Result<(), TransferError> {
        bridge::block_on(self.upload_object(local_path, remote_name))
            .and_then(|result| result)
            .map_err(|message| TransferError::new(TransferOperation::Upload, remote_name, message))
    }
}
