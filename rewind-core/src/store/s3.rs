/*!
Amazon S3 artifact store adapter.

Backup artifacts are objects under a key prefix; object `LastModified`
stands in for the store-assigned creation timestamp. Uses the official
AWS SDK and the standard credential provider chain:
1. Environment variables (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN)
2. AWS credentials file (~/.aws/credentials)
3. IAM roles for EC2 instances
4. ECS task roles
*/

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::ArtifactStore;
use crate::artifact::{self, Artifact, UploadReceipt};
use crate::{Result, RewindError};

/// Amazon S3 artifact store
#[derive(Debug, Clone)]
pub struct S3ArtifactStore {
    client: S3Client,
    bucket: String,
}

impl S3ArtifactStore {
    /// Create a new adapter for the specified bucket
    ///
    /// # Errors
    /// Returns an error if AWS credentials are not available.
    pub async fn new(bucket: String) -> Result<Self> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;

        if sdk_config.credentials_provider().is_none() {
            return Err(RewindError::store(
                "AWS credentials not found. Please set AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, and AWS_REGION environment variables",
            ));
        }

        let client = S3Client::new(&sdk_config);
        info!(bucket = %bucket, "initialized S3 artifact store");
        Ok(Self { client, bucket })
    }

    /// Create a new adapter with explicit AWS configuration
    pub fn with_config(bucket: String, config: aws_config::SdkConfig) -> Self {
        let client = S3Client::new(&config);
        info!(bucket = %bucket, "initialized S3 artifact store with custom config");
        Self { client, bucket }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn object_key(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn list(&self, folder: &str, name_prefix: Option<&str>) -> Result<Vec<Artifact>> {
        let key_prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{folder}/")
        };

        let mut artifacts = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&key_prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| map_s3_error("list_objects_v2", e, &key_prefix))?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                let name = key.strip_prefix(&key_prefix).unwrap_or(key).to_string();
                // skip the folder marker and anything nested deeper
                if name.is_empty() || name.contains('/') {
                    continue;
                }
                if let Some(prefix) = name_prefix {
                    if !name.starts_with(prefix) {
                        continue;
                    }
                }
                let created_at = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_default();
                artifacts.push(Artifact {
                    id: key.to_string(),
                    name,
                    created_at,
                    size_bytes: object.size().unwrap_or(0).max(0) as u64,
                });
            }

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        debug!(
            bucket = %self.bucket,
            prefix = %key_prefix,
            count = artifacts.len(),
            "listed artifacts"
        );
        Ok(artifacts)
    }

    async fn upload(&self, local_path: &Path, folder: &str, name: &str) -> Result<UploadReceipt> {
        let bytes = tokio::fs::read(local_path).await?;
        let content_hash = artifact::content_hash(&bytes);
        let key = object_key(folder, name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| map_s3_error("put_object", e, &key))?;

        info!(bucket = %self.bucket, key = %key, "uploaded artifact");
        Ok(UploadReceipt {
            web_view_link: Some(format!(
                "https://{}.s3.amazonaws.com/{key}",
                self.bucket
            )),
            id: key,
            content_hash,
        })
    }

    async fn download(&self, id: &str, dest: &Path) -> Result<()> {
        debug!(bucket = %self.bucket, key = %id, "starting S3 get_object operation");

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| map_s3_error("get_object", e, id))?;

        let collected = response.body.collect().await.map_err(|e| {
            let message = format!("failed to read S3 object stream: {e}");
            error!(bucket = %self.bucket, key = %id, error = %message);
            RewindError::store(message)
        })?;
        let data: bytes::Bytes = collected.into_bytes();

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &data).await?;

        debug!(
            bucket = %self.bucket,
            key = %id,
            size = data.len(),
            "downloaded artifact from S3"
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        info!(bucket = %self.bucket, key = %id, "deleting artifact from S3");

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| map_s3_error("delete_object", e, id))?;

        Ok(())
    }
}

/// Map AWS SDK errors to RewindError with appropriate context
fn map_s3_error<E: ProvideErrorMetadata + std::fmt::Debug>(
    op: &str,
    error: aws_sdk_s3::error::SdkError<E>,
    key: &str,
) -> RewindError {
    use aws_sdk_s3::error::SdkError;

    match &error {
        SdkError::DispatchFailure(dispatch_err) => RewindError::store(format!(
            "S3 {op} request failed to dispatch: {dispatch_err:?}"
        )),
        SdkError::TimeoutError(_) => {
            RewindError::store(format!("S3 {op} request timed out (key: {key})"))
        }
        SdkError::ResponseError(response_err) => {
            RewindError::store(format!("S3 {op} response error: {response_err:?}"))
        }
        SdkError::ServiceError(service_err) => {
            if let Some(code) = service_err.err().code() {
                match code {
                    "NoSuchBucket" => RewindError::store("S3 bucket not found".to_string()),
                    "NoSuchKey" => {
                        RewindError::store(format!("S3 object '{key}' not found"))
                    }
                    "AccessDenied" | "Forbidden" => RewindError::store(
                        "Access denied to S3 (check credentials and permissions)".to_string(),
                    ),
                    "InvalidBucketName" => {
                        RewindError::store("Invalid S3 bucket name".to_string())
                    }
                    _ => RewindError::store(format!(
                        "S3 service error ({}): {}",
                        code,
                        service_err.err().message().unwrap_or("Unknown error")
                    )),
                }
            } else {
                RewindError::store(format!("S3 {op} service error: {service_err:?}"))
            }
        }
        _ => RewindError::store(format!("S3 {op} error: {error}")),
    }
}
