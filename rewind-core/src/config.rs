//! Configuration module for artifact store backend selection and settings
//!
//! This module provides configuration structures and enums for selecting
//! between different artifact store backends (local directory, S3) and
//! configuring their parameters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Enumeration of supported artifact store backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    /// Local directory storage
    Local,
    /// Amazon S3 cloud storage
    S3,
}

/// Configuration structure for the artifact store holding backup artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// The store backend to use
    pub backend: StoreBackend,
    /// S3 bucket name (required for the S3 backend)
    pub s3_bucket: Option<String>,
    /// Root directory for local storage (optional, defaults to current directory)
    pub local_root: Option<PathBuf>,
    /// Folder (key prefix for S3) that holds the backup artifacts
    pub folder: String,
}

impl StoreConfig {
    /// Create a default configuration for local directory storage
    pub fn default_local() -> Self {
        StoreConfig {
            backend: StoreBackend::Local,
            s3_bucket: None,
            local_root: None,
            folder: "backups".to_string(),
        }
    }

    /// Create a local configuration rooted at the given directory
    pub fn local_with_root<P: Into<PathBuf>>(root: P) -> Self {
        StoreConfig {
            local_root: Some(root.into()),
            ..Self::default_local()
        }
    }

    /// Create an S3 configuration with the specified bucket
    pub fn s3_with_bucket(bucket: String) -> Self {
        StoreConfig {
            backend: StoreBackend::S3,
            s3_bucket: Some(bucket),
            local_root: None,
            folder: "backups".to_string(),
        }
    }

    /// Parse a store URI and create the appropriate configuration
    ///
    /// Supports formats:
    /// - `s3://bucket-name/folder` for S3 storage
    /// - `/local/path` or `./relative/path` for local storage (the path
    ///   becomes the store root; the backup folder keeps its default)
    pub fn from_uri(uri: &str) -> crate::Result<StoreConfig> {
        if let Some(s3_part) = uri.strip_prefix("s3://") {
            let parts: Vec<&str> = s3_part.splitn(2, '/').collect();
            if parts.is_empty() || parts[0].is_empty() {
                return Err(crate::RewindError::validation(
                    "Invalid S3 URI: missing bucket name",
                ));
            }

            let mut config = StoreConfig::s3_with_bucket(parts[0].to_string());
            if let Some(folder) = parts.get(1) {
                if !folder.is_empty() {
                    config.folder = folder.to_string();
                }
            }
            Ok(config)
        } else {
            Ok(StoreConfig::local_with_root(uri))
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        match self.backend {
            StoreBackend::S3 => {
                if self.s3_bucket.as_deref().map_or(true, str::is_empty) {
                    return Err(crate::RewindError::validation(
                        "S3 backend requires a valid bucket name",
                    ));
                }
            }
            StoreBackend::Local => {}
        }
        if self.folder.contains("..") {
            return Err(crate::RewindError::validation(
                "backup folder must not contain path traversal",
            ));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::default_local()
    }
}
