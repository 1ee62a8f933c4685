//! Product image storage.
//!
//! Images are written to blob storage under `products/{filename}` and
//! referenced from the product record by their download URL. Two files with
//! the same name share a path, so the later upload replaces the earlier blob.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::StorageConfig;

/// Storage prefix for product images.
const PRODUCT_IMAGE_PREFIX: &str = "products/";

/// Errors that can occur when uploading an image.
#[derive(Debug, Error)]
pub enum MediaError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Storage returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Upload response carried no download token.
    #[error("No download token returned for {0}")]
    MissingDownloadToken(String),

    /// Local file could not be read.
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Download URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// An image picked for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Original file name; also the last segment of the storage path.
    pub name: String,
    /// MIME type sent with the upload.
    pub content_type: String,
    pub data: Arc<[u8]>,
}

impl ImageFile {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Read an image from disk, inferring its type from the extension.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Read` if the file cannot be read.
    pub async fn from_path(path: &Path) -> Result<Self, MediaError> {
        let data = tokio::fs::read(path).await.map_err(|source| MediaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map_or_else(|| "image".to_owned(), |n| n.to_string_lossy().into_owned());
        let content_type = content_type_for(&name);
        Ok(Self::new(name, content_type, data))
    }

    /// Storage path for this image.
    #[must_use]
    pub fn storage_path(&self) -> String {
        format!("{PRODUCT_IMAGE_PREFIX}{}", self.name)
    }
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// MIME type for an image file name.
fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Stores product images and resolves them to download URLs.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload one image, returning its download URL once it is available.
    async fn upload(&self, file: &ImageFile) -> Result<String, MediaError>;
}

/// Blob storage REST client.
#[derive(Clone)]
pub struct StorageClient {
    client: reqwest::Client,
    base_url: Url,
    bucket: String,
    auth_token: Option<SecretString>,
}

/// Object metadata returned by a successful upload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    /// Comma-separated access tokens.
    #[serde(default)]
    download_tokens: Option<String>,
}

impl StorageClient {
    /// Create a new storage client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorageConfig, user_agent: &str) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: config.url.clone(),
            bucket: config.bucket.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn objects_url(&self) -> Result<Url, MediaError> {
        let bucket = urlencoding::encode(&self.bucket);
        Ok(self.base_url.join(&format!("v0/b/{bucket}/o"))?)
    }

    /// Public download URL for an uploaded object.
    fn download_url(&self, object_name: &str, token: &str) -> Result<Url, MediaError> {
        let bucket = urlencoding::encode(&self.bucket);
        let object = urlencoding::encode(object_name);
        let mut url = self.base_url.join(&format!("v0/b/{bucket}/o/{object}"))?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", token);
        Ok(url)
    }
}

#[async_trait]
impl MediaUploader for StorageClient {
    #[instrument(skip(self, file), fields(name = %file.name, bytes = file.data.len()))]
    async fn upload(&self, file: &ImageFile) -> Result<String, MediaError> {
        let mut url = self.objects_url()?;
        url.query_pairs_mut().append_pair("name", &file.storage_path());

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, &file.content_type)
            .body(file.data.to_vec());
        if let Some(token) = &self.auth_token {
            request = request.header(AUTHORIZATION, format!("Firebase {}", token.expose_secret()));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MediaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let metadata: ObjectMetadata = response.json().await?;
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MediaError::MissingDownloadToken(metadata.name.clone()))?;

        let download_url = self.download_url(&metadata.name, token)?;
        tracing::debug!(object = %metadata.name, "Image uploaded");
        Ok(download_url.into())
    }
}

/// Blob storage held in memory, serving `memory://` URLs.
#[derive(Debug, Clone, Default)]
pub struct MemoryMediaStore {
    objects: Arc<Mutex<BTreeMap<String, ImageFile>>>,
}

impl MemoryMediaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored object at a storage path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<ImageFile> {
        self.objects.lock().get(path).cloned()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

#[async_trait]
impl MediaUploader for MemoryMediaStore {
    async fn upload(&self, file: &ImageFile) -> Result<String, MediaError> {
        let path = file.storage_path();
        self.objects.lock().insert(path.clone(), file.clone());
        Ok(format!("memory://{path}"))
    }
}
