// Thumbnail pipeline - fetch, decode, resize, re-encode
//
// Fetching is async; decode/resize run on the blocking pool so the runtime
// driving the caller is never stalled by image work.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::errors::FetchError;
use super::models::Thumbnail;
use super::utils::build_http_client;

pub const PREVIEW_WIDTH: u32 = 720;
pub const PREVIEW_HEIGHT: u32 = 405;

/// What a search does when the preview cannot be produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailPolicy {
    /// Finish the search without a thumbnail
    #[default]
    Degrade,
    /// Fail the whole search
    Strict,
}

impl ThumbnailPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "degrade" => Some(Self::Degrade),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// Source of raw thumbnail bytes
#[async_trait]
pub trait ThumbnailSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches thumbnails over HTTP(S), honouring the configured proxy
pub struct HttpThumbnailSource {
    client: reqwest::Client,
}

impl HttpThumbnailSource {
    pub fn new(proxy: Option<&str>, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = build_http_client(proxy, timeout_secs)
            .map_err(|e| FetchError::thumbnail(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ThumbnailSource for HttpThumbnailSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::thumbnail(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::thumbnail(e.to_string()))?;
        tracing::debug!(url, len = bytes.len(), "thumbnail fetched");
        Ok(bytes.to_vec())
    }
}

/// Decode any supported image, resize to the preview size, encode as PNG
pub fn render_preview(bytes: &[u8]) -> Result<Thumbnail, FetchError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| FetchError::thumbnail(format!("Failed to decode image: {}", e)))?;

    let resized = decoded.resize_exact(PREVIEW_WIDTH, PREVIEW_HEIGHT, FilterType::Lanczos3);

    let mut png = Cursor::new(Vec::new());
    resized
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| FetchError::thumbnail(format!("Failed to encode preview: {}", e)))?;

    Ok(Thumbnail {
        width: resized.width(),
        height: resized.height(),
        png: png.into_inner(),
    })
}

/// `render_preview` on the blocking thread pool
pub async fn render_preview_blocking(bytes: Vec<u8>) -> Result<Thumbnail, FetchError> {
    off_runtime(move || render_preview(&bytes)).await
}

async fn off_runtime<T, F>(work: F) -> Result<T, FetchError>
where
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| FetchError::thumbnail(format!("Preview task failed: {}", e)))?
}
