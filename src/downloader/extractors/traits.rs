// Extractor trait and boundary types

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::downloader::catalog::FormatCatalog;
use crate::downloader::errors::FetchError;
use crate::downloader::models::{MediaReference, RenditionDescriptor, ResolvedMedia};

const DEFAULT_EXT: &str = "mp4";
const DEFAULT_NOTE: &str = "N/A";
const DEFAULT_TITLE: &str = "video";

/// Configuration for the extractor process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to cookies.txt file
    pub cookies_path: Option<String>,
    /// Browser to read cookies from (e.g. "chrome")
    pub cookies_from_browser: Option<String>,
    /// Timeout in seconds for metadata resolution
    pub timeout_seconds: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            cookies_path: None,
            cookies_from_browser: None,
            timeout_seconds: 30,
        }
    }
}

impl ExtractorConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<String>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_cookies_from_browser(mut self, browser: Option<String>) -> Self {
        self.cookies_from_browser = browser;
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Format entry as reported by the extractor; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    #[serde(rename = "format_note")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize_approx: Option<u64>,
}

/// Sizes are sometimes reported as floats or null
fn lenient_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }))
}

/// A codec counts as present unless the extractor says "none"
fn codec_present(codec: &Option<String>) -> bool {
    codec.as_deref() != Some("none")
}

impl RawFormat {
    /// Typed descriptor, or `None` when the entry has no usable id
    pub fn into_descriptor(self) -> Option<RenditionDescriptor> {
        let format_id = self.format_id.filter(|id| !id.trim().is_empty())?;
        Some(RenditionDescriptor {
            has_video: codec_present(&self.vcodec),
            has_audio: codec_present(&self.acodec),
            container_ext: self
                .ext
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EXT.to_string()),
            note: self
                .note
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_NOTE.to_string()),
            size_bytes: self.filesize.or(self.filesize_approx),
            format_id,
        })
    }
}

/// Metadata returned by `Extractor::resolve`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMedia {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

impl RawMedia {
    /// Map to the typed, catalog-ordered shape used by the tasks
    pub fn into_resolved(self, reference: MediaReference) -> ResolvedMedia {
        let mut descriptors = Vec::with_capacity(self.formats.len());
        for raw in self.formats {
            match raw.into_descriptor() {
                Some(d) => descriptors.push(d),
                None => tracing::warn!(reference = %reference, "skipping format without format_id"),
            }
        }

        ResolvedMedia {
            reference,
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            thumbnail_url: self.thumbnail.filter(|t| !t.is_empty()),
            renditions: FormatCatalog::build(descriptors),
        }
    }
}

/// Chunk callback: (transferred bytes, total bytes if known)
pub type ChunkCallback<'a> = dyn FnMut(u64, Option<u64>) + Send + 'a;

/// External capability that resolves references and streams renditions
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    async fn resolve(&self, reference: &MediaReference) -> Result<RawMedia, FetchError>;

    /// Write the rendition into the existing file at `destination`, reporting
    /// at least once per chunk. The file is reserved by the caller: write it in
    /// place, never remove or recreate it. Dropping the returned future must
    /// stop the transfer.
    async fn stream(
        &self,
        reference: &MediaReference,
        format_id: &str,
        destination: &Path,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<(), FetchError>;
}
