// Common data models for search and download tasks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::errors::{ErrorKind, FetchError};
use super::utils::format_size;

/// Opaque locator of remote content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaReference(String);

impl MediaReference {
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(FetchError::InvalidReference(
                "Please enter a YouTube URL".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which streams a rendition carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenditionKind {
    VideoAudio,
    AudioOnly,
    VideoOnly,
    /// Neither audio nor video (storyboards and the like)
    Unplayable,
}

/// One downloadable variant of a media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionDescriptor {
    pub format_id: String,
    pub container_ext: String,
    pub has_video: bool,
    pub has_audio: bool,
    pub note: String,
    pub size_bytes: Option<u64>,
}

impl RenditionDescriptor {
    pub fn kind(&self) -> RenditionKind {
        match (self.has_video, self.has_audio) {
            (true, true) => RenditionKind::VideoAudio,
            (false, true) => RenditionKind::AudioOnly,
            (true, false) => RenditionKind::VideoOnly,
            (false, false) => RenditionKind::Unplayable,
        }
    }

    /// Selector label, e.g. "Video+Audio - mp4 - 360p (5.0 MB)"
    pub fn label(&self) -> String {
        let prefix = match self.kind() {
            RenditionKind::VideoAudio => "Video+Audio",
            RenditionKind::AudioOnly => "Audio Only",
            RenditionKind::VideoOnly => "Video Only",
            RenditionKind::Unplayable => "Other",
        };
        let mut label = format!("{} - {} - {}", prefix, self.container_ext, self.note);
        if let Some(size) = self.size_bytes {
            label.push_str(&format!(" ({})", format_size(size as f64)));
        }
        label
    }
}

/// Result of resolving a reference. Renditions are catalog-ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub reference: MediaReference,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub renditions: Vec<RenditionDescriptor>,
}

impl ResolvedMedia {
    pub fn find(&self, format_id: &str) -> Option<&RenditionDescriptor> {
        self.renditions.iter().find(|r| r.format_id == format_id)
    }

    pub fn format_ids(&self) -> Vec<&str> {
        self.renditions.iter().map(|r| r.format_id.as_str()).collect()
    }
}

/// In-memory preview image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    /// PNG-encoded bytes
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub media: ResolvedMedia,
    pub thumbnail: Option<Thumbnail>,
}

/// A caller's selection, validated against the media it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub reference: MediaReference,
    pub format_id: String,
    pub destination: PathBuf,
}

impl DownloadRequest {
    pub fn new(
        reference: MediaReference,
        format_id: impl Into<String>,
        destination: impl AsRef<Path>,
    ) -> Self {
        Self {
            reference,
            format_id: format_id.into(),
            destination: destination.as_ref().to_path_buf(),
        }
    }

    /// Selected rendition, or `InvalidFormat` for an unknown or stale selection
    pub fn validate<'m>(
        &self,
        media: &'m ResolvedMedia,
    ) -> Result<&'m RenditionDescriptor, FetchError> {
        if media.reference != self.reference {
            return Err(FetchError::InvalidFormat {
                format_id: self.format_id.clone(),
            });
        }
        media.find(&self.format_id).ok_or_else(|| FetchError::InvalidFormat {
            format_id: self.format_id.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSample {
    /// 0.0..=1.0, `None` when the total is unknown
    pub fraction: Option<f64>,
    pub transferred_bytes: u64,
    pub total_bytes: Option<u64>,
    pub speed_bytes_per_sec: Option<f64>,
    pub eta_seconds: Option<u64>,
}

impl ProgressSample {
    /// Coarse sample for phases without a byte stream
    pub fn checkpoint(fraction: f64) -> Self {
        Self {
            fraction: Some(fraction.clamp(0.0, 1.0)),
            ..Self::default()
        }
    }

    pub fn percent(&self) -> Option<f64> {
        self.fraction.map(|f| f * 100.0)
    }
}

/// Terminal state of a download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Completed { final_path: PathBuf },
    Failed { error_kind: ErrorKind, message: String },
}

impl From<&Result<PathBuf, FetchError>> for DownloadOutcome {
    fn from(result: &Result<PathBuf, FetchError>) -> Self {
        match result {
            Ok(path) => Self::Completed {
                final_path: path.clone(),
            },
            Err(e) => Self::Failed {
                error_kind: e.kind(),
                message: e.message(),
            },
        }
    }
}
