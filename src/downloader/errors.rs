// Error types for search and download tasks

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::extractors::{diagnose_error, BlockingReason};

/// Coarse error category handed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidReference,
    Resolution,
    InvalidFormat,
    Filesystem,
    Transfer,
    Thumbnail,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The caller supplied an empty or malformed URL
    #[error("Invalid URL: {0}")]
    InvalidReference(String),

    /// Extractor could not resolve the reference (bad URL, private video, network)
    #[error("{message}")]
    Resolution {
        message: String,
        reason: Option<BlockingReason>,
    },

    /// Requested format is not part of the resolved rendition set
    #[error("Selected format not found: {format_id}")]
    InvalidFormat { format_id: String },

    /// Destination directory or file could not be created
    #[error("{message}")]
    Filesystem { message: String },

    /// Byte stream interrupted mid-download
    #[error("{message}")]
    Transfer { message: String },

    /// Preview image could not be fetched or decoded
    #[error("Thumbnail unavailable: {message}")]
    Thumbnail { message: String },

    #[error("Download cancelled")]
    Cancelled,
}

const UNKNOWN_ERROR: &str = "Unknown error";

fn non_empty(message: impl Into<String>) -> String {
    let message = message.into();
    let trimmed = message.trim();
    if trimmed.is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        trimmed.to_string()
    }
}

impl FetchError {
    /// Resolution failure from raw extractor output, classified by diagnostics
    pub fn resolution(stderr: impl Into<String>) -> Self {
        let message = non_empty(stderr);
        let reason = diagnose_error(&message);
        Self::Resolution { message, reason }
    }

    pub fn filesystem(context: &str, err: std::io::Error) -> Self {
        Self::Filesystem {
            message: non_empty(format!("{}: {}", context, err)),
        }
    }

    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer {
            message: non_empty(message),
        }
    }

    pub fn thumbnail(message: impl Into<String>) -> Self {
        Self::Thumbnail {
            message: non_empty(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReference(_) => ErrorKind::InvalidReference,
            Self::Resolution { .. } => ErrorKind::Resolution,
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::Thumbnail { .. } => ErrorKind::Thumbnail,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Human-readable message, never empty
    pub fn message(&self) -> String {
        non_empty(self.to_string())
    }

    pub fn blocking_reason(&self) -> Option<BlockingReason> {
        match self {
            Self::Resolution { reason, .. } => *reason,
            _ => None,
        }
    }
}
