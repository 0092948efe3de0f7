// Blocking diagnostics - classifies extractor errors
//
// Maps raw yt-dlp stderr to a reason the presentation layer can explain.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingReason {
    /// DRM, Premium or paid content; no workaround
    DrmProtected,
    MembersOnly,
    AgeRestricted,
    PrivateVideo,
    /// Deleted or otherwise removed
    VideoUnavailable,
    GeoBlocked,
    RateLimited,
    BotDetection,
    Http403Forbidden,
    NetworkTimeout,
    Unknown,
}

impl BlockingReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::DrmProtected => "DRM-protected content",
            Self::MembersOnly => "Members-only content",
            Self::AgeRestricted => "Age-restricted content",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::GeoBlocked => "Geographic restriction",
            Self::RateLimited => "Rate limited by YouTube",
            Self::BotDetection => "Bot detection triggered",
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::NetworkTimeout => "Network timeout",
            Self::Unknown => "Unknown error",
        }
    }

    /// Whether trying again later (or from another network) may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::BotDetection | Self::Http403Forbidden | Self::NetworkTimeout
        )
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::DrmProtected | Self::VideoUnavailable)
    }
}

/// Checked in order; more specific reasons first
const PATTERNS: &[(BlockingReason, &[&str])] = &[
    (
        BlockingReason::DrmProtected,
        &[
            "drm",
            "widevine",
            "playready",
            "fairplay",
            "youtube premium",
            "requires purchase",
            "rental",
            "this video requires payment",
        ],
    ),
    (
        BlockingReason::MembersOnly,
        &["members only", "members-only", "join this channel", "membership required"],
    ),
    (
        BlockingReason::AgeRestricted,
        &["age-restricted", "sign in to confirm your age", "age_verification"],
    ),
    (
        BlockingReason::PrivateVideo,
        &["private video", "video is private", "sign in if you've been granted access"],
    ),
    (
        BlockingReason::VideoUnavailable,
        &[
            "video unavailable",
            "video has been removed",
            "no longer available",
            "video is unavailable",
        ],
    ),
    (
        BlockingReason::GeoBlocked,
        &[
            "not available in your country",
            "blocked in your country",
            "geo restricted",
            "geo-restricted",
            "geo restriction",
        ],
    ),
    (
        BlockingReason::RateLimited,
        &["429", "rate limit", "too many requests"],
    ),
    (
        BlockingReason::BotDetection,
        &["confirm you're not a bot", "captcha", "unusual traffic"],
    ),
    (BlockingReason::Http403Forbidden, &["403", "forbidden"]),
    (
        BlockingReason::NetworkTimeout,
        &["timeout", "timed out", "connection refused", "network is unreachable"],
    ),
];

lazy_static::lazy_static! {
    /// `ERROR: [extractor] <video id>: ` - ids may contain any needle
    static ref SUBJECT_PREFIX: Regex =
        Regex::new(r"(?mi)^\s*(?:ERROR:\s*)?\[[\w:-]+\]\s*[\w-]+:\s*").unwrap();

    /// Needles match whole words only
    static ref MATCHERS: Vec<(BlockingReason, Regex)> = PATTERNS
        .iter()
        .map(|(reason, needles)| {
            let alternatives: Vec<String> = needles.iter().map(|n| regex::escape(n)).collect();
            let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
            (*reason, Regex::new(&pattern).unwrap())
        })
        .collect();
}

/// Analyze error text; `None` only for empty input
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    if error.trim().is_empty() {
        return None;
    }
    let lower = error.to_lowercase();
    let message = SUBJECT_PREFIX.replace_all(&lower, "");
    let reason = MATCHERS
        .iter()
        .find(|(_, re)| re.is_match(&message))
        .map(|(reason, _)| *reason)
        .unwrap_or(BlockingReason::Unknown);
    Some(reason)
}
