// Session configuration: defaults, JSON loading and environment overrides

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::downloader::extractors::ExtractorConfig;
use crate::downloader::thumbnail::ThumbnailPolicy;

pub const ENV_DOWNLOAD_DIR: &str = "TUBEFETCH_DOWNLOAD_DIR";
pub const ENV_YTDLP_PATH: &str = "YTDLP_PATH";
pub const ENV_PROXY: &str = "TUBEFETCH_PROXY";
pub const ENV_THUMBNAIL_POLICY: &str = "TUBEFETCH_THUMBNAIL_POLICY";

const APP_FOLDER: &str = "TubeMaster";

/// `~/Downloads/TubeMaster`, falling back to the working directory
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_FOLDER)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub download_dir: PathBuf,
    /// Explicit yt-dlp binary; located automatically when unset
    pub ytdlp_path: Option<PathBuf>,
    pub extractor: ExtractorConfig,
    pub thumbnail_policy: ThumbnailPolicy,
    pub thumbnail_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            ytdlp_path: None,
            extractor: ExtractorConfig::default(),
            thumbnail_policy: ThumbnailPolicy::default(),
            thumbnail_timeout_secs: 30,
        }
    }
}

impl FetchConfig {
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_ytdlp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ytdlp_path = Some(path.into());
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_thumbnail_policy(mut self, policy: ThumbnailPolicy) -> Self {
        self.thumbnail_policy = policy;
        self
    }

    /// Missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; blank or unparseable values are ignored
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get(ENV_DOWNLOAD_DIR) {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(path) = get(ENV_YTDLP_PATH) {
            self.ytdlp_path = Some(PathBuf::from(path));
        }
        if let Some(proxy) = get(ENV_PROXY) {
            self.extractor.proxy = Some(proxy);
        }
        if let Some(value) = get(ENV_THUMBNAIL_POLICY) {
            match ThumbnailPolicy::parse(&value) {
                Some(policy) => self.thumbnail_policy = policy,
                None => tracing::warn!(value = %value, "ignoring unknown {}", ENV_THUMBNAIL_POLICY),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = FetchConfig::default();
        assert!(config.download_dir.ends_with("TubeMaster"));
        assert_eq!(config.thumbnail_policy, ThumbnailPolicy::Degrade);
        assert_eq!(config.extractor.timeout_seconds, 30);
        assert_eq!(config.ytdlp_path, None);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = FetchConfig::from_json_str(
            r#"{"download_dir": "/data/videos", "thumbnail_policy": "strict", "extractor": {"proxy": "socks5://127.0.0.1:1080"}}"#,
        )
        .unwrap();
        assert_eq!(config.download_dir, PathBuf::from("/data/videos"));
        assert_eq!(config.thumbnail_policy, ThumbnailPolicy::Strict);
        assert_eq!(config.extractor.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(config.extractor.timeout_seconds, 30);
        assert_eq!(config.thumbnail_timeout_secs, 30);
    }

    #[test]
    fn overrides_apply_and_skip_blanks() {
        let env: HashMap<&str, &str> = [
            (ENV_DOWNLOAD_DIR, "/tmp/out"),
            (ENV_YTDLP_PATH, "  "),
            (ENV_PROXY, "http://proxy:8080"),
            (ENV_THUMBNAIL_POLICY, "sometimes"),
        ]
        .into_iter()
        .collect();

        let config = FetchConfig::default()
            .with_thumbnail_policy(ThumbnailPolicy::Strict)
            .with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.download_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.ytdlp_path, None);
        assert_eq!(config.extractor.proxy.as_deref(), Some("http://proxy:8080"));
        assert_eq!(config.thumbnail_policy, ThumbnailPolicy::Strict);
    }

    #[test]
    fn builders() {
        let config = FetchConfig::default()
            .with_download_dir("/srv/media")
            .with_ytdlp_path("/opt/yt-dlp")
            .with_extractor(ExtractorConfig::default().with_timeout(5));
        assert_eq!(config.download_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.ytdlp_path, Some(PathBuf::from("/opt/yt-dlp")));
        assert_eq!(config.extractor.timeout_seconds, 5);
    }
}
