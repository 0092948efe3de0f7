// Session - caller-held state that constructs and spawns tasks

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::download::DownloadTask;
use super::errors::FetchError;
use super::extractors::{find_ytdlp, CliExtractor, Extractor};
use super::models::{DownloadRequest, MediaReference, ResolvedMedia, SearchResult};
use super::search::{FlightGuard, SearchTask};
use super::thumbnail::{HttpThumbnailSource, ThumbnailPolicy, ThumbnailSource};
use super::traits::TaskHandle;
use crate::config::FetchConfig;

pub struct Session {
    download_dir: PathBuf,
    policy: ThumbnailPolicy,
    extractor: Arc<dyn Extractor>,
    thumbnails: Arc<dyn ThumbnailSource>,
    searching: Arc<AtomicBool>,
}

impl Session {
    /// Session backed by the yt-dlp binary and an HTTP thumbnail source
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let ytdlp = find_ytdlp(config.ytdlp_path.as_deref());
        tracing::info!(ytdlp = %ytdlp.display(), download_dir = %config.download_dir.display(), "session created");

        let extractor = Arc::new(CliExtractor::new(ytdlp, config.extractor.clone()));
        let thumbnails = Arc::new(HttpThumbnailSource::new(
            config.extractor.proxy.as_deref(),
            config.thumbnail_timeout_secs,
        )?);

        Ok(Self::with_collaborators(
            config.download_dir.clone(),
            config.thumbnail_policy,
            extractor,
            thumbnails,
        ))
    }

    pub fn with_collaborators(
        download_dir: impl Into<PathBuf>,
        policy: ThumbnailPolicy,
        extractor: Arc<dyn Extractor>,
        thumbnails: Arc<dyn ThumbnailSource>,
    ) -> Self {
        Self {
            download_dir: download_dir.into(),
            policy,
            extractor,
            thumbnails,
            searching: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Applies to downloads started afterwards
    pub fn set_download_dir(&mut self, dir: impl Into<PathBuf>) {
        self.download_dir = dir.into();
        tracing::info!(download_dir = %self.download_dir.display(), "download directory changed");
    }

    pub async fn ensure_download_dir(&self) -> Result<(), FetchError> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| FetchError::filesystem("Could not create download directory", e))
    }

    pub fn thumbnail_policy(&self) -> ThumbnailPolicy {
        self.policy
    }

    pub fn is_searching(&self) -> bool {
        self.searching.load(Ordering::Acquire)
    }

    /// Start a search. `Ok(None)` while another search of this session is in flight.
    pub fn search(&self, url: &str) -> Result<Option<TaskHandle<SearchResult>>, FetchError> {
        let reference = MediaReference::parse(url)?;

        let Some(guard) = FlightGuard::acquire(&self.searching) else {
            tracing::debug!(reference = %reference, "search already in flight, ignoring");
            return Ok(None);
        };

        let task = SearchTask::new(
            reference,
            Arc::clone(&self.extractor),
            Arc::clone(&self.thumbnails),
            self.policy,
        )
        .with_flight_guard(guard);
        Ok(Some(task.spawn()))
    }

    /// Download `format_id` of `media` into the current download directory
    pub fn download(&self, media: &ResolvedMedia, format_id: &str) -> TaskHandle<PathBuf> {
        let request = DownloadRequest::new(media.reference.clone(), format_id, &self.download_dir);
        DownloadTask::new(request, media.clone(), Arc::clone(&self.extractor)).spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::ErrorKind;
    use crate::downloader::extractors::{ChunkCallback, RawFormat, RawMedia};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Resolves once `release` is notified
    struct GatedExtractor {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Extractor for GatedExtractor {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn resolve(&self, _reference: &MediaReference) -> Result<RawMedia, FetchError> {
            self.release.notified().await;
            Ok(RawMedia {
                title: Some("Clip".into()),
                thumbnail: None,
                formats: vec![RawFormat {
                    format_id: Some("18".into()),
                    ..Default::default()
                }],
            })
        }

        async fn stream(
            &self,
            _reference: &MediaReference,
            _format_id: &str,
            _destination: &Path,
            _on_chunk: &mut ChunkCallback<'_>,
        ) -> Result<(), FetchError> {
            Ok(())
        }
    }

    struct NoThumbnails;

    #[async_trait]
    impl ThumbnailSource for NoThumbnails {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::thumbnail("offline"))
        }
    }

    fn session(dir: &Path, release: Arc<Notify>) -> Session {
        Session::with_collaborators(
            dir,
            ThumbnailPolicy::Degrade,
            Arc::new(GatedExtractor { release }),
            Arc::new(NoThumbnails),
        )
    }

    #[tokio::test]
    async fn only_one_search_in_flight() {
        let tmp = tempfile::tempdir().unwrap();
        let release = Arc::new(Notify::new());
        let session = session(tmp.path(), Arc::clone(&release));

        let first = session.search("https://youtu.be/abc").unwrap().unwrap();
        assert!(session.is_searching());
        assert!(session.search("https://youtu.be/other").unwrap().is_none());

        release.notify_one();
        let found = first.wait().await.unwrap();
        assert_eq!(found.media.title, "Clip");
        assert!(!session.is_searching());

        release.notify_one();
        let second = session.search("https://youtu.be/other").unwrap().unwrap();
        assert_eq!(second.wait().await.unwrap().media.reference.as_str(), "https://youtu.be/other");
    }

    #[tokio::test]
    async fn empty_url_is_rejected_without_taking_the_guard() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session(tmp.path(), Arc::new(Notify::new()));
        let err = session.search("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
        assert!(!session.is_searching());
    }

    #[tokio::test]
    async fn download_dir_is_caller_state() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = session(tmp.path(), Arc::new(Notify::new()));
        let nested = tmp.path().join("a").join("b");
        session.set_download_dir(&nested);
        assert_eq!(session.download_dir(), nested.as_path());
        session.ensure_download_dir().await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn download_uses_session_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session(tmp.path(), Arc::new(Notify::new()));
        let media = RawMedia {
            title: Some("Clip".into()),
            thumbnail: None,
            formats: vec![RawFormat {
                format_id: Some("18".into()),
                ext: Some("webm".into()),
                ..Default::default()
            }],
        }
        .into_resolved(MediaReference::parse("https://youtu.be/abc").unwrap());

        let path = session.download(&media, "18").wait().await.unwrap();
        assert_eq!(path, tmp.path().join("Clip.webm"));
    }
}
