// DownloadTask - stream one rendition into a reserved file
//
// Idle -> Downloading -> Done, with Idle -> Failed for precondition failures
// and Downloading -> Failed for transfer errors and cancellation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::errors::FetchError;
use super::extractors::Extractor;
use super::models::{DownloadOutcome, DownloadRequest, ResolvedMedia};
use super::naming;
use super::progress::{status_line, ProgressReporter};
use super::traits::{EventSender, TaskHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    Downloading,
    Done,
    Failed,
}

impl DownloadState {
    pub fn can_transition_to(self, next: DownloadState) -> bool {
        use DownloadState::*;
        matches!(
            (self, next),
            (Idle, Downloading) | (Idle, Failed) | (Downloading, Done) | (Downloading, Failed)
        )
    }
}

pub struct DownloadTask {
    request: DownloadRequest,
    media: ResolvedMedia,
    extractor: Arc<dyn Extractor>,
    state: DownloadState,
}

impl DownloadTask {
    pub fn new(request: DownloadRequest, media: ResolvedMedia, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            request,
            media,
            extractor,
            state: DownloadState::Idle,
        }
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    fn transition(&mut self, next: DownloadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal download transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(format_id = %self.request.format_id, from = ?self.state, to = ?next, "download state");
        self.state = next;
    }

    /// Drive the download to completion or failure; the partial file is
    /// removed on every path except success.
    pub async fn run(
        mut self,
        events: EventSender<PathBuf>,
        cancel: CancellationToken,
    ) -> DownloadOutcome {
        tracing::info!(
            reference = %self.request.reference,
            format_id = %self.request.format_id,
            destination = %self.request.destination.display(),
            "download started"
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            r = self.execute(&events) => r,
        };

        let outcome = DownloadOutcome::from(&result);
        match &result {
            Ok(path) => {
                self.transition(DownloadState::Done);
                tracing::info!(path = %path.display(), "download completed");
            }
            Err(e) => {
                self.transition(DownloadState::Failed);
                tracing::warn!(kind = ?e.kind(), error = %e, "download failed");
            }
        }
        events.finish(result);
        outcome
    }

    async fn execute(&mut self, events: &EventSender<PathBuf>) -> Result<PathBuf, FetchError> {
        // no filesystem access before the selection is known to be valid
        let rendition = self.request.validate(&self.media)?.clone();

        tokio::fs::create_dir_all(&self.request.destination)
            .await
            .map_err(|e| FetchError::filesystem("Could not create download directory", e))?;

        let reserved = naming::reserve(
            &self.request.destination,
            &self.media.title,
            &rendition.container_ext,
        )
        .await?;

        self.transition(DownloadState::Downloading);

        let mut reporter = ProgressReporter::new();
        let mut last = Instant::now();
        let mut on_chunk = |transferred: u64, total: Option<u64>| {
            let now = Instant::now();
            let sample = reporter.sample(transferred, total, now.duration_since(last));
            last = now;
            events.progress(sample, status_line(&sample));
        };

        self.extractor
            .stream(
                &self.request.reference,
                &rendition.format_id,
                reserved.path(),
                &mut on_chunk,
            )
            .await?;

        Ok(reserved.commit())
    }

    pub fn spawn(self) -> TaskHandle<PathBuf> {
        let (events, rx) = EventSender::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            self.run(events, token).await;
        });
        TaskHandle::new(rx, cancel, join)
    }
}
