// SearchTask - URL to resolved metadata plus an optional preview thumbnail
//
// Idle -> Resolving -> [FetchingThumbnail] -> Done, failures exit to Failed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::errors::FetchError;
use super::extractors::Extractor;
use super::models::{MediaReference, ProgressSample, SearchResult, Thumbnail};
use super::thumbnail::{render_preview_blocking, ThumbnailPolicy, ThumbnailSource};
use super::traits::{EventSender, TaskHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Resolving,
    FetchingThumbnail,
    Done,
    Failed,
}

impl SearchState {
    pub fn can_transition_to(self, next: SearchState) -> bool {
        use SearchState::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, FetchingThumbnail)
                | (Resolving, Done)
                | (Resolving, Failed)
                | (FetchingThumbnail, Done)
                | (FetchingThumbnail, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Marks a search as in flight for as long as it is held
#[derive(Debug)]
pub struct FlightGuard(Arc<AtomicBool>);

impl FlightGuard {
    /// `None` while another guard on the same flag is alive
    pub fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One search for one reference; construct a new task for the next search
pub struct SearchTask {
    reference: MediaReference,
    extractor: Arc<dyn Extractor>,
    thumbnails: Arc<dyn ThumbnailSource>,
    policy: ThumbnailPolicy,
    state: SearchState,
    guard: Option<FlightGuard>,
}

impl SearchTask {
    pub fn new(
        reference: MediaReference,
        extractor: Arc<dyn Extractor>,
        thumbnails: Arc<dyn ThumbnailSource>,
        policy: ThumbnailPolicy,
    ) -> Self {
        Self {
            reference,
            extractor,
            thumbnails,
            policy,
            state: SearchState::Idle,
            guard: None,
        }
    }

    /// Hold `guard` until just before the terminal event is sent
    pub fn with_flight_guard(mut self, guard: FlightGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    fn transition(&mut self, next: SearchState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal search transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(reference = %self.reference, from = ?self.state, to = ?next, "search state");
        self.state = next;
    }

    /// Drive the search to its terminal state, emitting exactly one terminal event
    pub async fn run(
        mut self,
        events: EventSender<SearchResult>,
        cancel: CancellationToken,
    ) -> SearchState {
        tracing::info!(reference = %self.reference, extractor = self.extractor.name(), "search started");
        self.transition(SearchState::Resolving);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            r = self.execute(&events) => r,
        };

        // a caller reacting to the terminal event may start the next search
        drop(self.guard.take());

        match result {
            Ok(found) => {
                self.transition(SearchState::Done);
                tracing::info!(
                    reference = %self.reference,
                    title = %found.media.title,
                    renditions = found.media.renditions.len(),
                    thumbnail = found.thumbnail.is_some(),
                    "search finished"
                );
                events.finish(Ok(found));
            }
            Err(e) => {
                self.transition(SearchState::Failed);
                tracing::warn!(reference = %self.reference, error = %e, "search failed");
                events.finish(Err(e));
            }
        }
        self.state
    }

    async fn execute(
        &mut self,
        events: &EventSender<SearchResult>,
    ) -> Result<SearchResult, FetchError> {
        events.progress(ProgressSample::checkpoint(0.1), "Initializing search...");
        events.progress(ProgressSample::checkpoint(0.3), "Fetching video information...");

        let raw = self.extractor.resolve(&self.reference).await?;

        events.progress(ProgressSample::checkpoint(0.6), "Processing video details...");
        let media = raw.into_resolved(self.reference.clone());

        let thumbnail = match media.thumbnail_url.clone() {
            Some(url) => {
                self.transition(SearchState::FetchingThumbnail);
                events.progress(ProgressSample::checkpoint(0.8), "Loading thumbnail...");
                match self.load_thumbnail(&url).await {
                    Ok(thumb) => Some(thumb),
                    Err(e) if self.policy == ThumbnailPolicy::Degrade => {
                        tracing::warn!(url = %url, error = %e, "thumbnail unavailable, continuing without it");
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            None => None,
        };

        events.progress(ProgressSample::checkpoint(1.0), "Complete!");
        Ok(SearchResult { media, thumbnail })
    }

    async fn load_thumbnail(&self, url: &str) -> Result<Thumbnail, FetchError> {
        let bytes = self.thumbnails.fetch(url).await?;
        render_preview_blocking(bytes).await
    }

    /// Run on the tokio runtime and hand back the caller's side
    pub fn spawn(self) -> TaskHandle<SearchResult> {
        let (events, rx) = EventSender::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            self.run(events, token).await;
        });
        TaskHandle::new(rx, cancel, join)
    }
}
