// Downloader module - search and download tasks over an extractor capability

pub mod catalog;
pub mod download;
pub mod errors;
pub mod extractors;
pub mod models;
pub mod naming;
pub mod orchestrator;
pub mod progress;
pub mod search;
pub mod thumbnail;
pub mod traits;
pub mod utils;

pub use download::{DownloadState, DownloadTask};
pub use errors::{ErrorKind, FetchError};
pub use extractors::{BlockingReason, CliExtractor, Extractor, ExtractorConfig};
pub use models::{
    DownloadOutcome, DownloadRequest, MediaReference, ProgressSample, RenditionDescriptor,
    ResolvedMedia, SearchResult, Thumbnail,
};
pub use orchestrator::Session;
pub use search::{SearchState, SearchTask};
pub use thumbnail::{ThumbnailPolicy, ThumbnailSource};
pub use traits::{TaskEvent, TaskHandle};
