pub mod config;
pub mod downloader;
pub mod logging;

pub use config::FetchConfig;
pub use downloader::{
    DownloadOutcome, ErrorKind, FetchError, ResolvedMedia, SearchResult, Session, TaskEvent,
    TaskHandle,
};
pub use logging::init_tracing;
