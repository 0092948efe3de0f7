// Extractor module - the capability that resolves and streams media
//
// The `Extractor` trait is the seam between the tasks and the third-party
// tool; `CliExtractor` is the yt-dlp implementation.

mod cli;
mod diagnostics;
mod traits;

pub use cli::{find_ytdlp, CliExtractor};
pub use diagnostics::{diagnose_error, BlockingReason};
pub use traits::{ChunkCallback, Extractor, ExtractorConfig, RawFormat, RawMedia};
