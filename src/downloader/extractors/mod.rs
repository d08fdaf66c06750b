// InfoExtractor module - the seam in front of the extraction library
//
// `CliInfoExtractor` drives the `yt-dlp` binary. Tests swap in scripted
// implementations of `InfoExtractor`.

mod cli;
pub mod diagnostics;
mod traits;

pub use cli::CliInfoExtractor;
pub use diagnostics::{classify, translate};
pub use traits::{
    DownloadSpec, ExtendedFormat, ExtendedVideoInfo, ExtractorConfig, InfoExtractor,
    PostProcessor, DEFAULT_USER_AGENT,
};
