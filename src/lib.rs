pub mod config;
pub mod downloader;

pub use config::{AppConfig, UnknownPlatformPolicy};
pub use downloader::{Dispatcher, DownloadError, ErrorKind, QualitySpec};
