// Downloader module - platform dispatch and download cache over yt-dlp

pub mod backends;
pub mod cache;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod quality;
pub mod tools;
pub mod utils;

pub use cache::{CacheEntry, CacheManager, CacheStats, EvictionReport};
pub use errors::{DownloadError, ErrorKind, ErrorResponse};
pub use format_selector::{FormatExpression, FormatSelector, QualityOption};
pub use models::{FetchedFile, VideoMetadata};
pub use orchestrator::Dispatcher;
pub use platform::{detect, is_youtube_short, PlatformId};
pub use quality::QualitySpec;
pub use tools::{ToolInfo, ToolManager, ToolType};
