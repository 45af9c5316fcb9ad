mod downloader;
mod error;
mod formats;
mod types;
mod ytdlp;

pub use downloader::VideoSource;
pub use error::SourceError;
pub use types::{FetchResult, Quality, VideoInfo, ALLOWED_RESOLUTIONS};
pub use ytdlp::YtDlpSource;

use regex::Regex;
use std::sync::LazyLock;

static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:(?:www|m|music)\.)?(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|v/|shorts/|live/)|youtube-nocookie\.com/embed/|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#/].*)?$",
    )
    .expect("video url pattern compiles")
});

/// Purely syntactic check against the video-sharing URL shapes we accept.
pub fn is_video_url(url: &str) -> bool {
    VIDEO_URL.is_match(url.trim())
}
