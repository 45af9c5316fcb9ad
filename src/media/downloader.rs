use super::{FetchResult, Quality, SourceError, VideoInfo};
use async_trait::async_trait;

#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Human-readable name of the source backend
    fn name(&self) -> &'static str;

    /// Syntactic check only, never touches the network
    fn validate(&self, url: &str) -> bool {
        super::is_video_url(url)
    }

    /// Resolve title, author, duration and the qualities worth offering
    async fn inspect(&self, url: &str) -> Result<VideoInfo, SourceError>;

    /// Download the media at `quality` into the local download directory
    async fn fetch(&self, url: &str, quality: Quality) -> Result<FetchResult, SourceError>;
}
