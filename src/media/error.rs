use super::types::Quality;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("failed to run yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{stage} failed: {stderr}")]
    Failed { stage: &'static str, stderr: String },

    #[error("failed to parse media metadata: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no stream available for {0}")]
    NoMatchingStream(Quality),

    #[error("downloaded file is missing: {0}")]
    Io(#[from] std::io::Error),
}
