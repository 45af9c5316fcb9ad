use std::{fmt, path::PathBuf, str::FromStr};

/// Resolutions the bot is willing to offer, ascending.
pub const ALLOWED_RESOLUTIONS: [u32; 3] = [480, 720, 1080];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    Audio,
    Resolution(u32),
}

impl Quality {
    /// Tag used in callback data and download records: `audio` or `720`.
    pub fn tag(&self) -> String {
        match self {
            Quality::Audio => "audio".to_string(),
            Quality::Resolution(height) => height.to_string(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Quality::Audio => "MP3 (audio only)".to_string(),
            Quality::Resolution(height) => format!("{height}p"),
        }
    }

    pub fn format_ext(&self) -> &'static str {
        match self {
            Quality::Audio => "mp3",
            Quality::Resolution(_) => "mp4",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "audio" {
            return Ok(Quality::Audio);
        }
        s.parse::<u32>()
            .ok()
            .filter(|height| *height > 0)
            .map(Quality::Resolution)
            .ok_or_else(|| format!("unknown quality: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub title: String,
    pub author: String,
    pub duration_secs: u64,
    /// Sorted, deduplicated, restricted to [`ALLOWED_RESOLUTIONS`].
    pub resolutions: Vec<u32>,
    pub has_audio: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub path: PathBuf,
    pub file_name: String,
    pub size_mb: f64,
    /// `mp3` for audio, `mp4` otherwise.
    pub format: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_parse() {
        assert_eq!("audio".parse::<Quality>(), Ok(Quality::Audio));
        assert_eq!("720".parse::<Quality>(), Ok(Quality::Resolution(720)));
        assert!("0".parse::<Quality>().is_err());
        assert!("720p".parse::<Quality>().is_err());
        assert!("".parse::<Quality>().is_err());
    }

    #[test]
    fn test_quality_tag_and_label() {
        assert_eq!(Quality::Audio.tag(), "audio");
        assert_eq!(Quality::Resolution(1080).tag(), "1080");
        assert_eq!(Quality::Resolution(480).label(), "480p");
        assert_eq!(Quality::Audio.format_ext(), "mp3");
        assert_eq!(Quality::Resolution(720).format_ext(), "mp4");
    }
}
