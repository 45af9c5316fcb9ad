//! Stream selection over the `formats` array of a `yt-dlp --dump-json` dump.

use super::types::{VideoInfo, ALLOWED_RESOLUTIONS};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MediaDump {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamFormat {
    pub format_id: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub tbr: Option<f64>,
}

fn has_codec(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(c) if c != "none")
}

impl StreamFormat {
    /// Video and audio in a single stream.
    pub fn is_progressive(&self) -> bool {
        has_codec(&self.vcodec) && has_codec(&self.acodec)
    }

    pub fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none") && has_codec(&self.acodec)
    }
}

impl MediaDump {
    pub fn title(&self) -> String {
        self.title.clone().unwrap_or_else(|| "Unknown Title".to_string())
    }

    pub fn to_video_info(&self) -> VideoInfo {
        VideoInfo {
            title: self.title(),
            author: self
                .uploader
                .clone()
                .or_else(|| self.channel.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            duration_secs: self.duration.map(|d| d.max(0.0) as u64).unwrap_or(0),
            resolutions: offered_resolutions(&self.formats),
            has_audio: best_audio(&self.formats).is_some(),
        }
    }
}

/// Progressive heights on the allow-list, ascending and deduplicated.
pub fn offered_resolutions(formats: &[StreamFormat]) -> Vec<u32> {
    ALLOWED_RESOLUTIONS
        .iter()
        .copied()
        .filter(|allowed| {
            formats
                .iter()
                .any(|f| f.is_progressive() && f.height == Some(*allowed))
        })
        .collect()
}

/// Exact progressive match at `target`, else the closest height (ties go to the higher one).
pub fn pick_progressive(formats: &[StreamFormat], target: u32) -> Option<&StreamFormat> {
    formats
        .iter()
        .filter(|f| f.is_progressive())
        .filter_map(|f| f.height.map(|h| (h, f)))
        .min_by(|(ha, fa), (hb, fb)| {
            ha.abs_diff(target)
                .cmp(&hb.abs_diff(target))
                .then(hb.cmp(ha))
                .then(rate(fb.tbr).total_cmp(&rate(fa.tbr)))
        })
        .map(|(_, f)| f)
}

/// Highest-bitrate audio-only stream.
pub fn best_audio(formats: &[StreamFormat]) -> Option<&StreamFormat> {
    formats
        .iter()
        .filter(|f| f.is_audio_only())
        .max_by(|a, b| rate(a.abr.or(a.tbr)).total_cmp(&rate(b.abr.or(b.tbr))))
}

fn rate(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progressive(id: &str, height: u32) -> StreamFormat {
        StreamFormat {
            format_id: id.to_string(),
            height: Some(height),
            vcodec: Some("avc1.64001F".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            abr: None,
            tbr: None,
        }
    }

    fn video_only(id: &str, height: u32) -> StreamFormat {
        StreamFormat {
            acodec: Some("none".to_string()),
            ..progressive(id, height)
        }
    }

    fn audio(id: &str, abr: f64) -> StreamFormat {
        StreamFormat {
            format_id: id.to_string(),
            height: None,
            vcodec: Some("none".to_string()),
            acodec: Some("opus".to_string()),
            abr: Some(abr),
            tbr: None,
        }
    }

    #[test]
    fn test_offered_resolutions_intersects_allow_list() {
        let formats = vec![
            progressive("18", 360),
            progressive("a", 720),
            progressive("b", 720),
            progressive("22", 480),
            video_only("137", 1080),
            audio("251", 160.0),
        ];
        assert_eq!(offered_resolutions(&formats), vec![480, 720]);
    }

    #[test]
    fn test_offered_resolutions_empty() {
        assert!(offered_resolutions(&[]).is_empty());
        assert!(offered_resolutions(&[video_only("137", 1080)]).is_empty());
    }

    #[test]
    fn test_pick_progressive_exact() {
        let formats = vec![progressive("18", 360), progressive("22", 720)];
        assert_eq!(pick_progressive(&formats, 720).unwrap().format_id, "22");
    }

    #[test]
    fn test_pick_progressive_closest() {
        let formats = vec![progressive("18", 360), progressive("22", 720)];
        assert_eq!(pick_progressive(&formats, 1080).unwrap().format_id, "22");
        assert_eq!(pick_progressive(&formats, 480).unwrap().format_id, "18");
    }

    #[test]
    fn test_pick_progressive_tie_prefers_higher() {
        let formats = vec![progressive("low", 480), progressive("high", 720)];
        assert_eq!(pick_progressive(&formats, 600).unwrap().format_id, "high");
    }

    #[test]
    fn test_pick_progressive_ignores_adaptive() {
        let formats = vec![video_only("137", 1080), audio("251", 160.0)];
        assert!(pick_progressive(&formats, 1080).is_none());
    }

    #[test]
    fn test_best_audio() {
        let formats = vec![audio("139", 48.0), audio("251", 160.0), progressive("18", 360)];
        assert_eq!(best_audio(&formats).unwrap().format_id, "251");
        assert!(best_audio(&[progressive("18", 360)]).is_none());
    }

    #[test]
    fn test_dump_to_video_info() {
        let json = r#"{
            "title": "Some clip",
            "uploader": "Someone",
            "duration": 3725.4,
            "formats": [
                {"format_id": "18", "height": 360, "vcodec": "avc1", "acodec": "mp4a"},
                {"format_id": "22", "height": 720, "vcodec": "avc1", "acodec": "mp4a"},
                {"format_id": "251", "vcodec": "none", "acodec": "opus", "abr": 160.0}
            ]
        }"#;
        let dump: MediaDump = serde_json::from_str(json).unwrap();
        let info = dump.to_video_info();
        assert_eq!(info.title, "Some clip");
        assert_eq!(info.author, "Someone");
        assert_eq!(info.duration_secs, 3725);
        assert_eq!(info.resolutions, vec![720]);
        assert!(info.has_audio);
    }
}
