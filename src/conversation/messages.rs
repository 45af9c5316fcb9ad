//! User-facing texts. Discord markdown.

use crate::db::Stats;
use crate::media::{Quality, VideoInfo};
use crate::utils::{format_duration, format_number};
use chrono::{DateTime, Utc};
use std::time::Duration;

pub const NOT_A_VIDEO_URL: &str =
    "That doesn't look like a YouTube link. Please send a valid YouTube video URL.";
pub const INSPECTING: &str = "Fetching video info... ⏳";
pub const INSPECT_FAILED: &str =
    "Couldn't get the video info. Please check the link and try again.";
pub const NO_PENDING_SELECTION: &str =
    "Something went wrong. Please send the video link again.";
pub const UNKNOWN_CHOICE: &str = "Unknown option. Please pick one of the offered qualities.";
pub const FETCH_FAILED: &str =
    "Downloading the video failed. Please try again or pick another quality.";
pub const PUBLISH_FAILED: &str = "Uploading the file to storage failed. Please try again.";
pub const STATS_FORBIDDEN: &str = "You don't have access to this command.";
pub const STATS_FAILED: &str = "Couldn't load statistics right now.";

pub fn format_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    let (amount, unit) = if secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };

    if amount == 1 {
        format!("1 {unit}")
    } else {
        format!("{amount} {unit}s")
    }
}

const COMMANDS: &str = "Commands:\n\
    /start - start using the bot\n\
    /help - show usage\n\
    /stats - statistics (admin only)";

pub fn welcome(display_name: &str) -> String {
    format!(
        "Hi, {display_name}! 👋\n\n\
         I download YouTube videos and hand you a temporary link to the file.\n\n\
         Just send me a YouTube link and pick the quality you want.\n\n\
         {COMMANDS}"
    )
}

pub fn help(ttl: Duration) -> String {
    format!(
        "How to use this bot:\n\n\
         1. Send me a YouTube video link\n\
         2. Pick a quality (480p, 720p, 1080p or MP3)\n\
         3. Wait for the download and grab the temporary link\n\n\
         Note: links stay valid for {}.\n\n\
         {COMMANDS}",
        format_ttl(ttl)
    )
}

pub fn video_card(info: &VideoInfo) -> String {
    let mut text = format!(
        "📹 **{}**\n\n👤 Author: {}\n⏱ Duration: {}\n\n",
        info.title,
        info.author,
        format_duration(info.duration_secs)
    );
    if info.resolutions.is_empty() && !info.has_audio {
        text.push_str("No downloadable quality is available for this video.");
    } else {
        text.push_str("Choose a download quality:");
    }
    text
}

pub fn option_label(quality: Quality) -> String {
    match quality {
        Quality::Audio => "🎵 MP3 (audio only)".to_string(),
        Quality::Resolution(_) => format!("📹 {}", quality.label()),
    }
}

pub fn downloading(quality: Quality) -> String {
    let what = match quality {
        Quality::Audio => "audio".to_string(),
        Quality::Resolution(_) => format!("video in {}", quality.label()),
    };
    format!("Downloading {what}... ⏳\nThis may take a while depending on the video size.")
}

pub fn uploading(size_mb: f64) -> String {
    format!("Download finished! 🎉\nFile size: {size_mb:.2} MB\n\nUploading to storage... ⏳")
}

pub fn format_expiration(at: DateTime<Utc>) -> String {
    at.format("%d.%m.%Y %H:%M:%S UTC").to_string()
}

pub fn delivered(
    title: &str,
    quality: Quality,
    size_mb: f64,
    link: &str,
    expires_at: DateTime<Utc>,
    ttl: Duration,
) -> String {
    format!(
        "✅ Done!\n\n\
         📹 **{title}**\n\
         📊 Quality: {}\n\
         📦 Size: {size_mb:.2} MB\n\n\
         🔗 Download: <{link}>\n\n\
         ⚠️ Link valid until {} ({})",
        quality.label(),
        format_expiration(expires_at),
        format_ttl(ttl)
    )
}

pub fn stats(stats: &Stats) -> String {
    let mut text = format!(
        "📊 Bot statistics:\n\n\
         👥 Total users: {}\n\
         📥 Total downloads: {}\n\
         📥 Downloads today: {}\n\
         👤 Active users today: {}\n\n\
         🏆 Top users by downloads:\n",
        format_number(stats.total_users),
        format_number(stats.total_downloads),
        format_number(stats.downloads_today),
        format_number(stats.active_users_today)
    );

    if stats.top_users.is_empty() {
        text.push_str("No users yet.\n");
    }
    for (i, user) in stats.top_users.iter().enumerate() {
        let handle = user.username.as_deref().unwrap_or("unknown");
        text.push_str(&format!(
            "{}. {} (@{}): {} downloads\n",
            i + 1,
            user.display_name,
            handle,
            format_number(user.total_downloads)
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(Duration::from_secs(3600)), "1 hour");
        assert_eq!(format_ttl(Duration::from_secs(7200)), "2 hours");
        assert_eq!(format_ttl(Duration::from_secs(600)), "10 minutes");
        assert_eq!(format_ttl(Duration::from_secs(90)), "90 seconds");
    }

    #[test]
    fn test_format_expiration() {
        let at = DateTime::from_timestamp(1_700_003_600, 0).unwrap();
        assert_eq!(format_expiration(at), "14.11.2023 23:13:20 UTC");
    }

    #[test]
    fn test_video_card_renders_duration() {
        let info = VideoInfo {
            title: "Clip".to_string(),
            author: "Someone".to_string(),
            duration_secs: 3725,
            resolutions: vec![720],
            has_audio: true,
        };
        let card = video_card(&info);
        assert!(card.contains("**Clip**"));
        assert!(card.contains("Duration: 1:02:05"));
        assert!(card.ends_with("Choose a download quality:"));
    }

    #[test]
    fn test_option_labels() {
        assert_eq!(option_label(Quality::Resolution(720)), "📹 720p");
        assert_eq!(option_label(Quality::Audio), "🎵 MP3 (audio only)");
    }
}
