use super::{
    downloader::VideoSource,
    error::SourceError,
    formats::{best_audio, pick_progressive, MediaDump},
    types::{FetchResult, Quality, VideoInfo},
};
use crate::utils::{bytes_to_mb, sanitize_file_stem};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    process::Output,
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct YtDlpSource {
    download_dir: PathBuf,
    temp_dir: PathBuf,
    metadata_timeout: Duration,
    download_timeout: Duration,
}

impl YtDlpSource {
    pub fn new(
        download_dir: PathBuf,
        temp_dir: PathBuf,
        metadata_timeout: Duration,
        download_timeout: Duration,
    ) -> Self {
        Self {
            download_dir,
            temp_dir,
            metadata_timeout,
            download_timeout,
        }
    }

    async fn run(
        &self,
        stage: &'static str,
        timeout: Duration,
        command: &mut Command,
    ) -> Result<Output, SourceError> {
        let output = tokio::time::timeout(timeout, command.kill_on_drop(true).output())
            .await
            .map_err(|_| SourceError::Timeout(stage))?
            .map_err(SourceError::Spawn)?;

        if !output.status.success() {
            return Err(SourceError::Failed {
                stage,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }

    async fn extract_metadata(&self, url: &str) -> Result<MediaDump, SourceError> {
        debug!("Extracting metadata with yt-dlp for: {}", url);

        let output = self
            .run(
                "metadata extraction",
                self.metadata_timeout,
                Command::new("yt-dlp")
                    .arg("--dump-json")
                    .arg("--no-download")
                    .arg("--no-playlist")
                    .arg("--no-warnings")
                    .arg(url),
            )
            .await?;

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn download_args(
        &self,
        format_id: &str,
        home: &Path,
        output_template: &str,
        extract_mp3: bool,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--format".into(),
            format_id.into(),
            "--paths".into(),
            format!("home:{}", home.display()),
            "--paths".into(),
            format!("temp:{}", self.temp_dir.display()),
            "--output".into(),
            output_template.into(),
            // The scratch sweep ages files by mtime, which must be the download time
            "--no-mtime".into(),
            "--no-playlist".into(),
            "--no-progress".into(),
            "--no-warnings".into(),
        ];

        if extract_mp3 {
            args.extend(["--extract-audio", "--audio-format", "mp3"].map(String::from));
        } else {
            args.extend(["--remux-video", "mp4"].map(String::from));
        }
        args
    }

    async fn download_format(
        &self,
        url: &str,
        format_id: &str,
        home: &Path,
        output_template: &str,
        extract_mp3: bool,
    ) -> Result<(), SourceError> {
        let mut command = Command::new("yt-dlp");
        command
            .args(self.download_args(format_id, home, output_template, extract_mp3))
            .arg(url);

        self.run("media download", self.download_timeout, &mut command)
            .await?;
        Ok(())
    }

    /// Checks yt-dlp and ffmpeg; only yt-dlp is mandatory.
    pub async fn check_availability() -> bool {
        let yt_dlp = reports_version("yt-dlp", "--version").await;
        // mp3 extraction and remuxing go through ffmpeg
        let ffmpeg = reports_version("ffmpeg", "-version").await;

        if yt_dlp && !ffmpeg {
            warn!("yt-dlp will work but audio extraction will fail");
        }
        yt_dlp
    }
}

async fn reports_version(binary: &str, flag: &str) -> bool {
    match Command::new(binary).arg(flag).output().await {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("unknown").trim();
            info!(binary, version, "Found external tool");
            true
        }
        Ok(output) => {
            warn!(binary, status = %output.status, "External tool reported no version");
            false
        }
        Err(e) => {
            warn!(binary, error = %e, "External tool not found");
            false
        }
    }
}

#[async_trait]
impl VideoSource for YtDlpSource {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn inspect(&self, url: &str) -> Result<VideoInfo, SourceError> {
        let info = self
            .extract_metadata(url)
            .await
            .inspect_err(|e| error!(url, error = %e, "Video inspection failed"))?
            .to_video_info();

        info!(
            url,
            title = %info.title,
            resolutions = ?info.resolutions,
            has_audio = info.has_audio,
            "Inspected video"
        );
        Ok(info)
    }

    async fn fetch(&self, url: &str, quality: Quality) -> Result<FetchResult, SourceError> {
        // Concurrent fetches of the same video must not share a path
        let fetch_dir = self.download_dir.join(Uuid::new_v4().simple().to_string());

        let result = async {
            tokio::fs::create_dir_all(&fetch_dir).await?;
            let dump = self.extract_metadata(url).await?;
            let stem = sanitize_file_stem(&dump.title());

            let (format_id, file_name) = match quality {
                Quality::Audio => {
                    let stream =
                        best_audio(&dump.formats).ok_or(SourceError::NoMatchingStream(quality))?;
                    (stream.format_id.clone(), format!("{stem}.mp3"))
                }
                Quality::Resolution(height) => {
                    let stream = pick_progressive(&dump.formats, height)
                        .ok_or(SourceError::NoMatchingStream(quality))?;
                    if stream.height != Some(height) {
                        info!(
                            requested = height,
                            picked = ?stream.height,
                            "No exact progressive match, using closest resolution"
                        );
                    }
                    (stream.format_id.clone(), format!("{stem}_{height}p.mp4"))
                }
            };

            let file_stem = file_name
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(&file_name);
            info!(
                url,
                format_id = %format_id,
                dir = %fetch_dir.display(),
                file = %file_name,
                "Downloading media with yt-dlp"
            );
            self.download_format(
                url,
                &format_id,
                &fetch_dir,
                &format!("{file_stem}.%(ext)s"),
                quality == Quality::Audio,
            )
            .await?;

            let path = fetch_dir.join(&file_name);
            let size = tokio::fs::metadata(&path).await?.len();

            Ok::<_, SourceError>(FetchResult {
                path,
                file_name,
                size_mb: bytes_to_mb(size),
                format: quality.format_ext().to_string(),
            })
        }
        .await;

        if let Err(e) = &result {
            error!(url, quality = %quality, error = %e, "Media fetch failed");
            if let Err(e) = tokio::fs::remove_dir_all(&fetch_dir).await {
                debug!(dir = %fetch_dir.display(), error = %e, "Fetch directory not removed");
            }
        }
        result
    }
}
