//! The per-user conversation: URL → quality choice → link.
//!
//! [`Conversation`] is platform-neutral. Every handler returns a [`Reply`]
//! that the chat layer renders; interim status goes through [`Progress`].

pub mod messages;
mod session;

pub use session::{InMemorySessions, PendingSelection, SessionStore};

use crate::clock::Clock;
use crate::db::{DownloadRecord, Store, UserId, UserProfile};
use crate::media::{FetchResult, Quality, VideoInfo, VideoSource, ALLOWED_RESOLUTIONS};
use crate::storage::Publisher;
use async_trait::async_trait;
use chrono::NaiveTime;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Prefix of the callback data attached to quality options.
pub const CALLBACK_PREFIX: &str = "res_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AwaitingQualityChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOption {
    pub label: String,
    /// `res_<quality>`
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub options: Vec<ReplyOption>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Stats,
}

impl Command {
    /// Recognizes `/start`, `/help` and `/stats`, ignoring case and trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        // Telegram-style `/help@botname`
        let word = word.split('@').next().unwrap_or(word);
        match word.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "stats" => Some(Command::Stats),
            _ => None,
        }
    }
}

/// Interim status updates while a long step runs.
#[async_trait]
pub trait Progress: Send + Sync {
    async fn update(&self, text: &str);
}

/// Only qualities that could have been offered are accepted.
pub fn parse_callback(data: &str) -> Option<Quality> {
    let quality = data.strip_prefix(CALLBACK_PREFIX)?.parse().ok()?;
    match quality {
        Quality::Resolution(height) if !ALLOWED_RESOLUTIONS.contains(&height) => None,
        _ => Some(quality),
    }
}

pub fn callback_data(quality: Quality) -> String {
    format!("{CALLBACK_PREFIX}{}", quality.tag())
}

/// One option per offered resolution (ascending), then audio if available.
pub fn quality_options(info: &VideoInfo) -> Vec<ReplyOption> {
    let mut resolutions: Vec<u32> = info
        .resolutions
        .iter()
        .copied()
        .filter(|height| ALLOWED_RESOLUTIONS.contains(height))
        .collect();
    resolutions.sort_unstable();
    resolutions.dedup();

    resolutions
        .into_iter()
        .map(Quality::Resolution)
        .chain(info.has_audio.then_some(Quality::Audio))
        .map(|quality| ReplyOption {
            label: messages::option_label(quality),
            callback_data: callback_data(quality),
        })
        .collect()
}

pub struct Conversation {
    source: Arc<dyn VideoSource>,
    publisher: Arc<Publisher>,
    store: Arc<dyn Store>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    admin_user_id: Option<UserId>,
}

impl Conversation {
    pub fn new(
        source: Arc<dyn VideoSource>,
        publisher: Arc<Publisher>,
        store: Arc<dyn Store>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        admin_user_id: Option<UserId>,
    ) -> Self {
        Self {
            source,
            publisher,
            store,
            sessions,
            clock,
            admin_user_id,
        }
    }

    pub fn state(&self, user_id: UserId) -> ConversationState {
        if self.sessions.peek(user_id).is_some() {
            ConversationState::AwaitingQualityChoice
        } else {
            ConversationState::Idle
        }
    }

    /// Activity bookkeeping for every inbound event. Never fails the caller.
    pub fn touch(&self, user: &UserProfile) {
        if let Err(e) = self.store.touch_user(user, self.clock.now()) {
            warn!(user_id = user.id, error = %e, "Failed to update user activity");
        }
    }

    fn register(&self, user: &UserProfile) {
        match self.store.register_user(user, self.clock.now()) {
            Ok(true) => info!(user_id = user.id, name = %user.display_name, "New user"),
            Ok(false) => {}
            Err(e) => warn!(user_id = user.id, error = %e, "Failed to register user"),
        }
    }

    pub fn handle_command(&self, user: &UserProfile, command: Command) -> Reply {
        match command {
            Command::Start => self.start(user),
            Command::Help => self.help(user),
            Command::Stats => self.stats(user),
        }
    }

    pub fn start(&self, user: &UserProfile) -> Reply {
        self.register(user);
        Reply::text(messages::welcome(&user.display_name))
    }

    pub fn help(&self, user: &UserProfile) -> Reply {
        self.register(user);
        Reply::text(messages::help(self.publisher.ttl()))
    }

    pub fn stats(&self, user: &UserProfile) -> Reply {
        self.touch(user);
        if self.admin_user_id != Some(user.id) {
            info!(user_id = user.id, "Refused /stats for non-admin");
            return Reply::text(messages::STATS_FORBIDDEN);
        }

        let day_start = self
            .clock
            .now()
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();
        match self.store.stats(day_start) {
            Ok(stats) => Reply::text(messages::stats(&stats)),
            Err(e) => {
                error!(error = %e, "Failed to load stats");
                Reply::text(messages::STATS_FAILED)
            }
        }
    }

    /// A URL-looking message: inspect it and offer qualities.
    pub async fn handle_text(
        &self,
        user: &UserProfile,
        text: &str,
        progress: &dyn Progress,
    ) -> Reply {
        self.touch(user);

        let url = text.trim();
        if !self.source.validate(url) {
            return Reply::text(messages::NOT_A_VIDEO_URL);
        }

        progress.update(messages::INSPECTING).await;
        let info = match self.source.inspect(url).await {
            Ok(info) => info,
            Err(e) => {
                warn!(
                    user_id = user.id,
                    source = self.source.name(),
                    url,
                    error = %e,
                    "Inspection failed"
                );
                return Reply::text(messages::INSPECT_FAILED);
            }
        };

        let options = quality_options(&info);
        if options.is_empty() {
            return Reply::text(messages::video_card(&info));
        }

        if self.state(user.id) == ConversationState::AwaitingQualityChoice {
            debug!(user_id = user.id, "Replacing earlier pending selection");
        }
        self.sessions.put(
            user.id,
            PendingSelection {
                url: url.to_string(),
                title: info.title.clone(),
                options: options.clone(),
            },
        );
        info!(
            user_id = user.id,
            url,
            options = options.len(),
            "Awaiting quality choice"
        );

        Reply {
            text: messages::video_card(&info),
            options,
        }
    }

    /// A quality option was picked: fetch, publish, record, deliver.
    pub async fn select(
        &self,
        user: &UserProfile,
        callback: &str,
        progress: &dyn Progress,
    ) -> Reply {
        self.touch(user);

        let Some(quality) = parse_callback(callback) else {
            warn!(user_id = user.id, callback, "Unrecognized quality option");
            return Reply {
                text: messages::UNKNOWN_CHOICE.to_string(),
                options: self
                    .sessions
                    .peek(user.id)
                    .map(|pending| pending.options)
                    .unwrap_or_default(),
            };
        };

        let Some(pending) = self.sessions.take(user.id) else {
            info!(user_id = user.id, "Quality picked without a pending selection");
            return Reply::text(messages::NO_PENDING_SELECTION);
        };

        progress.update(&messages::downloading(quality)).await;
        let fetched = match self.source.fetch(&pending.url, quality).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(
                    user_id = user.id,
                    source = self.source.name(),
                    url = %pending.url,
                    error = %e,
                    "Fetch failed"
                );
                return Reply::text(messages::FETCH_FAILED);
            }
        };

        progress.update(&messages::uploading(fetched.size_mb)).await;
        let published = match self
            .publisher
            .publish(&fetched.path, &fetched.file_name)
            .await
        {
            Ok(published) => published,
            Err(e) => {
                // The local file stays behind for the scratch sweep
                warn!(
                    user_id = user.id,
                    file = %fetched.path.display(),
                    error = %e,
                    "Publish failed"
                );
                return Reply::text(messages::PUBLISH_FAILED);
            }
        };

        self.record_download(user.id, &pending, quality, &fetched);
        info!(
            user_id = user.id,
            object_id = %published.object_id,
            uploaded_at = %published.uploaded_at,
            "Delivered link"
        );

        Reply::text(messages::delivered(
            &pending.title,
            quality,
            fetched.size_mb,
            &published.link,
            published.expires_at,
            self.publisher.ttl(),
        ))
    }

    fn record_download(
        &self,
        user_id: UserId,
        pending: &PendingSelection,
        quality: Quality,
        fetched: &FetchResult,
    ) {
        if let Err(e) = self.store.increment_downloads(user_id) {
            error!(user_id, error = %e, "Failed to increment download counter");
        }

        let record = DownloadRecord {
            user_id,
            url: pending.url.clone(),
            quality: quality.tag(),
            file_size_mb: fetched.size_mb,
            format: fetched.format.clone(),
            created_at: self.clock.now(),
        };
        if let Err(e) = self.store.log_download(&record) {
            error!(user_id, error = %e, "Failed to log download");
        }
    }
}
