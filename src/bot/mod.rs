pub mod discord;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::conversation::{Conversation, InMemorySessions};
use crate::db::{SqliteStore, Store};
use crate::janitor::Janitor;
use crate::media::YtDlpSource;
use crate::storage::{ObjectStorage, Publisher, S3Storage};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wires the services together, starts the janitor and runs the bot until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let token = config
        .discord_token()
        .context("Discord token is missing")?
        .to_string();

    for dir in [&config.paths.download_dir, &config.paths.temp_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    if let Some(parent) = config
        .database
        .path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&config.database.path).with_context(|| {
            format!("Failed to open database {}", config.database.path.display())
        })?,
    );
    let storage: Arc<dyn ObjectStorage> =
        Arc::new(S3Storage::new(&config.storage).context("Failed to configure object storage")?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if !YtDlpSource::check_availability().await {
        warn!("yt-dlp or ffmpeg is not available, downloads will fail");
    }
    let source = Arc::new(YtDlpSource::new(
        config.paths.download_dir.clone(),
        config.paths.temp_dir.clone(),
        config.metadata_timeout(),
        config.download_timeout(),
    ));

    let publisher = Arc::new(Publisher::new(
        storage.clone(),
        store.clone(),
        clock.clone(),
        config.storage.staging_folder.clone(),
        config.link_ttl(),
    ));
    let conversation = Arc::new(Conversation::new(
        source,
        publisher,
        store.clone(),
        Arc::new(InMemorySessions::new()),
        clock.clone(),
        config.discord.admin_user_id,
    ));
    if config.discord.admin_user_id.is_none() {
        warn!("No admin user configured, /stats is disabled");
    }

    let shutdown = CancellationToken::new();
    let janitor = Arc::new(Janitor::new(
        storage,
        store,
        clock,
        config.janitor_settings(),
    ));
    let janitor_tasks = janitor.spawn(shutdown.clone());

    let bot = discord::DiscordBot::new(&token, conversation)
        .await
        .context("Failed to start Discord bot")?;

    let result = tokio::select! {
        result = bot.run(&token, shutdown.clone()) => result,
        signal = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            signal.context("Failed to listen for Ctrl-C")
        }
    };

    shutdown.cancel();
    for task in janitor_tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Janitor task ended abnormally");
        }
    }
    info!("Stopped");

    result
}
