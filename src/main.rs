use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod bot;
mod clock;
mod config;
mod conversation;
mod db;
mod janitor;
mod media;
mod storage;
mod utils;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<String>,
}

fn get_config_path(args: &Args) -> Option<String> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var("CONFIG_FILE") {
        return Some(path);
    }

    let mut candidates = Vec::new();
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        candidates.push(format!("{}/clipdrop/config.toml", xdg_config_home));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(format!("{}/.config/clipdrop/config.toml", home.display()));
    }

    candidates
        .into_iter()
        .find(|path| std::path::Path::new(path).exists())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = get_config_path(&args);
    let config = config::Config::load(config_path.as_deref())?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if config.get_logging_format() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    info!("Starting clipdrop...");
    match &config_path {
        Some(path) => info!("Loaded config from: {}", path),
        None => info!("No config file found, using defaults and environment"),
    }

    config.validate().context("Invalid configuration")?;
    bot::run(config).await
}
