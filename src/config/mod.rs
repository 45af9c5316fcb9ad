use crate::janitor::JanitorSettings;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DiscordSettings {
    pub token: Option<String>,
    /// The only user allowed to run `/stats`.
    pub admin_user_id: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, R2, ...).
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub staging_folder: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            staging_folder: "clipdrop_staging".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("clipdrop.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathSettings {
    pub download_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            temp_dir: PathBuf::from("temp"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LinkSettings {
    pub ttl_secs: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JanitorConfig {
    pub expired_interval_secs: u64,
    pub scratch_interval_secs: u64,
    /// Defaults to the scratch interval. Zero sweeps unconditionally.
    pub scratch_min_age_secs: Option<u64>,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            expired_interval_secs: 600,
            scratch_interval_secs: 1800,
            scratch_min_age_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceSettings {
    pub metadata_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: 30,
            download_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingSettings {
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub discord: DiscordSettings,
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
    pub paths: PathSettings,
    pub links: LinkSettings,
    pub janitor: JanitorConfig,
    pub source: SourceSettings,
    pub logging: LoggingSettings,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// File (if any) first, then environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = lookup("DISCORD_TOKEN") {
            self.discord.token = Some(token);
        }
        if let Some(admin) = lookup("ADMIN_USER_ID") {
            self.discord.admin_user_id = Some(
                admin
                    .trim()
                    .parse()
                    .with_context(|| format!("ADMIN_USER_ID is not a user id: {}", admin))?,
            );
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(bucket) = lookup("S3_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Some(endpoint) = lookup("S3_ENDPOINT") {
            self.storage.endpoint = Some(endpoint);
        }
        if let Some(ttl) = lookup("LINK_TTL_SECS") {
            self.links.ttl_secs = ttl
                .trim()
                .parse()
                .with_context(|| format!("LINK_TTL_SECS is not a number: {}", ttl))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord_token().is_none() {
            bail!("Discord token is missing (set [discord] token or DISCORD_TOKEN)");
        }
        if self.storage.bucket.trim().is_empty() {
            bail!("Storage bucket is missing (set [storage] bucket or S3_BUCKET)");
        }
        if self.storage.staging_folder.trim_matches('/').is_empty() {
            bail!("Staging folder name must not be empty");
        }
        if self.links.ttl_secs == 0 {
            bail!("Link TTL must be positive");
        }
        if self.janitor.expired_interval_secs == 0 || self.janitor.scratch_interval_secs == 0 {
            bail!("Janitor intervals must be positive");
        }
        Ok(())
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }

    pub fn discord_token(&self) -> Option<&str> {
        self.discord
            .token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }

    pub fn link_ttl(&self) -> Duration {
        Duration::from_secs(self.links.ttl_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.source.metadata_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.source.download_timeout_secs)
    }

    pub fn janitor_settings(&self) -> JanitorSettings {
        let scratch_interval = self.janitor.scratch_interval_secs;
        JanitorSettings {
            expired_interval: Duration::from_secs(self.janitor.expired_interval_secs),
            scratch_interval: Duration::from_secs(scratch_interval),
            scratch_min_age: Duration::from_secs(
                self.janitor.scratch_min_age_secs.unwrap_or(scratch_interval),
            ),
            scratch_dirs: vec![self.paths.download_dir.clone(), self.paths.temp_dir.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.links.ttl_secs, 3600);
        assert_eq!(config.storage.staging_folder, "clipdrop_staging");
        assert_eq!(config.get_logging_format(), "json");

        let janitor = config.janitor_settings();
        assert_eq!(janitor.expired_interval, Duration::from_secs(600));
        assert_eq!(janitor.scratch_interval, Duration::from_secs(1800));
        assert_eq!(janitor.scratch_min_age, Duration::from_secs(1800));
        assert_eq!(
            janitor.scratch_dirs,
            vec![PathBuf::from("downloads"), PathBuf::from("temp")]
        );
    }

    #[test]
    fn test_from_toml_partial() {
        let config = Config::from_toml(
            r#"
            [discord]
            token = "abc"
            admin_user_id = 42

            [storage]
            bucket = "clips"
            endpoint = "http://localhost:9000"

            [links]
            ttl_secs = 600

            [janitor]
            scratch_min_age_secs = 0

            [logging]
            format = "pretty"
            "#,
        )
        .unwrap();

        assert_eq!(config.discord_token(), Some("abc"));
        assert_eq!(config.discord.admin_user_id, Some(42));
        assert_eq!(config.storage.bucket, "clips");
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.link_ttl(), Duration::from_secs(600));
        assert_eq!(config.janitor_settings().scratch_min_age, Duration::ZERO);
        assert_eq!(config.get_logging_format(), "pretty");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("DISCORD_TOKEN", "from-env"),
                ("ADMIN_USER_ID", " 7 "),
                ("S3_BUCKET", "env-bucket"),
                ("DATABASE_PATH", "/var/lib/clipdrop/db.sqlite"),
                ("LINK_TTL_SECS", "120"),
            ]))
            .unwrap();

        assert_eq!(config.discord_token(), Some("from-env"));
        assert_eq!(config.discord.admin_user_id, Some(7));
        assert_eq!(config.storage.bucket, "env-bucket");
        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/clipdrop/db.sqlite")
        );
        assert_eq!(config.links.ttl_secs, 120);
    }

    #[test]
    fn test_env_override_rejects_bad_admin_id() {
        let mut config = Config::default();
        assert!(config
            .apply_env_overrides(env(&[("ADMIN_USER_ID", "admin")]))
            .is_err());
    }

    #[test]
    fn test_validate_requires_token_and_bucket() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.discord.token = Some("abc".to_string());
        assert!(config.validate().is_err());

        config.storage.bucket = "clips".to_string();
        assert!(config.validate().is_ok());

        config.links.ttl_secs = 0;
        assert!(config.validate().is_err());
    }
}
