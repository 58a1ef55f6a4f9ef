use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "modrelay.yaml";
pub const DEFAULT_STORE_FILE: &str = "modrelay.redb";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RedditConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub subreddit: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Host serving `/api/v1/authorize` and `/api/v1/access_token`.
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
    /// Host serving authenticated API calls.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_user_agent() -> String {
    format!("modrelay/{} (moderation queue relay)", env!("CARGO_PKG_VERSION"))
}

fn default_redirect_uri() -> String {
    "http://localhost:8080".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["read".to_string()]
}

fn default_auth_base() -> String {
    "https://www.reddit.com".to_string()
}

fn default_api_base() -> String {
    "https://oauth.reddit.com".to_string()
}

// ---------------------------------------------------------------------------
// DiscordConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook: String,
}

// ---------------------------------------------------------------------------
// PollConfig
// ---------------------------------------------------------------------------

/// What the poll loop does when a cycle fails with a transient error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Log and try again on the next interval.
    #[default]
    Retry,
    /// Stop the loop and surface the error.
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

fn default_interval_secs() -> u64 {
    10
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            on_error: ErrorPolicy::default(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_FILE)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub reddit: RedditConfig,
    pub discord: DiscordConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Directory of the loaded file; relative paths resolve against it.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: Config = serde_yaml::from_str(&data)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Absolute (or config-relative) location of the store file.
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            self.base_dir.join(&self.store.path)
        }
    }

    /// Check for values that parse but cannot work.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.reddit.client_id.trim().is_empty() {
            warnings.push(ConfigWarning::error("reddit.client_id is empty"));
        }
        if self.reddit.client_secret.trim().is_empty() {
            warnings.push(ConfigWarning::error("reddit.client_secret is empty"));
        }
        let subreddit = self.reddit.subreddit.trim();
        if subreddit.is_empty() {
            warnings.push(ConfigWarning::error("reddit.subreddit is empty"));
        } else if subreddit.starts_with("r/") || subreddit.starts_with("/r/") {
            warnings.push(ConfigWarning::error(format!(
                "reddit.subreddit '{subreddit}' should not include the r/ prefix"
            )));
        }
        if self.reddit.scopes.is_empty() {
            warnings.push(ConfigWarning::error(
                "reddit.scopes is empty; the modqueue needs at least 'read'",
            ));
        }

        let webhook = self.discord.webhook.trim();
        if webhook.is_empty() {
            warnings.push(ConfigWarning::error("discord.webhook is empty"));
        } else {
            match reqwest::Url::parse(webhook) {
                Err(e) => warnings.push(ConfigWarning::error(format!(
                    "discord.webhook is not a valid URL: {e}"
                ))),
                Ok(url) => {
                    let discord_host = url.host_str().is_some_and(|h| {
                        h == "discord.com" || h.ends_with(".discord.com") || h == "discordapp.com"
                    });
                    if !discord_host || !url.path().starts_with("/api/webhooks/") {
                        warnings.push(ConfigWarning::warning(format!(
                            "discord.webhook '{webhook}' does not look like a Discord webhook URL"
                        )));
                    }
                }
            }
        }

        if self.poll.interval_secs == 0 {
            warnings.push(ConfigWarning::error("poll.interval_secs must be at least 1"));
        } else if self.poll.interval_secs < 5 {
            warnings.push(ConfigWarning::warning(format!(
                "poll.interval_secs = {} is likely to hit API rate limits",
                self.poll.interval_secs
            )));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
reddit:
  client_id: abc
  client_secret: def
  subreddit: UndertaleYellow
discord:
  webhook: https://discord.com/api/webhooks/1/token
"#;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&write(&dir, MINIMAL)).unwrap();

        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.poll.on_error, ErrorPolicy::Retry);
        assert_eq!(config.reddit.scopes, vec!["read"]);
        assert_eq!(config.reddit.api_base, "https://oauth.reddit.com");
        assert_eq!(config.store_path(), dir.path().join(DEFAULT_STORE_FILE));
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn absolute_store_path_is_kept() {
        let dir = TempDir::new().unwrap();
        let abs = dir.path().join("elsewhere/state.redb");
        let body = format!("{MINIMAL}store:\n  path: {}\npoll:\n  on_error: exit\n", abs.display());
        let config = Config::load(&write(&dir, &body)).unwrap();
        assert_eq!(config.store_path(), abs);
        assert_eq!(config.poll.on_error, ErrorPolicy::Exit);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)), "{err:?}");
    }

    #[test]
    fn missing_section_is_yaml_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&write(&dir, "reddit:\n  client_id: a\n")).unwrap_err();
        assert!(matches!(err, RelayError::Yaml(_)), "{err:?}");
    }

    #[test]
    fn validate_flags_bad_values() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load(&write(&dir, MINIMAL)).unwrap();
        config.reddit.client_secret = String::new();
        config.reddit.subreddit = "r/foo".into();
        config.discord.webhook = "https://example.com/hook".into();
        config.poll.interval_secs = 2;

        let warnings = config.validate();
        let errors: Vec<_> = warnings.iter().filter(|w| w.level == WarnLevel::Error).collect();
        assert_eq!(errors.len(), 2, "{warnings:?}");
        assert!(warnings.iter().any(|w| w.message.contains("does not look like")));
        assert!(warnings.iter().any(|w| w.message.contains("rate limits")));
    }

    #[test]
    fn zero_interval_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load(&write(&dir, MINIMAL)).unwrap();
        config.poll.interval_secs = 0;
        assert!(config
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("interval")));
    }
}
