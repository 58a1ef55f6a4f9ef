pub mod auth;
pub mod config;
pub mod once;
pub mod run;
pub mod tracked;

use anyhow::{bail, Context};
use modrelay_core::config::{Config, WarnLevel};
use modrelay_core::discord::DiscordWebhook;
use modrelay_core::reconcile::Reconciler;
use modrelay_core::reddit::{RedditModQueue, RedditOAuth};
use modrelay_core::store::RedbStore;
use std::path::Path;

/// Load the config and refuse to continue when it has errors.
pub fn load_checked(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => bail!("invalid config: {}", w.message),
        }
    }
    Ok(config)
}

pub fn open_store(config: &Config) -> anyhow::Result<RedbStore> {
    let path = config.store_path();
    RedbStore::open(&path).with_context(|| format!("failed to open store at {}", path.display()))
}

/// Build the engine and the queue source from a ready refresh token.
pub fn assemble(
    config: &Config,
    store: RedbStore,
    oauth: RedditOAuth,
    refresh_token: String,
) -> (Reconciler<RedbStore, DiscordWebhook>, RedditModQueue) {
    let channel = DiscordWebhook::new(config.discord.webhook.clone());
    (
        Reconciler::new(store, channel),
        RedditModQueue::new(oauth, refresh_token),
    )
}
