use anyhow::Context;
use modrelay_core::auth::{reauthorize, ConsolePrompt};
use modrelay_core::config::Config;
use modrelay_core::reddit::RedditOAuth;
use std::path::Path;

/// Run the interactive grant and overwrite any stored credential.
pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let mut store = super::open_store(&config)?;
    let oauth = RedditOAuth::new(config.reddit.clone())?;

    reauthorize(&mut store, &oauth, &mut ConsolePrompt::stdio())
        .context("reddit authorization failed")?;
    println!("Authorized. Refresh token stored in {}.", config.store_path().display());
    Ok(())
}
