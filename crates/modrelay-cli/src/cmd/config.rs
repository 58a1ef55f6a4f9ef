use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use modrelay_core::config::{Config, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the config for common mistakes
    Validate,

    /// Print the effective config (secrets masked)
    Show,
}

pub fn run(config_path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    match subcmd {
        ConfigSubcommand::Validate => validate(&config, json),
        ConfigSubcommand::Show => show(config, json),
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(mut config: Config, json: bool) -> anyhow::Result<()> {
    let store_path = config.store_path();
    config.reddit.client_secret = mask(&config.reddit.client_secret);
    config.discord.webhook = mask_webhook(&config.discord.webhook);

    if json {
        let mut value = serde_json::to_value(&config)?;
        value["store"]["resolved_path"] = serde_json::json!(store_path);
        return print_json(&value);
    }
    println!("subreddit:     r/{}", config.reddit.subreddit);
    println!("client id:     {}", config.reddit.client_id);
    println!("client secret: {}", config.reddit.client_secret);
    println!("scopes:        {}", config.reddit.scopes.join(" "));
    println!("webhook:       {}", config.discord.webhook);
    println!("interval:      {}s", config.poll.interval_secs);
    println!("on error:      {:?}", config.poll.on_error);
    println!("store:         {}", store_path.display());
    Ok(())
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

/// Keep the webhook id, hide its token (the last path segment).
fn mask_webhook(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((head, token)) if !token.is_empty() => format!("{head}/{}", mask(token)),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_webhook_hides_token_only() {
        assert_eq!(
            mask_webhook("https://discord.com/api/webhooks/123/abcDEF"),
            "https://discord.com/api/webhooks/123/********"
        );
        assert_eq!(mask_webhook(""), "");
    }
}
