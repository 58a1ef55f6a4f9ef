use crate::output::{print_json, print_report};
use anyhow::{anyhow, Context};
use modrelay_core::reddit::RedditOAuth;
use modrelay_core::store::Store;
use std::path::Path;

/// One reconciliation cycle. Never prompts: without a stored credential the
/// operator has to run `modrelay auth` first.
pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_checked(config_path)?;
    let store = super::open_store(&config)?;
    let refresh_token = store
        .get_credential()?
        .ok_or_else(|| anyhow!("no reddit credential stored; run `modrelay auth` first"))?;
    let oauth = RedditOAuth::new(config.reddit.clone())?;

    let (mut engine, mut source) = super::assemble(&config, store, oauth, refresh_token);
    let report = engine
        .run_cycle(&mut source)
        .context("reconciliation cycle failed")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
        println!("{} item(s) tracked.", engine.store().len()?);
    }
    Ok(())
}
