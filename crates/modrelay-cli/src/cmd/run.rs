use crate::output::print_json;
use anyhow::Context;
use modrelay_core::auth::{ensure_credential, ConsolePrompt};
use modrelay_core::poll::{shutdown_channel, PollLoop, ShutdownHandle};
use modrelay_core::reddit::RedditOAuth;
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_checked(config_path)?;
    let mut store = super::open_store(&config)?;
    let oauth = RedditOAuth::new(config.reddit.clone())?;

    let refresh_token = ensure_credential(&mut store, &oauth, &mut ConsolePrompt::stdio())
        .context("reddit authorization failed")?;

    let (mut engine, mut source) = super::assemble(&config, store, oauth, refresh_token);
    let (handle, shutdown) = shutdown_channel();
    spawn_signal_listener(handle)?;

    tracing::info!(
        subreddit = %config.reddit.subreddit,
        store = %config.store_path().display(),
        "relay running; press Ctrl-C to stop"
    );
    let summary = PollLoop::new(config.poll.interval(), config.poll.on_error)
        .run(&mut engine, &mut source, &shutdown)
        .context("polling stopped on error")?;
    drop(engine.into_store());

    if json {
        print_json(&summary)?;
    } else {
        println!(
            "Stopped after {} cycle(s), {} failed.",
            summary.cycles, summary.failed_cycles
        );
    }
    Ok(())
}

/// Forward Ctrl-C (and SIGTERM on unix) to the poll loop from a helper
/// thread with its own single-threaded runtime.
fn spawn_signal_listener(handle: ShutdownHandle) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("signal-listener".into())
        .spawn(move || {
            rt.block_on(async {
                wait_for_signal().await;
                tracing::info!("interrupt received; finishing the current cycle");
                handle.trigger();
            })
        })?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
