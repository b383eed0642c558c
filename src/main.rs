use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chat_scribe::{
    source_from_env, ActionExecutor, Formatter, ProcessedLedger, ThreadPacer, Watcher,
    WatcherConfig,
};
use progress_store::{progress_file, ProgressStore};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chat_scribe=debug")),
        )
        .init();

    let config = WatcherConfig::load().context("loading configuration")?;
    tracing::info!(
        source = %config.source,
        repo_root = %config.repo_root,
        conversation = %config.conversation,
        "chat_scribe starting"
    );

    let mut executor = ActionExecutor::new(&config.repo_root)
        .map_err(anyhow::Error::msg)
        .context("preparing repository root")?;
    if let Some(formatter) = &config.formatter {
        executor = executor.with_formatter(
            Formatter::new(&formatter.program)
                .with_args(formatter.args.clone())
                .with_timeout(Duration::from_secs(formatter.timeout_sec)),
        );
    }

    let store = ProgressStore::open(progress_file(executor.repo_root()));
    let ledger = ProcessedLedger::new(store, &config.conversation);

    let mut source = source_from_env(&config)
        .map_err(anyhow::Error::msg)
        .context("starting transcript source")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))
        .context("registering SIGINT handler")?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))
        .context("registering SIGTERM handler")?;

    let mut watcher = Watcher::new(executor, ledger)
        .with_stability_delay(config.stability_delay())
        .with_cycle_delay(config.cycle_delay());

    watcher.run(source.as_mut(), &mut ThreadPacer, &shutdown);

    Ok(())
}
