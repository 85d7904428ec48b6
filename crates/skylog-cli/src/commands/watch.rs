use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use skylog_core::ingest::{EventBus, FileEvent, FolderWatcher, Ingestor, Subscription};
use skylog_core::progress::NoOpReporter;
use skylog_core::session::lookup_for;
use tracing::{info, warn};

use super::AppContext;

#[derive(Args)]
pub struct WatchArgs {
    /// Poll interval in milliseconds
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Runs until interrupted.
pub fn run(args: &WatchArgs, ctx: &AppContext) -> Result<()> {
    let folders = ctx.store.selected_folders()?;
    if folders.is_empty() {
        bail!("No folders selected; use `skylog folders add <DIR>`");
    }
    let interval =
        Duration::from_millis(args.interval.unwrap_or(ctx.config.watch.poll_interval_ms));

    let timezone = lookup_for(&ctx.config.timezone);
    let ingestor = Ingestor::new(ctx.store.clone(), &ctx.config.ingest, timezone)?;

    // Catch up on anything that arrived while we were not watching.
    ingestor.scan_folders(&folders, &NoOpReporter)?;

    let stop = Arc::new(AtomicBool::new(false));
    stop_on_interrupt(Arc::clone(&stop))?;

    let bus = Arc::new(EventBus::<FileEvent>::new());
    let events = bus.subscribe();
    let watcher = FolderWatcher::new(
        folders.clone(),
        ingestor.scanner().clone(),
        Arc::clone(&bus),
        ctx.store.known_filenames()?,
    );
    let watcher_stop = Arc::clone(&stop);
    let handle = std::thread::Builder::new()
        .name("skylog-watch".into())
        .spawn(move || watcher.run(interval, watcher_stop))?;

    println!("Watching {} folder(s), Ctrl-C to stop", folders.len());
    drain_until_stopped(&events, &stop, interval, |paths| {
        let summary = ingestor.ingest_paths(paths, &NoOpReporter);
        info!(inserted = summary.inserted, "ingested new files");
        if summary.inserted > 0 {
            println!("Ingested {} new image(s)", summary.inserted);
        }
    });

    println!("Stopping");
    if handle.join().is_err() {
        warn!("folder watcher panicked");
    }
    ingestor.shutdown();
    Ok(())
}

/// Set `stop` on Ctrl-C.
fn stop_on_interrupt(stop: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::Builder::new()
        .name("skylog-signal".into())
        .spawn(move || {
            match runtime.block_on(tokio::signal::ctrl_c()) {
                Ok(()) => stop.store(true, Ordering::Relaxed),
                Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
            }
        })?;
    Ok(())
}

/// Hand each burst of events to `ingest` until `stop` is set. `stop` is
/// checked at least once per `tick`.
fn drain_until_stopped(
    events: &Subscription<FileEvent>,
    stop: &AtomicBool,
    tick: Duration,
    mut ingest: impl FnMut(Vec<PathBuf>),
) {
    while !stop.load(Ordering::Relaxed) {
        let Some(first) = events.recv_timeout(tick) else {
            continue;
        };
        let mut paths = vec![first.path];
        paths.extend(events.drain().into_iter().map(|e| e.path));
        ingest(paths);
    }
}
