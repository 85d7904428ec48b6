use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use skylog_core::ingest::Ingestor;
use skylog_core::session::lookup_for;

use crate::progress::BarReporter;
use crate::summary::print_scan_summary;

use super::AppContext;

#[derive(Args)]
pub struct ScanArgs {
    /// Folders to scan (default: the selected folders)
    pub folders: Vec<PathBuf>,

    /// Records per store transaction
    #[arg(long)]
    pub batch_size: Option<usize>,
}

pub fn run(args: &ScanArgs, ctx: &AppContext) -> Result<()> {
    let folders = if args.folders.is_empty() {
        ctx.store.selected_folders()?
    } else {
        args.folders
            .iter()
            .map(|folder| {
                folder
                    .canonicalize()
                    .with_context(|| format!("Cannot access {}", folder.display()))
            })
            .collect::<Result<Vec<_>>>()?
    };
    if folders.is_empty() {
        bail!("No folders given and none selected; use `skylog folders add <DIR>`");
    }

    let mut ingest = ctx.config.ingest.clone();
    if let Some(batch_size) = args.batch_size {
        ingest.batch_size = batch_size;
    }
    let timezone = lookup_for(&ctx.config.timezone);
    let ingestor = Ingestor::new(ctx.store.clone(), &ingest, timezone)?;

    let reporter = BarReporter::new();
    let summary = ingestor.scan_folders(&folders, &reporter)?;
    ingestor.shutdown();

    print_scan_summary(&folders, &summary);
    Ok(())
}
