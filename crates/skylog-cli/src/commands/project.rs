use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use skylog_core::calibration::CalibrationResolver;
use skylog_core::project::ProjectAssistant;

use crate::summary::{print_coverage, print_project};

use super::images::SelectionArgs;
use super::AppContext;

#[derive(Args)]
pub struct ProjectArgs {
    /// Directory to lay the project out in
    pub dir: PathBuf,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Dark/bias validity window, e.g. "3 months" or "none"
    #[arg(long)]
    pub validity: Option<String>,
}

/// Link the selected lights and their calibration frames into a
/// `Night_<date>` tree under the project directory.
pub fn run(args: &ProjectArgs, ctx: &AppContext) -> Result<()> {
    let ids: Vec<_> = args.selection.select(ctx)?.iter().map(|i| i.id).collect();
    let validity = ctx.validity_window(args.validity.as_deref())?;
    let assistant = ProjectAssistant::new(
        ctx.store.clone(),
        CalibrationResolver::new(ctx.store.clone(), validity),
    );
    let layout = assistant
        .prepare(&ids, &args.dir)
        .with_context(|| format!("Failed to prepare project in {}", args.dir.display()))?;
    print_coverage(&layout.coverage);
    print_project(&layout);
    Ok(())
}
