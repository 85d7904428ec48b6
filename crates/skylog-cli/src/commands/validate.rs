use anyhow::Result;
use clap::Args;
use skylog_core::calibration::CalibrationResolver;
use skylog_core::project::ProjectAssistant;

use crate::summary::print_coverage;

use super::images::SelectionArgs;
use super::AppContext;

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Dark/bias validity window, e.g. "3 months" or "none"
    #[arg(long)]
    pub validity: Option<String>,
}

/// Check a selection of lights for one target and calibration coverage.
pub fn run(args: &ValidateArgs, ctx: &AppContext) -> Result<()> {
    let ids: Vec<_> = args.selection.select(ctx)?.iter().map(|i| i.id).collect();
    let validity = ctx.validity_window(args.validity.as_deref())?;
    let assistant = ProjectAssistant::new(
        ctx.store.clone(),
        CalibrationResolver::new(ctx.store.clone(), validity),
    );
    print_coverage(&assistant.validate(&ids)?);
    Ok(())
}
