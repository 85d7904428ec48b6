use anyhow::Result;
use clap::Args;
use skylog_core::calibration::CalibrationResolver;
use skylog_core::record::ImageId;

use crate::summary::print_calibration_set;

use super::AppContext;

#[derive(Args)]
pub struct CalibrationArgs {
    /// Image id of the light frame
    pub id: ImageId,

    /// Dark/bias validity window, e.g. "3 months" or "none"
    #[arg(long)]
    pub validity: Option<String>,
}

pub fn run(args: &CalibrationArgs, ctx: &AppContext) -> Result<()> {
    let validity = ctx.validity_window(args.validity.as_deref())?;
    let resolver = CalibrationResolver::new(ctx.store.clone(), validity);
    let set = resolver.resolve(args.id)?;
    print_calibration_set(&ctx.store, &set)?;
    Ok(())
}
