use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use skylog_core::analysis::ImageAnalysis;
use skylog_core::record::{ImageId, ImageType};

use crate::progress::BarReporter;
use crate::summary::print_analysis_report;

use super::AppContext;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Image ids to analyze
    pub ids: Vec<ImageId>,

    /// Analyze every light frame of one night (YYYY-MM-DD)
    #[arg(long)]
    pub session: Option<String>,

    /// Calibrate before measuring
    #[arg(long)]
    pub calibrate: bool,

    /// Dark/bias validity window for calibration, e.g. "3 months" or "none"
    #[arg(long)]
    pub validity: Option<String>,
}

pub fn run(args: &AnalyzeArgs, ctx: &AppContext) -> Result<()> {
    let mut ids = args.ids.clone();
    if let Some(date) = &args.session {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("Invalid date {date:?}, expected YYYY-MM-DD"))?;
        ids.extend(
            ctx.store
                .session_images(date)?
                .into_iter()
                .filter(|i| i.record.image_type == Some(ImageType::Light))
                .map(|i| i.id),
        );
    }
    if ids.is_empty() {
        bail!("Nothing to analyze; pass image ids or --session");
    }

    let mut analysis = ImageAnalysis::new(ctx.store.clone(), &ctx.config.analysis);
    if args.calibrate {
        let validity = ctx.validity_window(args.validity.as_deref())?;
        analysis = analysis.with_calibrator(ctx.calibrator(validity));
    }

    let report = analysis.analyze_many(&ids, args.calibrate, &BarReporter::new());
    print_analysis_report(&report);
    Ok(())
}
