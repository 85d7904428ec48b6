use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;

use crate::summary::print_sky;

use super::AppContext;

#[derive(Args)]
pub struct SkyArgs {
    /// Night to show (YYYY-MM-DD), defaults to the latest
    pub date: Option<String>,
}

/// Sky brightness over one night.
pub fn run(args: &SkyArgs, ctx: &AppContext) -> Result<()> {
    let night = match &args.date {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("Invalid date {date:?}, expected YYYY-MM-DD"))?,
        None => match ctx.store.latest_session()? {
            Some(night) => night,
            None => bail!("No sessions yet; use `skylog scan <DIR>`"),
        },
    };
    print_sky(night, &ctx.store.sky_brightness(night)?);
    Ok(())
}
