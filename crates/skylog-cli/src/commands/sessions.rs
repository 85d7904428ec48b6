use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use skylog_core::session::group_sessions;

use crate::summary::{print_session_images, print_sessions};

use super::AppContext;

#[derive(Args)]
pub struct SessionsArgs {
    /// Show the images of one night (YYYY-MM-DD)
    pub date: Option<String>,
}

pub fn run(args: &SessionsArgs, ctx: &AppContext) -> Result<()> {
    match &args.date {
        Some(date) => {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date {date:?}, expected YYYY-MM-DD"))?;
            let images = ctx.store.session_images(date)?;
            print_session_images(date, &images);
        }
        None => {
            let targets: HashMap<NaiveDate, Vec<String>> =
                group_sessions(ctx.store.all_images()?)
                    .iter()
                    .map(|night| {
                        let names = night.targets().into_iter().map(String::from).collect();
                        (night.date, names)
                    })
                    .collect();
            print_sessions(&ctx.store.night_sessions()?, &targets);
        }
    }
    Ok(())
}
