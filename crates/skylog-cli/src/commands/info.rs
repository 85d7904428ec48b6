use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use skylog_core::io::{read_header, record_from_header};
use skylog_core::session::ZoneTimezone;

use crate::summary::print_record;

#[derive(Args)]
pub struct InfoArgs {
    /// FITS or XISF file
    pub file: PathBuf,

    /// Also print every raw header keyword
    #[arg(long)]
    pub raw: bool,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let header = read_header(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let record = record_from_header(&args.file, &header, &ZoneTimezone::new())?;
    print_record(&record);

    if args.raw {
        let mut keys: Vec<_> = header.iter().collect();
        keys.sort_by(|a, b| a.0.cmp(b.0));
        println!();
        for (key, value) in keys {
            println!("  {key:<10}{value:?}");
        }
    }
    Ok(())
}
