use anyhow::{anyhow, Context, Result};
use clap::Args;
use skylog_core::record::{ImageType, StoredImage};
use skylog_core::store::{Facet, ImageFilter};

use crate::summary::{print_facet_values, print_images};

use super::AppContext;

/// Image selection shared by the commands that work on a set of images.
#[derive(Args)]
pub struct SelectionArgs {
    /// Select by facet, e.g. --filter "target=M 31" --filter night=2023-10-01.
    /// Repeating a facet accepts any of its values.
    #[arg(long = "filter", value_name = "FACET=VALUE")]
    pub filters: Vec<String>,

    /// Restrict to image types, e.g. --type light
    #[arg(long = "type", value_name = "TYPE")]
    pub types: Vec<String>,
}

impl SelectionArgs {
    pub fn to_filter(&self) -> Result<ImageFilter> {
        let mut filter = ImageFilter::new();
        for clause in &self.filters {
            let (facet, value) = ImageFilter::parse_clause(clause)?;
            filter.add(facet, value);
        }
        let types = self
            .types
            .iter()
            .map(|t| ImageType::from_header(t).ok_or_else(|| anyhow!("Unknown image type {t:?}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(filter.with_types(&types))
    }

    pub fn select(&self, ctx: &AppContext) -> Result<Vec<StoredImage>> {
        let filter = self.to_filter()?;
        ctx.store
            .filter_images(&filter)
            .context("Failed to select images")
    }
}

#[derive(Args)]
pub struct ImagesArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// List the values a facet takes instead of images
    #[arg(long, value_name = "FACET", conflicts_with_all = ["filters", "types"])]
    pub list: Option<String>,
}

pub fn run(args: &ImagesArgs, ctx: &AppContext) -> Result<()> {
    if let Some(facet) = &args.list {
        let facet: Facet = facet.parse()?;
        print_facet_values(facet, &ctx.store.facet_values(facet)?);
        return Ok(());
    }
    print_images(&args.selection.select(ctx)?);
    Ok(())
}
