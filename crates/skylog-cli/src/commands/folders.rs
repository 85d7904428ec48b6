use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::AppContext;

#[derive(Args)]
pub struct FoldersArgs {
    #[command(subcommand)]
    pub action: FolderAction,
}

#[derive(Subcommand)]
pub enum FolderAction {
    /// List selected folders
    List,
    /// Select a folder for scanning and watching
    Add { folder: PathBuf },
    /// Deselect a folder
    Remove { folder: PathBuf },
}

pub fn run(args: &FoldersArgs, ctx: &AppContext) -> Result<()> {
    let mut folders = ctx.store.selected_folders()?;

    match &args.action {
        FolderAction::List => {
            if folders.is_empty() {
                println!("No folders selected");
            }
            for folder in &folders {
                println!("{}", folder.display());
            }
            return Ok(());
        }
        FolderAction::Add { folder } => {
            let folder = folder
                .canonicalize()
                .with_context(|| format!("Cannot access {}", folder.display()))?;
            if !folders.contains(&folder) {
                println!("Added {}", folder.display());
                folders.push(folder);
            }
        }
        FolderAction::Remove { folder } => {
            let canonical = folder.canonicalize().unwrap_or_else(|_| folder.clone());
            let before = folders.len();
            folders.retain(|f| f != &canonical && f != folder);
            if folders.len() < before {
                println!("Removed {}", folder.display());
            } else {
                println!("{} was not selected", folder.display());
            }
        }
    }

    ctx.store.set_selected_folders(&folders)?;
    Ok(())
}
