mod commands;
mod progress;
mod summary;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::AppContext;

#[derive(Parser)]
#[command(name = "skylog", about = "Astrophotography session log and calibration tool")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest new image files from folders
    Scan(commands::scan::ScanArgs),
    /// Watch the selected folders and ingest files as they appear
    Watch(commands::watch::WatchArgs),
    /// Manage the selected folder list
    Folders(commands::folders::FoldersArgs),
    /// List observing nights
    Sessions(commands::sessions::SessionsArgs),
    /// List images by night, target, telescope, instrument or filter
    Images(commands::images::ImagesArgs),
    /// Check a selection for one target and calibration coverage
    Validate(commands::validate::ValidateArgs),
    /// Link a selection and its calibration frames into a project tree
    Project(commands::project::ProjectArgs),
    /// Show sky brightness over a night
    Sky(commands::sky::SkyArgs),
    /// Show the calibration frames resolved for a light
    Calibration(commands::calibration::CalibrationArgs),
    /// Measure FWHM, SNR and eccentricity of images
    Analyze(commands::analyze::AnalyzeArgs),
    /// Show the header of an image file
    Info(commands::info::InfoArgs),
    /// Print or save the default config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Config(args) = &cli.command {
        return commands::config::run(args);
    }
    if let Commands::Info(args) = &cli.command {
        return commands::info::run(args);
    }

    let ctx = AppContext::load(cli.config.as_deref(), cli.database)?;
    match &cli.command {
        Commands::Scan(args) => commands::scan::run(args, &ctx),
        Commands::Watch(args) => commands::watch::run(args, &ctx),
        Commands::Folders(args) => commands::folders::run(args, &ctx),
        Commands::Sessions(args) => commands::sessions::run(args, &ctx),
        Commands::Images(args) => commands::images::run(args, &ctx),
        Commands::Validate(args) => commands::validate::run(args, &ctx),
        Commands::Project(args) => commands::project::run(args, &ctx),
        Commands::Sky(args) => commands::sky::run(args, &ctx),
        Commands::Calibration(args) => commands::calibration::run(args, &ctx),
        Commands::Analyze(args) => commands::analyze::run(args, &ctx),
        Commands::Info(_) | Commands::Config(_) => Ok(()),
    }
}
