use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use rookery_core::cli::{Cli, Commands};
use rookery_core::commands;

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new().filter_level(level_for(cli.verbose)).init();

    match &cli.command {
        Commands::Lidar(args) => commands::lidar(args),
        Commands::Dedupe(args) => commands::dedupe(args),
        Commands::Aoi(args) => commands::aoi(args),
        Commands::Fuse(args) => commands::fuse(args),
    }
}
