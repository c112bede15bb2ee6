use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fabric server updater: check and apply mod/loader updates")]
pub struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
    /// Assume yes for every prompt
    #[arg(short = 'y', long = "yes")]
    pub assume_yes: bool,
    /// Apply updates (default is check/report only)
    #[arg(long)]
    pub apply: bool,
    /// Override the target Minecraft version (default: latest stable)
    #[arg(long = "mc-version")]
    pub mc_version: Option<String>,
}
