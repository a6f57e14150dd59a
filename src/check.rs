//! `provender check` — device config validation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use provender::config::DeviceConfig;

/// Arguments for `provender check`.
#[derive(Args)]
pub struct CheckArgs {
    /// Device config TOML
    #[arg(long, value_name = "FILE", env = "PROVENDER_CONFIG")]
    pub config: PathBuf,
}

/// Load and validate the config, reporting the first error.
pub fn run(args: &CheckArgs) -> Result<()> {
    let cfg = DeviceConfig::load(&args.config)?;
    println!(
        "OK: {} ({} partitions, {} sepolicy source dirs)",
        cfg.device,
        cfg.partitions.len(),
        cfg.sepolicy.source_dirs.len()
    );
    Ok(())
}
