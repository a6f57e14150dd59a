//! `provender presigned` — standalone presigned classification.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use provender::config::DeviceConfig;
use provender::model::types::PRESIGNED_SEINFO;
use provender::resolve::presigned::{
    classify_packages, parse_package_list, scan_seapp_policies,
};

/// Arguments for `provender presigned`.
#[derive(Args)]
pub struct PresignedArgs {
    /// Device config TOML (supplies the policy source directories)
    #[arg(long, value_name = "FILE", env = "PROVENDER_CONFIG")]
    pub config: PathBuf,

    /// Discovered-packages list: one "package path" pair per line
    #[arg(long, value_name = "FILE")]
    pub packages: PathBuf,
}

/// Classify the discovered packages and print the presigned paths.
pub fn run(args: &PresignedArgs) -> Result<()> {
    let cfg = DeviceConfig::load(&args.config)
        .with_context(|| format!("loading device config {}", args.config.display()))?;

    let text = std::fs::read_to_string(&args.packages)
        .with_context(|| format!("reading package list {}", args.packages.display()))?;
    let discovered = parse_package_list(&text);

    let policy = scan_seapp_policies(&cfg.sepolicy.source_dirs, PRESIGNED_SEINFO)
        .context("scanning seapp policies")?;
    for path in classify_packages(&policy, &discovered) {
        println!("{path}");
    }
    Ok(())
}
