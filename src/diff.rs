//! `provender diff` — the full resolver pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use provender::config::DeviceConfig;
use provender::pipeline::{resolve_device, RunOptions};
use provender::report::{self, OutputFormat};
use provender::resolve::overrides::{load_module_table, ConflictPolicy};
use provender::resolve::presigned::parse_package_list;

/// Arguments for `provender diff`.
#[derive(Args)]
pub struct DiffArgs {
    /// Extracted stock image root
    #[arg(long, value_name = "DIR")]
    pub stock: PathBuf,

    /// Extracted custom image root
    #[arg(long, value_name = "DIR")]
    pub custom: PathBuf,

    /// Device config TOML
    #[arg(long, value_name = "FILE", env = "PROVENDER_CONFIG")]
    pub config: PathBuf,

    /// module-info.json from the custom build (enables override resolution)
    #[arg(long, value_name = "FILE")]
    pub modules: Option<PathBuf>,

    /// Discovered-packages list: one "package path" pair per line (enables
    /// presigned classification)
    #[arg(long, value_name = "FILE")]
    pub packages: Option<PathBuf>,

    /// Directory to write proprietary-files.txt and <device>-vendor.mk into;
    /// without it the vendor list goes to stdout
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Keep the first module claiming a path instead of aborting on
    /// conflicting build metadata
    #[arg(long)]
    pub lenient_modules: bool,

    /// Stdout format when --out is absent
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// Run the full pipeline and render its outputs.
pub fn run(args: &DiffArgs) -> Result<()> {
    let cfg = DeviceConfig::load(&args.config)
        .with_context(|| format!("loading device config {}", args.config.display()))?;

    let mut options = RunOptions {
        conflict_policy: if args.lenient_modules {
            ConflictPolicy::SkipLater
        } else {
            ConflictPolicy::Abort
        },
        ..RunOptions::default()
    };
    if let Some(path) = &args.modules {
        options.modules = Some(
            load_module_table(path)
                .with_context(|| format!("loading module metadata {}", path.display()))?,
        );
    }
    if let Some(path) = &args.packages {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading package list {}", path.display()))?;
        options.packages = Some(parse_package_list(&text));
    }

    let delta = resolve_device(&cfg, &args.stock, &args.custom, &options)
        .context("resolving partition delta")?;

    if let Some(out_dir) = &args.out {
        report::write_reports(out_dir, &cfg.device, &cfg.vendor, &delta)
            .with_context(|| format!("writing reports to {}", out_dir.display()))?;
        println!(
            "Wrote {} and {} ({} artifacts to vendor)",
            out_dir.join("proprietary-files.txt").display(),
            out_dir.join(format!("{}-vendor.mk", cfg.device)).display(),
            delta.vendor_lines().len()
        );
    } else {
        match args.format {
            OutputFormat::Text => print!("{}", report::proprietary_files(&delta)),
            OutputFormat::Json => println!("{}", report::to_json(&delta)?),
        }
    }
    Ok(())
}
