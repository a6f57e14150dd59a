use anyhow::Result;
use clap::{Parser, Subcommand};

mod check;
mod diff;
mod presigned;

/// Partition delta and provenance resolver
///
/// provender compares an extracted stock (factory) image tree against a
/// custom (rebuilt) image tree, computes which platform artifacts the custom
/// build is missing, and resolves where each missing artifact comes from:
/// which sepolicy source directory defines a missing security context, which
/// build modules already produce a "missing" file, and which application
/// packages must keep their stock signature.
///
/// INPUTS:
///   - two extracted image roots (plain directory trees, one directory per
///     partition)
///   - a device config TOML (partitions, filters, sepolicy sources)
///   - optionally module-info.json and a discovered-packages list
///
/// OUTPUTS:
///   - proprietary-files.txt: the sorted vendor list
///   - <device>-vendor.mk: sepolicy dirs, property overrides, package deps
///
/// QUICK START:
///
///   provender check --config device.toml
///   provender diff --stock stock/ --custom out/target/product/dev/ \
///       --config device.toml --out vendor/acme/dev
#[derive(Parser)]
#[command(name = "provender")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(
    after_help = "See 'provender <command> --help' for more information on a specific command."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the partition delta and resolve provenance
    Diff(diff::DiffArgs),

    /// Classify discovered packages as presigned via seapp policy
    Presigned(presigned::PresignedArgs),

    /// Validate a device config (partitions, filter patterns)
    Check(check::CheckArgs),
}

fn main() -> Result<()> {
    provender::telemetry::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Diff(args) => diff::run(&args),
        Commands::Presigned(args) => presigned::run(&args),
        Commands::Check(args) => check::run(&args),
    }
}
