//! One full resolver run: list, diff, resolve.
//!
//! Partition work is independent — each partition's listings and diffs touch
//! only that partition's slots — and the combined policy-source table is
//! built once and shared read-only, so the sequential loop below could be
//! split by partition without coordination. Determinism never depends on
//! traversal completion order: scans are sorted and merges follow
//! configuration order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::DeviceConfig;
use crate::delta::{diff_contexts, diff_files, diff_props, PropDelta};
use crate::error::DeltaError;
use crate::image::contexts::read_partition_contexts;
use crate::image::files::{list_partition, PartitionListing};
use crate::image::props::read_partition_props;
use crate::model::types::{
    BlobEntry, ModuleTable, Partition, SelinuxPartResolutions, PRESIGNED_SEINFO,
};
use crate::resolve::overrides::{resolve_overrides, ConflictPolicy, OverrideResolution};
use crate::resolve::presigned::{classify_packages, scan_seapp_policies};
use crate::resolve::selinux::{resolve_missing_contexts, scan_policy_sources};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Optional inputs for one run, beyond the two image roots.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Parsed build-module metadata; enables override resolution.
    pub modules: Option<ModuleTable>,
    /// Discovered packages (`name`, combined blob path); enables presigned
    /// classification.
    pub packages: Option<Vec<(String, String)>>,
    /// What to do when two modules claim the same installed path.
    pub conflict_policy: ConflictPolicy,
}

/// Everything one run resolves. All collections iterate in stable order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DeviceDelta {
    /// Missing files per partition, sorted by destination path, with
    /// override-built paths already removed and presigned entries marked.
    pub files: BTreeMap<Partition, Vec<BlobEntry>>,
    /// Property diffs per partition.
    pub props: BTreeMap<Partition, PropDelta>,
    /// Stock-only context labels per partition (resolver input, kept for
    /// diagnostics).
    pub missing_contexts: BTreeMap<Partition, Vec<String>>,
    /// Context provenance resolutions.
    pub sepolicy: SelinuxPartResolutions,
    /// Module-override resolution.
    pub overrides: OverrideResolution,
    /// Combined paths of blobs that must keep their stock signature.
    pub presigned_paths: Vec<String>,
}

impl DeviceDelta {
    /// The final vendor list: deterministically sorted, combined
    /// `partition/path` strings, presigned entries suffixed `;PRESIGNED`.
    /// Symlinks are declared in generated build files, not copied, so they
    /// are omitted here.
    #[must_use]
    pub fn vendor_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .files
            .values()
            .flatten()
            .filter(|entry| entry.symlink_target.is_none())
            .map(|entry| {
                if entry.presigned {
                    format!("{};PRESIGNED", entry.combined_path())
                } else {
                    entry.combined_path()
                }
            })
            .collect();
        lines.sort();
        lines
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Resolve the full delta between a stock and a custom image root.
///
/// # Errors
///
/// Configuration and data-integrity errors abort the run; absent partitions
/// and unresolved provenance do not.
pub fn resolve_device(
    cfg: &DeviceConfig,
    stock_root: &Path,
    custom_root: &Path,
    options: &RunOptions,
) -> Result<DeviceDelta, DeltaError> {
    let mut delta = DeviceDelta::default();

    for &partition in &cfg.partitions {
        resolve_partition(cfg, stock_root, custom_root, partition, &mut delta)?;
    }

    // Context provenance: one combined source table, shared across partitions.
    if !cfg.sepolicy.source_dirs.is_empty() || cfg.sepolicy.synthesized_dir.is_some() {
        // The synthesized-labels dir is injected unconditionally, even when
        // vendor produced no missing labels of its own.
        if cfg.sepolicy.synthesized_dir.is_some()
            && cfg.partitions.contains(&Partition::Vendor)
        {
            delta.missing_contexts.entry(Partition::Vendor).or_default();
        }
        let table = scan_policy_sources(&cfg.sepolicy.source_dirs)?;
        debug!(labels = table.len(), "built combined policy source table");
        delta.sepolicy = resolve_missing_contexts(
            &delta.missing_contexts,
            &table,
            &cfg.filters.sepolicy_dirs,
            cfg.sepolicy.synthesized_dir.as_deref(),
        );
    }

    if let Some(modules) = &options.modules {
        apply_overrides(cfg, modules, options.conflict_policy, &mut delta)?;
    }

    if let Some(packages) = &options.packages {
        mark_presigned(cfg, packages, &mut delta)?;
    }

    info!(
        files = delta.files.values().map(Vec::len).sum::<usize>(),
        partitions = delta.files.len(),
        "delta resolution complete"
    );
    Ok(delta)
}

/// List and diff one partition's files, properties, and contexts.
fn resolve_partition(
    cfg: &DeviceConfig,
    stock_root: &Path,
    custom_root: &Path,
    partition: Partition,
    delta: &mut DeviceDelta,
) -> Result<(), DeltaError> {
    let stock = list_partition(stock_root, partition, Some(&cfg.filters.files))?;
    let custom = list_partition(custom_root, partition, None)?;
    let (PartitionListing::Present(stock), PartitionListing::Present(custom)) =
        (stock, custom)
    else {
        // Absent from either image root: skipped for all diff stages.
        debug!(%partition, "absent from one image root, skipping");
        return Ok(());
    };

    let missing = diff_files(&stock, &custom, &cfg.filters.files);
    debug!(%partition, missing = missing.len(), "diffed files");
    delta.files.insert(partition, missing);

    let stock_props = read_partition_props(stock_root, partition)?;
    let custom_props = read_partition_props(custom_root, partition)?;
    if let (Some(stock_props), Some(custom_props)) = (stock_props, custom_props) {
        let prop_delta = diff_props(&stock_props, &custom_props, &cfg.filters.props);
        if !prop_delta.is_empty() {
            delta.props.insert(partition, prop_delta);
        }
    }

    let stock_ctx = read_partition_contexts(stock_root, partition)?;
    let custom_ctx = read_partition_contexts(custom_root, partition)?;
    if let (Some(stock_ctx), Some(custom_ctx)) = (stock_ctx, custom_ctx) {
        let missing_labels = diff_contexts(&stock_ctx, &custom_ctx, &cfg.filters.contexts);
        delta.missing_contexts.insert(partition, missing_labels);
    }

    Ok(())
}

/// Run override resolution and drop built paths from the missing sets.
fn apply_overrides(
    cfg: &DeviceConfig,
    modules: &ModuleTable,
    policy: ConflictPolicy,
    delta: &mut DeviceDelta,
) -> Result<(), DeltaError> {
    let Some(output_root) = &cfg.build_output_root else {
        return Err(DeltaError::Config {
            path: Path::new("device.toml").to_path_buf(),
            detail: "build_output_root is required for module-override resolution"
                .to_owned(),
        });
    };
    let output_root = output_root.trim_end_matches('/');

    let candidates: BTreeSet<String> = delta
        .files
        .values()
        .flatten()
        .map(|entry| format!("{}/{}", output_root, entry.combined_path()))
        .collect();

    delta.overrides =
        resolve_overrides(&candidates, modules, &cfg.own_output_dir(), policy)?;

    for entries in delta.files.values_mut() {
        entries.retain(|entry| {
            let candidate = format!("{}/{}", output_root, entry.combined_path());
            !delta.overrides.built_paths.contains(&candidate)
        });
    }
    Ok(())
}

/// Classify discovered packages and mark the matching missing entries.
fn mark_presigned(
    cfg: &DeviceConfig,
    packages: &[(String, String)],
    delta: &mut DeviceDelta,
) -> Result<(), DeltaError> {
    let policy = scan_seapp_policies(&cfg.sepolicy.source_dirs, PRESIGNED_SEINFO)?;
    delta.presigned_paths = classify_packages(&policy, packages);

    let presigned: BTreeSet<&str> =
        delta.presigned_paths.iter().map(String::as_str).collect();
    for entries in delta.files.values_mut() {
        for entry in entries {
            if presigned.contains(entry.combined_path().as_str()) {
                entry.presigned = true;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfigFile;
    use std::fs;
    use std::path::PathBuf;

    fn config(toml_text: &str) -> DeviceConfig {
        let file: DeviceConfigFile = toml::from_str(toml_text).expect("valid TOML");
        DeviceConfig::from_file(file, Path::new("device.toml")).expect("valid config")
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    #[test]
    fn vendor_lines_are_sorted_and_mark_presigned() {
        let mut delta = DeviceDelta::default();
        let mut apk = BlobEntry::new(
            Partition::Product,
            "app/Cam/Cam.apk",
            PathBuf::from("/x"),
        );
        apk.presigned = true;
        let mut link =
            BlobEntry::new(Partition::Vendor, "lib/alias.so", PathBuf::from("/x"));
        link.symlink_target = Some("real.so".to_owned());
        delta.files.insert(
            Partition::Vendor,
            vec![
                BlobEntry::new(Partition::Vendor, "lib/z.so", PathBuf::from("/x")),
                link,
            ],
        );
        delta.files.insert(Partition::Product, vec![apk]);

        assert_eq!(
            delta.vendor_lines(),
            vec![
                "product/app/Cam/Cam.apk;PRESIGNED".to_owned(),
                "vendor/lib/z.so".to_owned(),
            ]
        );
    }

    #[test]
    fn run_diffs_only_shared_partitions() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let stock = tmp.path().join("stock");
        let custom = tmp.path().join("custom");
        // vendor exists in both; odm only in stock.
        write(&stock, "vendor/lib/libonly.so", "x");
        write(&custom, "vendor/.placeholder", "");
        write(&stock, "odm/etc/skipme.cfg", "x");

        let cfg = config(
            "device = \"dev\"\nvendor = \"acme\"\npartitions = [\"vendor\", \"odm\"]\n",
        );
        let delta = resolve_device(&cfg, &stock, &custom, &RunOptions::default())
            .expect("run succeeds");

        let vendor = delta.files.get(&Partition::Vendor).expect("vendor diffed");
        assert_eq!(vendor.len(), 1);
        assert_eq!(vendor[0].path, "lib/libonly.so");
        assert!(!delta.files.contains_key(&Partition::Odm));
    }

    #[test]
    fn overrides_require_build_output_root() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let stock = tmp.path().join("stock");
        let custom = tmp.path().join("custom");
        write(&stock, "vendor/lib/a.so", "x");
        write(&custom, "vendor/.placeholder", "");

        let cfg = config("device = \"dev\"\nvendor = \"acme\"\npartitions = [\"vendor\"]\n");
        let options = RunOptions {
            modules: Some(ModuleTable::default()),
            ..RunOptions::default()
        };
        let err = resolve_device(&cfg, &stock, &custom, &options).unwrap_err();
        assert!(matches!(err, DeltaError::Config { .. }));
    }
}
