//! Recursive partition file listing.
//!
//! Walks `<root>/<partition>` and produces a normalized, sorted listing of
//! [`BlobEntry`] values keyed by destination-relative path. Traversal is
//! sorted so listings are deterministic regardless of filesystem order, and
//! symlinks are recorded, not followed. Files is the only artifact category
//! filtered at listing time, and only when a filter set is passed; the other
//! categories are filtered downstream because their keys are not paths.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::DeltaError;
use crate::filter::FilterSet;
use crate::model::types::{BlobEntry, Partition};

// ---------------------------------------------------------------------------
// PartitionListing
// ---------------------------------------------------------------------------

/// Result of listing one partition under one image root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionListing {
    /// The image root has no directory for this partition. Not an error;
    /// the partition is skipped for all diff stages.
    Absent,
    /// The partition's artifacts, keyed by destination-relative path.
    Present(BTreeMap<String, BlobEntry>),
}

impl PartitionListing {
    /// The listed entries, or `None` when the partition is absent.
    #[must_use]
    pub fn entries(&self) -> Option<&BTreeMap<String, BlobEntry>> {
        match self {
            Self::Absent => None,
            Self::Present(entries) => Some(entries),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// List one partition's files under an image root.
///
/// When `filters` is given, an entry is listed iff the main include/exclude
/// pass keeps its combined `partition/path` identity or a force-include
/// pattern claims it (the diff stage decides what to do with forced entries).
///
/// # Errors
///
/// Any I/O failure during the walk is fatal for this listing; an absent
/// partition directory is not.
pub fn list_partition(
    root: &Path,
    partition: Partition,
    filters: Option<&FilterSet>,
) -> Result<PartitionListing, DeltaError> {
    let part_dir = root.join(partition.as_str());
    if !part_dir.is_dir() {
        debug!(%partition, root = %root.display(), "partition absent, skipping");
        return Ok(PartitionListing::Absent);
    }

    let mut entries = BTreeMap::new();
    for item in WalkDir::new(&part_dir)
        .follow_links(false)
        .sort_by_file_name()
    {
        let item = item.map_err(|e| walk_error(&part_dir, e))?;
        if item.file_type().is_dir() {
            continue;
        }

        // Root-relative, so construction strips the partition prefix exactly
        // once (a nested directory named like its partition stays intact).
        let rel = item
            .path()
            .strip_prefix(root)
            .unwrap_or(item.path())
            .to_string_lossy()
            .into_owned();
        let mut entry = BlobEntry::new(partition, rel, item.path().to_path_buf());

        if item.path_is_symlink() {
            let target = std::fs::read_link(item.path())
                .map_err(|e| DeltaError::io(item.path(), e))?;
            entry.symlink_target = Some(target.to_string_lossy().into_owned());
        }

        if let Some(filters) = filters {
            let candidate = entry.combined_path();
            if !filters.keeps(&candidate) && !filters.is_forced(&candidate) {
                continue;
            }
        }

        // Distinct walked paths cannot collide, but the uniqueness guarantee
        // belongs to this stage, so enforce it here.
        let key = entry.path.clone();
        if entries.insert(key.clone(), entry).is_some() {
            return Err(DeltaError::DuplicateIdentity {
                partition,
                identity: key,
            });
        }
    }

    debug!(%partition, count = entries.len(), "listed partition files");
    Ok(PartitionListing::Present(entries))
}

fn walk_error(dir: &Path, err: walkdir::Error) -> DeltaError {
    let path = err
        .path()
        .map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("directory loop detected"));
    DeltaError::io(path, source)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterDef;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    #[test]
    fn absent_partition_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let listing =
            list_partition(dir.path(), Partition::Odm, None).expect("listing succeeds");
        assert_eq!(listing, PartitionListing::Absent);
    }

    #[test]
    fn listing_is_sorted_and_prefix_stripped() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "vendor/lib64/libz.so", "z");
        write(dir.path(), "vendor/bin/tool", "t");
        write(dir.path(), "vendor/etc/cfg.xml", "c");

        let listing =
            list_partition(dir.path(), Partition::Vendor, None).expect("listing succeeds");
        let entries = listing.entries().expect("present");
        let paths: Vec<&str> = entries.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["bin/tool", "etc/cfg.xml", "lib64/libz.so"]);
        for entry in entries.values() {
            assert!(!entry.path.starts_with("vendor/"));
        }
    }

    #[test]
    fn listing_applies_filters_when_asked() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "system/framework/arm/boot.oat", "x");
        write(dir.path(), "system/lib/libkeep.so", "x");

        let def = FilterDef {
            exclude: vec!["*/framework/arm/*".to_owned()],
            ..FilterDef::default()
        };
        let filters = FilterSet::compile(&def, "files").expect("compile");

        let listing = list_partition(dir.path(), Partition::System, Some(&filters))
            .expect("listing succeeds");
        let entries = listing.entries().expect("present");
        assert!(entries.contains_key("lib/libkeep.so"));
        assert!(!entries.contains_key("framework/arm/boot.oat"));
    }

    #[test]
    fn listing_keeps_forced_entries_outside_include_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "system/etc/keep.cfg", "x");
        write(dir.path(), "system/etc/other.cfg", "x");

        let def = FilterDef {
            include: vec!["system/lib/**".to_owned()],
            force_include: vec!["system/etc/keep.cfg".to_owned()],
            ..FilterDef::default()
        };
        let filters = FilterSet::compile(&def, "files").expect("compile");

        let listing = list_partition(dir.path(), Partition::System, Some(&filters))
            .expect("listing succeeds");
        let entries = listing.entries().expect("present");
        assert!(entries.contains_key("etc/keep.cfg"));
        assert!(!entries.contains_key("etc/other.cfg"));
    }

    #[cfg(unix)]
    #[test]
    fn listing_records_symlink_targets() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "vendor/lib/libreal.so", "x");
        std::os::unix::fs::symlink(
            "libreal.so",
            dir.path().join("vendor/lib/libalias.so"),
        )
        .expect("symlink");

        let listing =
            list_partition(dir.path(), Partition::Vendor, None).expect("listing succeeds");
        let entries = listing.entries().expect("present");
        let alias = entries.get("lib/libalias.so").expect("alias listed");
        assert_eq!(alias.symlink_target.as_deref(), Some("libreal.so"));
        let real = entries.get("lib/libreal.so").expect("real listed");
        assert_eq!(real.symlink_target, None);
    }
}
