//! SELinux security-context provenance resolution.
//!
//! Policy directories compile as a unit, so a missing label is resolved to
//! the source *directory* that defines it, not the individual file. Each
//! configured directory is scanned as a pure function into its own
//! label→file table; the tables are then merged in configuration order with
//! last-write-wins, mirroring how the downstream build system resolves
//! directory precedence. Traversal within a directory is sorted, so the
//! winner for a label never depends on filesystem order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::DeltaError;
use crate::filter::FilterSet;
use crate::image::contexts::parse_contexts;
use crate::model::types::{
    Partition, SelinuxPartResolution, SelinuxPartResolutions,
};

// ---------------------------------------------------------------------------
// PolicySourceTable
// ---------------------------------------------------------------------------

/// Where one label is defined upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicySource {
    /// The file containing the definition.
    pub file: PathBuf,
    /// The configured top-level source directory the file lives under.
    pub dir: PathBuf,
}

/// Combined label→source table across all configured policy directories.
///
/// Built once per run, then shared read-only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicySourceTable {
    map: BTreeMap<String, PolicySource>,
}

impl PolicySourceTable {
    /// The winning source for `label`, if any directory defines it.
    #[must_use]
    pub fn lookup(&self, label: &str) -> Option<&PolicySource> {
        self.map.get(label)
    }

    /// Number of known labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no labels are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Parse every configured policy source directory into one combined table.
///
/// Later directories win for labels defined in more than one place.
///
/// # Errors
///
/// A configured directory that cannot be read is fatal; these are required
/// inputs, never silently treated as absent.
pub fn scan_policy_sources(dirs: &[PathBuf]) -> Result<PolicySourceTable, DeltaError> {
    let mut map = BTreeMap::new();
    for dir in dirs {
        let scanned = scan_source_dir(dir)?;
        debug!(dir = %dir.display(), labels = scanned.len(), "scanned policy source dir");
        for (label, file) in scanned {
            map.insert(
                label,
                PolicySource {
                    file,
                    dir: dir.clone(),
                },
            );
        }
    }
    Ok(PolicySourceTable { map })
}

/// Scan one directory into a label→file mapping. Pure with respect to
/// traversal order: the walk is sorted, and within the directory the last
/// file (in sorted order) defining a label wins.
fn scan_source_dir(dir: &Path) -> Result<BTreeMap<String, PathBuf>, DeltaError> {
    if !dir.is_dir() {
        return Err(DeltaError::io(
            dir,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "configured sepolicy source directory not found",
            ),
        ));
    }

    let mut labels = BTreeMap::new();
    for item in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let item = item.map_err(|e| walk_error(dir, e))?;
        if !item.file_type().is_file() {
            continue;
        }
        let name = item.file_name().to_string_lossy();
        let is_te = name.ends_with(".te");
        let is_contexts = name.ends_with("_contexts") || name == "file_contexts";
        if !is_te && !is_contexts {
            continue;
        }

        let text = std::fs::read_to_string(item.path())
            .map_err(|e| DeltaError::io(item.path(), e))?;
        if is_te {
            for label in parse_te_labels(&text) {
                labels.insert(label, item.path().to_path_buf());
            }
        } else {
            for label in parse_contexts(&text, item.path()).labels() {
                labels.insert(label.to_owned(), item.path().to_path_buf());
            }
        }
    }
    Ok(labels)
}

/// Extract type labels declared in a `.te` policy source file.
///
/// `type foo_exec, file_type, exec_type;` declares `foo_exec`;
/// `typealias` declares its alias target. Attribute associations
/// (`typeattribute`) reference existing types and declare nothing.
fn parse_te_labels(text: &str) -> Vec<String> {
    let mut labels = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("type") => {
                if let Some(name) = tokens.next() {
                    let name = name.trim_end_matches([',', ';']);
                    if !name.is_empty() {
                        labels.push(name.to_owned());
                    }
                }
            }
            Some("typealias") => {
                // typealias base alias other; — the alias names follow "alias".
                let rest: Vec<&str> = tokens.collect();
                if let Some(pos) = rest.iter().position(|t| *t == "alias") {
                    for name in &rest[pos + 1..] {
                        let name = name.trim_end_matches([',', ';']);
                        if !name.is_empty() {
                            labels.push((*name).to_owned());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    labels
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
// Resolution
// ---------------------------------------------------------------------------

/// Resolve each partition's missing labels to defining source directories.
///
/// Resolved labels contribute their directory (deduplicated, first-discovery
/// order); unresolved labels are recorded as diagnostics, never dropped. The
/// sepolicy-dirs exclude filter then removes directories already built into
/// the base platform. The `vendor` partition always receives the
/// synthesized-labels directory when one is configured, because labels this
/// tool emits itself exist nowhere upstream and must be self-declared.
#[must_use]
pub fn resolve_missing_contexts(
    missing: &BTreeMap<Partition, Vec<String>>,
    table: &PolicySourceTable,
    dir_filter: &FilterSet,
    synthesized_dir: Option<&Path>,
) -> SelinuxPartResolutions {
    let mut resolutions = SelinuxPartResolutions::new();
    for (&partition, labels) in missing {
        let mut res = SelinuxPartResolution::default();
        for label in labels {
            match table.lookup(label) {
                Some(source) => {
                    if !res.sepolicy_dirs.contains(&source.dir) {
                        res.sepolicy_dirs.push(source.dir.clone());
                    }
                }
                None => {
                    warn!(%partition, label, "context label has no upstream definition");
                    res.missing_contexts.push(label.clone());
                }
            }
        }

        res.sepolicy_dirs
            .retain(|dir| dir_filter.keeps(&dir.to_string_lossy()));

        if partition == Partition::Vendor
            && let Some(extra) = synthesized_dir
            && !res.sepolicy_dirs.iter().any(|d| d == extra)
        {
            res.sepolicy_dirs.push(extra.to_path_buf());
        }

        res.missing_contexts.sort();
        res.missing_contexts.dedup();
        resolutions.insert(partition, res);
    }
    resolutions
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterDef;
    use std::fs;

    fn no_filter() -> FilterSet {
        FilterSet::compile(&FilterDef::default(), "sepolicy_dirs").expect("compile")
    }

    fn exclude_filter(patterns: &[&str]) -> FilterSet {
        let def = FilterDef {
            exclude: patterns.iter().map(|s| (*s).to_owned()).collect(),
            ..FilterDef::default()
        };
        FilterSet::compile(&def, "sepolicy_dirs").expect("compile")
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    fn missing_for(
        partition: Partition,
        labels: &[&str],
    ) -> BTreeMap<Partition, Vec<String>> {
        let mut map = BTreeMap::new();
        map.insert(partition, labels.iter().map(|s| (*s).to_owned()).collect());
        map
    }

    // -- parse_te_labels --

    #[test]
    fn te_type_declarations_are_labels() {
        let text = "\
# policy for foo
type hal_foo_exec, exec_type, vendor_file_type;
type hal_foo_default, domain;
typeattribute hal_foo_default halserverdomain;
allow hal_foo_default self:binder call;
";
        let labels = parse_te_labels(text);
        assert_eq!(labels, vec!["hal_foo_exec", "hal_foo_default"]);
    }

    #[test]
    fn te_typealias_declares_alias_names() {
        let text = "typealias vendor_file alias legacy_vendor_file;\n";
        let labels = parse_te_labels(text);
        assert_eq!(labels, vec!["legacy_vendor_file"]);
    }

    // -- scan + last-write-wins --

    #[test]
    fn later_directory_wins_for_shared_label() {
        // dirA defines ctxA; dirB defines ctxA and ctxB; missing =
        // {ctxA, ctxC} → sepolicy_dirs = [dirB], missing = [ctxC].
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir_a = tmp.path().join("dirA");
        let dir_b = tmp.path().join("dirB");
        write(&dir_a, "file_a.te", "type ctxA;\n");
        write(&dir_b, "file_a2.te", "type ctxA;\n");
        write(&dir_b, "file_b.te", "type ctxB;\n");

        let table =
            scan_policy_sources(&[dir_a, dir_b.clone()]).expect("scan succeeds");
        assert_eq!(table.lookup("ctxA").map(|s| s.dir.clone()), Some(dir_b.clone()));

        let missing = missing_for(Partition::Vendor, &["ctxA", "ctxC"]);
        let resolutions =
            resolve_missing_contexts(&missing, &table, &no_filter(), None);
        let vendor = resolutions.get(&Partition::Vendor).expect("vendor resolved");
        assert_eq!(vendor.sepolicy_dirs, vec![dir_b]);
        assert_eq!(vendor.missing_contexts, vec!["ctxC".to_owned()]);
    }

    #[test]
    fn within_directory_winner_is_traversal_order_independent() {
        // Both files define the label; sorted traversal makes zz.te the
        // deterministic winner no matter how the filesystem orders entries.
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("policy");
        write(&dir, "aa.te", "type shared_label;\n");
        write(&dir, "zz.te", "type shared_label;\n");

        let table = scan_policy_sources(std::slice::from_ref(&dir)).expect("scan succeeds");
        let source = table.lookup("shared_label").expect("label known");
        assert!(source.file.ends_with("zz.te"));
    }

    #[test]
    fn contexts_files_contribute_labels_too() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("policy");
        write(
            &dir,
            "vendor_file_contexts",
            "/vendor/bin/svc  u:object_r:svc_exec:s0\n",
        );
        let table = scan_policy_sources(&[dir]).expect("scan succeeds");
        assert!(table.lookup("svc_exec").is_some());
    }

    #[test]
    fn missing_source_directory_is_fatal() {
        let err = scan_policy_sources(&[PathBuf::from("/does/not/exist")]).unwrap_err();
        assert!(matches!(err, DeltaError::Io { .. }));
    }

    // -- resolution --

    #[test]
    fn resolved_dirs_dedup_in_first_discovery_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir_a = tmp.path().join("a");
        let dir_b = tmp.path().join("b");
        write(&dir_a, "x.te", "type label_one;\ntype label_three;\n");
        write(&dir_b, "y.te", "type label_two;\n");

        let table =
            scan_policy_sources(&[dir_a.clone(), dir_b.clone()]).expect("scan succeeds");
        let missing = missing_for(
            Partition::Product,
            &["label_one", "label_two", "label_three"],
        );
        let resolutions =
            resolve_missing_contexts(&missing, &table, &no_filter(), None);
        let product = resolutions.get(&Partition::Product).expect("resolved");
        assert_eq!(product.sepolicy_dirs, vec![dir_a, dir_b]);
    }

    #[test]
    fn excluded_dirs_are_dropped_after_resolution() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("base_platform_policy");
        write(&dir, "x.te", "type already_built;\n");

        let table = scan_policy_sources(&[dir]).expect("scan succeeds");
        let missing = missing_for(Partition::Vendor, &["already_built"]);
        let resolutions = resolve_missing_contexts(
            &missing,
            &table,
            &exclude_filter(&["*base_platform*"]),
            None,
        );
        let vendor = resolutions.get(&Partition::Vendor).expect("resolved");
        assert!(vendor.sepolicy_dirs.is_empty());
        assert!(vendor.missing_contexts.is_empty());
    }

    #[test]
    fn vendor_always_receives_synthesized_dir() {
        let missing = missing_for(Partition::Vendor, &[]);
        let synthesized = PathBuf::from("vendor/acme/dev/sepolicy");
        let resolutions = resolve_missing_contexts(
            &missing,
            &PolicySourceTable::default(),
            &no_filter(),
            Some(&synthesized),
        );
        let vendor = resolutions.get(&Partition::Vendor).expect("resolved");
        assert_eq!(vendor.sepolicy_dirs, vec![synthesized]);
    }

    #[test]
    fn non_vendor_partitions_do_not_receive_synthesized_dir() {
        let missing = missing_for(Partition::Product, &[]);
        let synthesized = PathBuf::from("vendor/acme/dev/sepolicy");
        let resolutions = resolve_missing_contexts(
            &missing,
            &PolicySourceTable::default(),
            &no_filter(),
            Some(&synthesized),
        );
        let product = resolutions.get(&Partition::Product).expect("resolved");
        assert!(product.sepolicy_dirs.is_empty());
    }

    #[test]
    fn every_label_lands_in_exactly_one_bucket() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("policy");
        write(&dir, "x.te", "type known_label;\n");

        let table = scan_policy_sources(&[dir]).expect("scan succeeds");
        let missing = missing_for(Partition::Odm, &["known_label", "unknown_label"]);
        let resolutions =
            resolve_missing_contexts(&missing, &table, &no_filter(), None);
        let odm = resolutions.get(&Partition::Odm).expect("resolved");

        // known_label contributed a dir and is not diagnosed missing;
        // unknown_label is diagnosed and contributed nothing.
        assert_eq!(odm.sepolicy_dirs.len(), 1);
        assert_eq!(odm.missing_contexts, vec!["unknown_label".to_owned()]);
    }
}
