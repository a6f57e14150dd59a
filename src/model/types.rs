//! Core types for the partition delta resolver.
//!
//! Foundation types used throughout provender: partition identities, blob
//! entries, security-context tables, build-module metadata, package signing
//! policy, and the static precedence tables the resolvers take as parameters.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeltaError;

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// A named logical slice of the device image.
///
/// The variant order is the deterministic processing and output order for
/// every per-partition result in a run.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Partition {
    System,
    SystemExt,
    Product,
    Vendor,
    Odm,
    VendorDlkm,
    OdmDlkm,
}

impl Partition {
    /// Every partition, in processing order.
    pub const ALL: [Self; 7] = [
        Self::System,
        Self::SystemExt,
        Self::Product,
        Self::Vendor,
        Self::Odm,
        Self::VendorDlkm,
        Self::OdmDlkm,
    ];

    /// The partition's directory name under an image root.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::SystemExt => "system_ext",
            Self::Product => "product",
            Self::Vendor => "vendor",
            Self::Odm => "odm",
            Self::VendorDlkm => "vendor_dlkm",
            Self::OdmDlkm => "odm_dlkm",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = DeltaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DeltaError::UnknownPartition { name: s.to_owned() })
    }
}

impl TryFrom<String> for Partition {
    type Error = DeltaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Partition> for String {
    fn from(p: Partition) -> Self {
        p.as_str().to_owned()
    }
}

// ---------------------------------------------------------------------------
// BlobEntry
// ---------------------------------------------------------------------------

/// One artifact present in a partition image.
///
/// Identity is `(partition, path)`; the serialized identity is the combined
/// `partition/path` string. Entries are immutable once constructed and owned
/// by the diff result that created them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BlobEntry {
    /// Partition the artifact belongs to.
    pub partition: Partition,
    /// Destination-relative path inside the partition image. Never begins
    /// with the partition prefix; the prefix is stripped at construction.
    pub path: String,
    /// Location of the artifact under the extraction root.
    pub src_path: PathBuf,
    /// Whether the artifact must keep its stock signature.
    pub presigned: bool,
    /// Symlink target, when the artifact is a symlink.
    pub symlink_target: Option<String>,
}

impl BlobEntry {
    /// Create an entry, stripping a leading `<partition>/` prefix (and any
    /// leading slash) from `path` if present.
    pub fn new(partition: Partition, path: impl Into<String>, src_path: PathBuf) -> Self {
        let raw: String = path.into();
        let trimmed = raw.trim_start_matches('/');
        let path = trimmed
            .strip_prefix(partition.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(trimmed)
            .to_owned();
        Self {
            partition,
            path,
            src_path,
            presigned: false,
            symlink_target: None,
        }
    }

    /// The combined `partition/path` identity string.
    #[must_use]
    pub fn combined_path(&self) -> String {
        format!("{}/{}", self.partition, self.path)
    }
}

// ---------------------------------------------------------------------------
// SelinuxContexts
// ---------------------------------------------------------------------------

/// Mapping from security-context type label to the file that emitted it.
///
/// Inserts are last-write-wins; callers control precedence by insert order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelinuxContexts {
    map: BTreeMap<String, PathBuf>,
}

impl SelinuxContexts {
    /// Record `label` as emitted by `source`, replacing any earlier source.
    pub fn insert(&mut self, label: impl Into<String>, source: impl Into<PathBuf>) {
        self.map.insert(label.into(), source.into());
    }

    /// Whether the label is present.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.map.contains_key(label)
    }

    /// The file that emitted `label`, if known.
    #[must_use]
    pub fn source_of(&self, label: &str) -> Option<&Path> {
        self.map.get(label).map(PathBuf::as_path)
    }

    /// All labels, in sorted order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Number of distinct labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Extract the type label from a full security context string.
    ///
    /// `u:object_r:vendor_file:s0` → `vendor_file`. Returns `None` when the
    /// string does not have the user:role:type:range shape.
    #[must_use]
    pub fn parse_label(context: &str) -> Option<&str> {
        let mut parts = context.split(':');
        let user = parts.next()?;
        let role = parts.next()?;
        let label = parts.next()?;
        if user.is_empty() || role.is_empty() || label.is_empty() || parts.next().is_none() {
            return None;
        }
        Some(label)
    }
}

// ---------------------------------------------------------------------------
// SelinuxPartResolutions
// ---------------------------------------------------------------------------

/// Provenance resolution result for one partition's missing context labels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SelinuxPartResolution {
    /// Policy source directories to declare, deduplicated, in first-discovery
    /// order.
    pub sepolicy_dirs: Vec<PathBuf>,
    /// Labels with no upstream definition, sorted. Diagnostic output.
    pub missing_contexts: Vec<String>,
}

/// Per-partition provenance resolutions for one run.
pub type SelinuxPartResolutions = BTreeMap<Partition, SelinuxPartResolution>;

// ---------------------------------------------------------------------------
// ModuleTable
// ---------------------------------------------------------------------------

/// One build module's metadata, as recorded in `module-info.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Module classes (`SHARED_LIBRARIES`, `APPS`, ...).
    #[serde(default)]
    pub class: Vec<String>,
    /// Owning source directories.
    #[serde(default)]
    pub path: Vec<String>,
    /// Paths the module installs, rooted at the build output tree.
    #[serde(default)]
    pub installed: Vec<String>,
}

/// Read-only snapshot of the build system's module metadata for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleTable {
    modules: BTreeMap<String, ModuleEntry>,
}

impl ModuleTable {
    /// Parse the `module-info.json` text form: a map from module name to
    /// metadata. Unknown per-module fields are ignored.
    pub fn from_json(text: &str, origin: &Path) -> Result<Self, DeltaError> {
        let modules: BTreeMap<String, ModuleEntry> =
            serde_json::from_str(text).map_err(|e| DeltaError::Config {
                path: origin.to_path_buf(),
                detail: format!("invalid module-info JSON: {e}"),
            })?;
        Ok(Self { modules })
    }

    /// Build a table directly from entries (used by tests and callers that
    /// already hold parsed metadata).
    #[must_use]
    pub fn from_entries(entries: BTreeMap<String, ModuleEntry>) -> Self {
        Self { modules: entries }
    }

    /// Iterate modules in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleEntry)> {
        self.modules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up one module.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModuleEntry> {
        self.modules.get(name)
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Drop modules that fail the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &ModuleEntry) -> bool) {
        self.modules.retain(|name, entry| keep(name, entry));
    }
}

// ---------------------------------------------------------------------------
// PackagePolicy
// ---------------------------------------------------------------------------

/// Mapping from application package name to "is presigned".
///
/// Built by parsing seapp policy declarations. A package absent from the map
/// is not presigned (open-world default).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackagePolicy {
    map: BTreeMap<String, bool>,
}

impl PackagePolicy {
    /// Record a package's signing policy, replacing any earlier entry.
    pub fn insert(&mut self, package: impl Into<String>, presigned: bool) {
        self.map.insert(package.into(), presigned);
    }

    /// Whether the package must keep its stock signature.
    #[must_use]
    pub fn is_presigned(&self, package: &str) -> bool {
        self.map.get(package).copied().unwrap_or(false)
    }

    /// Iterate entries in package-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.map.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of packages with an explicit policy entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no package has a policy entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Static precedence tables
// ---------------------------------------------------------------------------

/// Build variable that receives each partition's policy source directories.
///
/// Partitions absent from this table have no board-level variable; the report
/// writer serializes their directories as comments. Used only at
/// serialization time; the resolver itself is partition-name-agnostic.
pub const SEPOLICY_DIR_VARS: &[(Partition, &str)] = &[
    (Partition::SystemExt, "SYSTEM_EXT_PRIVATE_SEPOLICY_DIRS"),
    (Partition::Product, "PRODUCT_PRIVATE_SEPOLICY_DIRS"),
    (Partition::Vendor, "BOARD_VENDOR_SEPOLICY_DIRS"),
    (Partition::Odm, "BOARD_ODM_SEPOLICY_DIRS"),
];

/// Look up the build variable for a partition's policy directories.
#[must_use]
pub fn sepolicy_var(partition: Partition) -> Option<&'static str> {
    SEPOLICY_DIR_VARS
        .iter()
        .find(|(p, _)| *p == partition)
        .map(|(_, var)| *var)
}

/// seinfo values whose applications must keep their stock signature.
///
/// Passed into the presigned resolver as a parameter so tests can substitute
/// their own marker set.
pub const PRESIGNED_SEINFO: &[&str] = &["platform", "media", "shared", "networkstack"];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
