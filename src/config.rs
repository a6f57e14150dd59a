//! Device configuration (`device.toml`).
//!
//! Defines the typed configuration for one device: which partitions to diff,
//! where upstream policy sources live, and the per-category filter pattern
//! lists. Loading compiles every pattern, so an invalid pattern or partition
//! name fails the run before any diffing begins.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DeltaError;
use crate::filter::{FilterDef, FilterSet};
use crate::model::types::Partition;

// ---------------------------------------------------------------------------
// Raw file form
// ---------------------------------------------------------------------------

/// The on-disk TOML form of a device config. Missing sections use defaults;
/// unknown fields are rejected.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfigFile {
    /// Device codename, e.g. `raven`.
    pub device: String,

    /// OEM/vendor directory name the generated tree lives under, e.g.
    /// `google` for `vendor/google/raven`.
    pub vendor: String,

    /// Partitions to diff, in processing order.
    #[serde(default = "default_partitions")]
    pub partitions: Vec<Partition>,

    /// Root of the custom build's output tree, e.g.
    /// `out/target/product/raven`. Required for module-override resolution.
    #[serde(default)]
    pub build_output_root: Option<String>,

    /// SELinux policy source settings.
    #[serde(default)]
    pub sepolicy: SepolicyConfig,

    /// Per-category filter pattern lists.
    #[serde(default)]
    pub filters: FilterConfig,
}

/// SELinux policy source settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SepolicyConfig {
    /// Upstream policy source directories, in precedence order (later wins).
    #[serde(default)]
    pub source_dirs: Vec<PathBuf>,

    /// Directory where this tool writes its own synthesized labels. Always
    /// added to the vendor partition's resolved directories when set.
    #[serde(default)]
    pub synthesized_dir: Option<PathBuf>,
}

/// Raw filter pattern lists, one group per artifact category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// File paths, matched as combined `partition/path` strings.
    #[serde(default)]
    pub files: FilterDef,

    /// Property keys.
    #[serde(default)]
    pub props: FilterDef,

    /// Security-context type labels.
    #[serde(default)]
    pub contexts: FilterDef,

    /// Resolved sepolicy source directories (exclude patterns drop
    /// directories already built into the base platform).
    #[serde(default)]
    pub sepolicy_dirs: FilterDef,
}

fn default_partitions() -> Vec<Partition> {
    vec![
        Partition::System,
        Partition::SystemExt,
        Partition::Product,
        Partition::Vendor,
        Partition::Odm,
    ]
}

// ---------------------------------------------------------------------------
// Compiled form
// ---------------------------------------------------------------------------

/// Compiled filter sets, one per artifact category.
#[derive(Clone, Debug, Default)]
pub struct Filters {
    /// File path filters.
    pub files: FilterSet,
    /// Property key filters.
    pub props: FilterSet,
    /// Context label filters.
    pub contexts: FilterSet,
    /// Sepolicy directory filters.
    pub sepolicy_dirs: FilterSet,
}

/// A loaded, validated device configuration.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Device codename.
    pub device: String,
    /// OEM/vendor directory name.
    pub vendor: String,
    /// Partitions to diff, in processing order, duplicates rejected.
    pub partitions: Vec<Partition>,
    /// Root of the custom build's output tree.
    pub build_output_root: Option<String>,
    /// SELinux policy source settings.
    pub sepolicy: SepolicyConfig,
    /// Compiled filter sets.
    pub filters: Filters,
}

impl DeviceConfig {
    /// Load and validate a device config from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, TOML/shape errors, unknown partition
    /// names, duplicate partitions, and invalid filter patterns.
    pub fn load(path: &Path) -> Result<Self, DeltaError> {
        let text = std::fs::read_to_string(path).map_err(|e| DeltaError::io(path, e))?;
        let file: DeviceConfigFile =
            toml::from_str(&text).map_err(|e| DeltaError::Config {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        Self::from_file(file, path)
    }

    /// Validate and compile an already-parsed config file.
    ///
    /// # Errors
    ///
    /// Fails on duplicate partitions and invalid filter patterns.
    pub fn from_file(file: DeviceConfigFile, origin: &Path) -> Result<Self, DeltaError> {
        for (i, partition) in file.partitions.iter().enumerate() {
            if file.partitions[..i].contains(partition) {
                return Err(DeltaError::Config {
                    path: origin.to_path_buf(),
                    detail: format!("partition '{partition}' listed more than once"),
                });
            }
        }
        if file.device.is_empty() {
            return Err(DeltaError::Config {
                path: origin.to_path_buf(),
                detail: "device must not be empty".to_owned(),
            });
        }

        let filters = Filters {
            files: FilterSet::compile(&file.filters.files, "files")?,
            props: FilterSet::compile(&file.filters.props, "props")?,
            contexts: FilterSet::compile(&file.filters.contexts, "contexts")?,
            sepolicy_dirs: FilterSet::compile(&file.filters.sepolicy_dirs, "sepolicy_dirs")?,
        };

        Ok(Self {
            device: file.device,
            vendor: file.vendor,
            partitions: file.partitions,
            build_output_root: file.build_output_root,
            sepolicy: file.sepolicy,
            filters,
        })
    }

    /// The source directory this tool generates into
    /// (`vendor/<vendor>/<device>`), used for module self-exclusion.
    #[must_use]
    pub fn own_output_dir(&self) -> String {
        format!("vendor/{}/{}", self.vendor, self.device)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
