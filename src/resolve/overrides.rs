//! Build-system module-override detection.
//!
//! A missing file that the custom build already produces as a module output
//! must not be vendored — the vendored copy would shadow the build's own
//! fresher artifact. This resolver matches module installed paths against
//! the candidate missing set and reports the modules to declare as package
//! dependencies instead.
//!
//! Modules whose owning source directory is this tool's own output directory
//! are a previous run's output, not a genuine build product; they are
//! excluded from the metadata before matching, otherwise every prior run's
//! artifact would falsely appear "already built".

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DeltaError;
use crate::model::types::ModuleTable;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What to do when two modules claim the same installed path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Abort the resolution with a data-integrity error.
    #[default]
    Abort,
    /// Keep the first claimant and skip later ones, logging each skip.
    SkipLater,
}

/// Result of override resolution. Empty when nothing matched; a no-match is
/// not an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OverrideResolution {
    /// Modules the custom build produces that cover missing files.
    pub override_modules: BTreeSet<String>,
    /// The matched candidate paths, to be removed from the missing set.
    pub built_paths: BTreeSet<String>,
}

impl OverrideResolution {
    /// Whether no module covered any candidate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.override_modules.is_empty() && self.built_paths.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read and parse a `module-info.json` file.
///
/// # Errors
///
/// Fails when the file cannot be read or is not valid module-info JSON.
pub fn load_module_table(path: &Path) -> Result<ModuleTable, DeltaError> {
    let text = std::fs::read_to_string(path).map_err(|e| DeltaError::io(path, e))?;
    ModuleTable::from_json(&text, path)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Match module installed paths against candidate missing paths.
///
/// `candidates` are missing destination paths rooted at the build output
/// tree. `own_output_dir` is the source directory this tool generates into;
/// modules owned by it are excluded before matching.
///
/// # Errors
///
/// Two modules claiming the same installed path is a data-integrity error
/// under [`ConflictPolicy::Abort`].
pub fn resolve_overrides(
    candidates: &BTreeSet<String>,
    modules: &ModuleTable,
    own_output_dir: &str,
    policy: ConflictPolicy,
) -> Result<OverrideResolution, DeltaError> {
    // Self-exclusion pass.
    let mut metadata = modules.clone();
    metadata.retain(|name, entry| {
        let own = entry.path.iter().any(|p| owned_by(p, own_output_dir));
        if own {
            debug!(module = name, "excluding module owned by our own output dir");
        }
        !own
    });

    // Installed-path index with conflict detection. Name-ordered iteration
    // makes the "first claimant" deterministic.
    let mut claims: BTreeMap<&str, &str> = BTreeMap::new();
    for (name, entry) in metadata.iter() {
        for installed in &entry.installed {
            if let Some(&first) = claims.get(installed.as_str()) {
                match policy {
                    ConflictPolicy::Abort => {
                        return Err(DeltaError::ModulePathConflict {
                            path: installed.clone(),
                            first: first.to_owned(),
                            second: name.to_owned(),
                        });
                    }
                    ConflictPolicy::SkipLater => {
                        warn!(
                            path = installed.as_str(),
                            first,
                            skipped = name,
                            "duplicate installed path, keeping first claimant"
                        );
                    }
                }
            } else {
                claims.insert(installed.as_str(), name);
            }
        }
    }

    let mut resolution = OverrideResolution::default();
    for (installed, name) in claims {
        if candidates.contains(installed) {
            resolution.override_modules.insert(name.to_owned());
            resolution.built_paths.insert(installed.to_owned());
        }
    }
    debug!(
        modules = resolution.override_modules.len(),
        paths = resolution.built_paths.len(),
        "resolved module overrides"
    );
    Ok(resolution)
}

/// Whether `path` lies under `own_dir` (component-wise prefix).
fn owned_by(path: &str, own_dir: &str) -> bool {
    let own_dir = own_dir.trim_end_matches('/');
    path == own_dir
        || path
            .strip_prefix(own_dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
