//! Partition property database reader.
//!
//! Reads the `build.prop`-style key/value file of one partition. Locations
//! vary between partitions and OS generations, so a fixed candidate list is
//! probed in order and the first existing file wins. Duplicate keys within
//! one file are a data-integrity error.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::DeltaError;
use crate::model::types::Partition;

/// Property key → value mapping for one partition.
pub type PropMap = BTreeMap<String, String>;

/// In-partition locations probed for the property database, in order.
const PROP_CANDIDATES: &[&str] = &["build.prop", "etc/build.prop"];

/// Read one partition's properties under an image root.
///
/// Returns `Ok(None)` when no property database exists (a skip, not an
/// error).
///
/// # Errors
///
/// Fails when an existing database cannot be read or contains a duplicate
/// key.
pub fn read_partition_props(
    root: &Path,
    partition: Partition,
) -> Result<Option<PropMap>, DeltaError> {
    let part_dir = root.join(partition.as_str());
    for candidate in PROP_CANDIDATES {
        let path = part_dir.join(candidate);
        if !path.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| DeltaError::io(&path, e))?;
        let props = parse_props(&text, partition)?;
        debug!(%partition, path = %path.display(), count = props.len(), "read props");
        return Ok(Some(props));
    }
    debug!(%partition, "no property database, skipping");
    Ok(None)
}

/// Parse `build.prop` text. Comments (`#`), blank lines, and `import`
/// directives are skipped; lines without `=` are ignored.
pub fn parse_props(text: &str, partition: Partition) -> Result<PropMap, DeltaError> {
    let mut props = PropMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("import ") {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            debug!(%partition, line, "skipping malformed property line");
            continue;
        };
        let key = key.trim().to_owned();
        if props
            .insert(key.clone(), value.trim().to_owned())
            .is_some()
        {
            return Err(DeltaError::DuplicateIdentity {
                partition,
                identity: key,
            });
        }
    }
    Ok(props)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
