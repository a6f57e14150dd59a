//! Compiled security-context database reader.
//!
//! Reads one partition's labeled `file_contexts` output and builds a
//! [`SelinuxContexts`] table of type labels. Only label presence matters to
//! the diff stage; the mapped source path exists for diagnostics.

use std::path::Path;

use tracing::debug;

use crate::error::DeltaError;
use crate::model::types::{Partition, SelinuxContexts};

/// In-partition location of the compiled context database.
///
/// The platform policy on `system` uses the historical `plat_` prefix; every
/// other partition's database carries the partition name.
fn contexts_db_rel(partition: Partition) -> String {
    match partition {
        Partition::System => "etc/selinux/plat_file_contexts".to_owned(),
        other => format!("etc/selinux/{}_file_contexts", other.as_str()),
    }
}

/// Read one partition's context database under an image root.
///
/// Returns `Ok(None)` when the partition has no database (a skip, not an
/// error).
///
/// # Errors
///
/// Fails when an existing database cannot be read.
pub fn read_partition_contexts(
    root: &Path,
    partition: Partition,
) -> Result<Option<SelinuxContexts>, DeltaError> {
    let path = root
        .join(partition.as_str())
        .join(contexts_db_rel(partition));
    if !path.is_file() {
        debug!(%partition, "no context database, skipping");
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|e| DeltaError::io(&path, e))?;
    let contexts = parse_contexts(&text, &path);
    debug!(%partition, path = %path.display(), labels = contexts.len(), "read contexts");
    Ok(Some(contexts))
}

/// Parse `file_contexts` text: each non-comment line ends in a security
/// context whose type component becomes the label. Lines that do not carry a
/// well-formed context are ignored.
pub fn parse_contexts(text: &str, source: &Path) -> SelinuxContexts {
    let mut contexts = SelinuxContexts::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(context) = line.split_whitespace().last() else {
            continue;
        };
        if let Some(label) = SelinuxContexts::parse_label(context) {
            contexts.insert(label, source);
        }
    }
    contexts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
