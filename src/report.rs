//! Deterministic text rendering of a resolved delta.
//!
//! Two artifacts: the `proprietary-files.txt` vendor list and the
//! `<device>-vendor.mk` makefile fragment. Output is rewritten wholesale each
//! run; byte-identical inputs produce byte-identical outputs. Diagnostics —
//! unresolved context labels, changed-but-not-vendored properties — are
//! serialized as comments so they survive into review without acting on the
//! build.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use crate::error::DeltaError;
use crate::model::types::sepolicy_var;
use crate::pipeline::DeviceDelta;

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Output form for the CLI's stdout rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The plain vendor list, one combined path per line.
    #[default]
    Text,
    /// The full delta as pretty JSON.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("invalid format '{s}'. Use: text or json")),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the vendor list: sorted combined paths, newline-joined, trailing
/// newline.
#[must_use]
pub fn proprietary_files(delta: &DeviceDelta) -> String {
    let mut out = String::new();
    for line in delta.vendor_lines() {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Render the makefile fragment declaring everything the delta resolved.
#[must_use]
pub fn vendor_mk(device: &str, vendor: &str, delta: &DeviceDelta) -> String {
    let mut mk = String::new();
    let _ = writeln!(mk, "# Generated by provender for {device}. Do not edit.");
    let _ = writeln!(mk);
    let _ = writeln!(mk, "PRODUCT_SOONG_NAMESPACES += vendor/{vendor}/{device}");

    // Sepolicy source directories, per the partition→variable table. The
    // resolver is partition-agnostic; the table applies only here.
    for (partition, res) in &delta.sepolicy {
        if res.sepolicy_dirs.is_empty() && res.missing_contexts.is_empty() {
            continue;
        }
        let _ = writeln!(mk);
        match sepolicy_var(*partition) {
            Some(var) => {
                for dir in &res.sepolicy_dirs {
                    let _ = writeln!(mk, "{var} += {}", dir.display());
                }
            }
            None => {
                for dir in &res.sepolicy_dirs {
                    let _ = writeln!(
                        mk,
                        "# {partition}: policy dir (no board variable): {}",
                        dir.display()
                    );
                }
            }
        }
        for label in &res.missing_contexts {
            let _ = writeln!(mk, "# unresolved context ({partition}): {label}");
        }
    }

    // Removed properties are restored; changed ones are surfaced only.
    let mut removed = Vec::new();
    let mut changed = Vec::new();
    for (partition, prop_delta) in &delta.props {
        for (key, value) in &prop_delta.removed {
            removed.push(format!("    {key}={value}"));
        }
        for (key, diff) in &prop_delta.changed {
            changed.push(format!(
                "# changed ({partition}): {key} stock={} custom={}",
                diff.stock, diff.custom
            ));
        }
    }
    if !removed.is_empty() {
        let _ = writeln!(mk);
        let _ = writeln!(mk, "PRODUCT_PROPERTY_OVERRIDES += \\");
        let _ = writeln!(mk, "{}", removed.join(" \\\n"));
    }
    if !changed.is_empty() {
        let _ = writeln!(mk);
        let _ = writeln!(mk, "{}", changed.join("\n"));
    }

    // Modules the custom build already produces: depend on them instead of
    // vendoring their outputs.
    if !delta.overrides.override_modules.is_empty() {
        let _ = writeln!(mk);
        let _ = writeln!(mk, "PRODUCT_PACKAGES += \\");
        let modules: Vec<String> = delta
            .overrides
            .override_modules
            .iter()
            .map(|m| format!("    {m}"))
            .collect();
        let _ = writeln!(mk, "{}", modules.join(" \\\n"));
    }

    mk
}

/// Render the full delta as pretty JSON.
///
/// # Errors
///
/// Serialization failure surfaces as a configuration-class error; it cannot
/// occur for well-formed deltas.
pub fn to_json(delta: &DeviceDelta) -> Result<String, DeltaError> {
    serde_json::to_string_pretty(delta).map_err(|e| DeltaError::Config {
        path: Path::new("-").to_path_buf(),
        detail: format!("JSON serialization failed: {e}"),
    })
}

/// Write both report files under `out_dir`, creating it as needed.
///
/// # Errors
///
/// Fails when the directory or either file cannot be written.
pub fn write_reports(
    out_dir: &Path,
    device: &str,
    vendor: &str,
    delta: &DeviceDelta,
) -> Result<(), DeltaError> {
    std::fs::create_dir_all(out_dir).map_err(|e| DeltaError::io(out_dir, e))?;

    let list_path = out_dir.join("proprietary-files.txt");
    std::fs::write(&list_path, proprietary_files(delta))
        .map_err(|e| DeltaError::io(&list_path, e))?;

    let mk_path = out_dir.join(format!("{device}-vendor.mk"));
    std::fs::write(&mk_path, vendor_mk(device, vendor, delta))
        .map_err(|e| DeltaError::io(&mk_path, e))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
