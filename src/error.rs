//! Error types for the delta resolver.
//!
//! Defines [`DeltaError`], the unified error type for all resolver operations.
//! Variants map onto the three fatal classes the resolver distinguishes:
//! configuration errors (reject the run before any diffing starts),
//! data-integrity violations (distinct kinds so the caller can decide whether
//! to abort the run or skip the offending entry), and I/O failures on
//! required inputs. Skippable conditions — an absent partition, an unresolved
//! context label — are never errors; they are results.

use std::fmt;
use std::path::PathBuf;

use crate::model::types::Partition;

// ---------------------------------------------------------------------------
// DeltaError
// ---------------------------------------------------------------------------

/// Unified error type for delta and provenance resolution.
///
/// Each variant is self-contained: the message names the offending input and
/// what to do about it, without requiring additional context from the caller.
#[derive(Debug)]
pub enum DeltaError {
    /// A filter pattern failed to compile.
    InvalidPattern {
        /// Filter category the pattern belongs to (`files`, `props`, ...).
        category: String,
        /// The pattern as written in the config.
        pattern: String,
        /// Why the pattern is invalid.
        reason: String,
    },

    /// A partition name outside the fixed partition set.
    UnknownPartition {
        /// The name that was provided.
        name: String,
    },

    /// The device configuration could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// Two artifacts with the same identity appeared in one listed set.
    DuplicateIdentity {
        /// Partition whose listing produced the duplicate.
        partition: Partition,
        /// The duplicated identity (destination path or property key).
        identity: String,
    },

    /// Two build modules claim to install the same path.
    ModulePathConflict {
        /// The contested installed path.
        path: String,
        /// The module that claimed the path first.
        first: String,
        /// The module that claimed it again.
        second: String,
    },

    /// An I/O failure while reading a required input.
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl DeltaError {
    /// Wrap an I/O error with the path that was being read.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for DeltaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPattern {
                category,
                pattern,
                reason,
            } => {
                write!(
                    f,
                    "invalid {category} filter pattern '{pattern}': {reason}\n  To fix: correct the pattern in the device config; patterns use glob syntax."
                )
            }
            Self::UnknownPartition { name } => {
                write!(
                    f,
                    "unknown partition '{name}'.\n  To fix: use one of: {}",
                    Partition::ALL
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            Self::Config { path, detail } => {
                write!(
                    f,
                    "configuration error in '{}': {}\n  To fix: edit the config file and correct the issue.",
                    path.display(),
                    detail
                )
            }
            Self::DuplicateIdentity {
                partition,
                identity,
            } => {
                write!(
                    f,
                    "duplicate artifact identity '{identity}' in {partition} listing.\n  To fix: the input set is corrupt; re-extract the image or deduplicate the source file."
                )
            }
            Self::ModulePathConflict {
                path,
                first,
                second,
            } => {
                write!(
                    f,
                    "modules '{first}' and '{second}' both install '{path}'.\n  To fix: fix the build metadata, or pass --lenient-modules to keep the first claimant."
                )
            }
            Self::Io { path, source } => {
                write!(
                    f,
                    "I/O error reading '{}': {source}\n  To fix: check that the path exists and is readable.",
                    path.display()
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for DeltaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
