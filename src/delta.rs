//! Generic cross-partition diff engine.
//!
//! Every diff is one-directional: items present upstream (stock) and missing
//! downstream (custom). The reverse direction is never computed. After the
//! main pass, force-include matches from the stock set are unioned in — a
//! force-included stock item is treated as missing even when the custom build
//! produces one, because the local copy is not trustworthy — and the union is
//! re-sorted to restore the ordering invariant.
//!
//! Input sets are maps/sets keyed by identity, so duplicate identities are
//! rejected upstream at construction (listing and the thin readers).

use std::collections::{BTreeMap, BTreeSet};

use crate::filter::FilterSet;
use crate::image::props::PropMap;
use crate::model::types::{BlobEntry, SelinuxContexts};

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Stock entries missing from the custom image, filtered, force-union
/// applied, sorted by destination path.
#[must_use]
pub fn diff_files(
    stock: &BTreeMap<String, BlobEntry>,
    custom: &BTreeMap<String, BlobEntry>,
    filters: &FilterSet,
) -> Vec<BlobEntry> {
    let mut missing: BTreeMap<&String, &BlobEntry> = stock
        .iter()
        .filter(|(path, entry)| {
            !custom.contains_key(*path) && filters.keeps(&entry.combined_path())
        })
        .collect();

    // Force-include union: stock-side matches join the missing set whether or
    // not the custom image has them. The map key makes the union duplicate-free.
    for (path, entry) in stock {
        if filters.is_forced(&entry.combined_path()) {
            missing.insert(path, entry);
        }
    }

    missing.into_values().cloned().collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// A property present in both images with different values.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ChangedProp {
    /// Value in the stock image.
    pub stock: String,
    /// Value in the custom image.
    pub custom: String,
}

/// Property diff for one partition.
///
/// Only `removed` feeds downstream generation; `changed` is reported but not
/// acted upon, since overwriting a custom build's intentional value is out of
/// scope.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PropDelta {
    /// Present in stock, absent in custom.
    pub removed: BTreeMap<String, String>,
    /// Present in both with different values.
    pub changed: BTreeMap<String, ChangedProp>,
}

impl PropDelta {
    /// Whether the diff found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Key-set diff of two property maps, with removed/changed distinguished.
/// Filters evaluate against property keys; force-included stock keys are
/// unioned into `removed`.
#[must_use]
pub fn diff_props(stock: &PropMap, custom: &PropMap, filters: &FilterSet) -> PropDelta {
    let mut delta = PropDelta::default();
    for (key, value) in stock {
        if !filters.keeps(key) {
            continue;
        }
        match custom.get(key) {
            None => {
                delta.removed.insert(key.clone(), value.clone());
            }
            Some(custom_value) if custom_value != value => {
                delta.changed.insert(
                    key.clone(),
                    ChangedProp {
                        stock: value.clone(),
                        custom: custom_value.clone(),
                    },
                );
            }
            Some(_) => {}
        }
    }

    for (key, value) in stock {
        if filters.is_forced(key) {
            delta.removed.insert(key.clone(), value.clone());
            // A forced key lands in exactly one category.
            delta.changed.remove(key);
        }
    }

    delta
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Label-set diff of two context databases: stock labels absent from custom,
/// sorted. The custom table's mapped source paths are irrelevant; only label
/// presence matters.
#[must_use]
pub fn diff_contexts(
    stock: &SelinuxContexts,
    custom: &SelinuxContexts,
    filters: &FilterSet,
) -> Vec<String> {
    let mut missing: BTreeSet<&str> = stock
        .labels()
        .filter(|label| !custom.contains(label) && filters.keeps(label))
        .collect();
    for label in stock.labels() {
        if filters.is_forced(label) {
            missing.insert(label);
        }
    }
    missing.into_iter().map(str::to_owned).collect()
}

// ---------------------------------------------------------------------------
// Generic identities
// ---------------------------------------------------------------------------

/// String-set diff for externally-supplied identity kinds (HAL identities,
/// overlay identities): stock identities absent from custom, filtered,
/// force-union applied, sorted.
#[must_use]
pub fn diff_identities(
    stock: &BTreeSet<String>,
    custom: &BTreeSet<String>,
    filters: &FilterSet,
) -> Vec<String> {
    let mut missing: BTreeSet<&str> = stock
        .iter()
        .filter(|id| !custom.contains(*id) && filters.keeps(id))
        .map(String::as_str)
        .collect();
    for id in stock {
        if filters.is_forced(id) {
            missing.insert(id.as_str());
        }
    }
    missing.into_iter().map(str::to_owned).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
