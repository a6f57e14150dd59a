//! Allow/deny/force-include pattern evaluation.
//!
//! Every diff stage routes its candidates through a [`FilterSet`]. An item is
//! kept iff (no include patterns, or it matches one) AND it matches no
//! exclude pattern. Force-include patterns are evaluated independently and
//! their matches are unioned back in after the main diff pass.
//!
//! Force-include bypasses the include list and the "present in custom" check,
//! but never bypasses excludes: an excluded item stays excluded even when a
//! force-include pattern also matches it.
//!
//! Patterns compile at configuration-load time; evaluation itself cannot
//! fail.

use glob::Pattern;
use serde::Deserialize;

use crate::error::DeltaError;

// ---------------------------------------------------------------------------
// FilterDef — raw config form
// ---------------------------------------------------------------------------

/// Pattern lists for one artifact category, as written in the device config.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterDef {
    /// Keep only matching items (empty = keep everything).
    #[serde(default)]
    pub include: Vec<String>,
    /// Drop matching items.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Treat matching stock items as missing regardless of the diff outcome.
    #[serde(default)]
    pub force_include: Vec<String>,
}

// ---------------------------------------------------------------------------
// FilterSet — compiled form
// ---------------------------------------------------------------------------

/// Compiled filter set for one artifact category.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    force_include: Vec<Pattern>,
}

impl FilterSet {
    /// Compile a raw definition. `category` names the filter group in error
    /// messages (`files`, `props`, `contexts`, `sepolicy_dirs`).
    pub fn compile(def: &FilterDef, category: &str) -> Result<Self, DeltaError> {
        Ok(Self {
            include: compile_list(&def.include, category)?,
            exclude: compile_list(&def.exclude, category)?,
            force_include: compile_list(&def.force_include, category)?,
        })
    }

    /// Whether the main include/exclude pass keeps `candidate`.
    #[must_use]
    pub fn keeps(&self, candidate: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|p| p.matches(candidate));
        included && !self.is_excluded(candidate)
    }

    /// Whether `candidate` is force-included. Excludes still win.
    #[must_use]
    pub fn is_forced(&self, candidate: &str) -> bool {
        self.force_include.iter().any(|p| p.matches(candidate)) && !self.is_excluded(candidate)
    }

    /// Apply the main pass to a candidate sequence, order-preserving.
    pub fn apply<'a, I>(&self, candidates: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates.into_iter().filter(|c| self.keeps(c)).collect()
    }

    /// Select the force-included candidates, order-preserving.
    pub fn match_force<'a, I>(&self, candidates: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|c| self.is_forced(c))
            .collect()
    }

    /// Whether no patterns are configured at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty() && self.force_include.is_empty()
    }

    fn is_excluded(&self, candidate: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(candidate))
    }
}

fn compile_list(patterns: &[String], category: &str) -> Result<Vec<Pattern>, DeltaError> {
    patterns
        .iter()
        .map(|raw| {
            Pattern::new(raw).map_err(|e| DeltaError::InvalidPattern {
                category: category.to_owned(),
                pattern: raw.clone(),
                reason: e.msg.to_owned(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
