//! Shared test infrastructure for provender integration tests.
#![allow(dead_code)]
//!
//! Provides [`ImagePair`], a stock/custom image-tree pair in a temporary
//! directory, plus helpers for writing property databases, context databases,
//! policy source directories, and device configs. Each instance gets its own
//! temp dir and cleans up on drop.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use provender::config::DeviceConfig;
use provender::model::types::Partition;

// ---------------------------------------------------------------------------
// ImagePair
// ---------------------------------------------------------------------------

/// A self-contained stock/custom image pair in a temporary directory.
pub struct ImagePair {
    /// The temp dir — held to prevent premature cleanup.
    _dir: TempDir,
    /// Absolute path to the fixture root.
    root: PathBuf,
}

impl ImagePair {
    /// Create an empty fixture. Partitions appear when files are written.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("stock")).expect("mkdir stock");
        fs::create_dir_all(root.join("custom")).expect("mkdir custom");
        Self { _dir: dir, root }
    }

    /// The stock image root.
    #[must_use]
    pub fn stock(&self) -> PathBuf {
        self.root.join("stock")
    }

    /// The custom image root.
    #[must_use]
    pub fn custom(&self) -> PathBuf {
        self.root.join("custom")
    }

    /// Write a file under the stock root, e.g. `vendor/lib64/libfoo.so`.
    pub fn stock_file(&self, rel: &str, content: &str) {
        write_file(&self.stock().join(rel), content);
    }

    /// Write a file under the custom root.
    pub fn custom_file(&self, rel: &str, content: &str) {
        write_file(&self.custom().join(rel), content);
    }

    /// Materialize an empty partition directory in the custom tree, so the
    /// partition counts as present (not skipped).
    pub fn custom_partition(&self, partition: Partition) {
        fs::create_dir_all(self.custom().join(partition.as_str())).expect("mkdir partition");
    }

    /// Write a stock partition's build.prop from key/value pairs.
    pub fn stock_props(&self, partition: Partition, pairs: &[(&str, &str)]) {
        write_file(
            &self.stock().join(partition.as_str()).join("build.prop"),
            &prop_text(pairs),
        );
    }

    /// Write a custom partition's build.prop from key/value pairs.
    pub fn custom_props(&self, partition: Partition, pairs: &[(&str, &str)]) {
        write_file(
            &self.custom().join(partition.as_str()).join("build.prop"),
            &prop_text(pairs),
        );
    }

    /// Write a stock partition's compiled context database from
    /// `(path, type label)` pairs.
    pub fn stock_contexts(&self, partition: Partition, entries: &[(&str, &str)]) {
        write_file(
            &self.stock().join(contexts_rel(partition)),
            &contexts_text(entries),
        );
    }

    /// Write a custom partition's compiled context database.
    pub fn custom_contexts(&self, partition: Partition, entries: &[(&str, &str)]) {
        write_file(
            &self.custom().join(contexts_rel(partition)),
            &contexts_text(entries),
        );
    }

    /// Create a policy source directory under the fixture root and return
    /// its absolute path.
    #[must_use]
    pub fn policy_dir(&self, name: &str) -> PathBuf {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir).expect("mkdir policy dir");
        dir
    }

    /// Write a file into a policy source directory created by `policy_dir`.
    pub fn policy_file(&self, dir_name: &str, rel: &str, content: &str) {
        write_file(&self.root.join(dir_name).join(rel), content);
    }

    /// Write a device config TOML and return its path.
    #[must_use]
    pub fn write_config(&self, text: &str) -> PathBuf {
        let path = self.root.join("device.toml");
        write_file(&path, text);
        path
    }

    /// Write and load a device config in one step.
    #[must_use]
    pub fn load_config(&self, text: &str) -> DeviceConfig {
        DeviceConfig::load(&self.write_config(text)).expect("valid device config")
    }

    /// Write an arbitrary fixture file (module-info.json, package lists) and
    /// return its path.
    #[must_use]
    pub fn write_input(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root.join(name);
        write_file(&path, content);
        path
    }
}

impl Default for ImagePair {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir parents");
    }
    fs::write(path, content).expect("write file");
}

fn prop_text(pairs: &[(&str, &str)]) -> String {
    let mut text = String::new();
    for (key, value) in pairs {
        text.push_str(key);
        text.push('=');
        text.push_str(value);
        text.push('\n');
    }
    text
}

fn contexts_rel(partition: Partition) -> String {
    let db = match partition {
        Partition::System => "plat_file_contexts".to_owned(),
        other => format!("{}_file_contexts", other.as_str()),
    };
    format!("{}/etc/selinux/{db}", partition.as_str())
}

fn contexts_text(entries: &[(&str, &str)]) -> String {
    let mut text = String::new();
    for (path, label) in entries {
        text.push_str(&format!("{path}  u:object_r:{label}:s0\n"));
    }
    text
}
