//! Thin readers over an extracted image tree.
//!
//! One module per artifact kind: recursive file listings, `build.prop`
//! key/value databases, and compiled security-context databases. Every reader
//! treats a missing partition (or a missing database inside a present
//! partition) as a skip, and an unreadable existing input as a fatal error.

pub mod contexts;
pub mod files;
pub mod props;
