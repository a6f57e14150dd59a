//! Provenance resolution over the diff engine's missing sets.
//!
//! Three resolvers: security-context provenance ([`selinux`]), build-module
//! override detection ([`overrides`]), and presigned-package classification
//! ([`presigned`]).

pub mod overrides;
pub mod presigned;
pub mod selinux;
