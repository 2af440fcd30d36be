//! Infrastructure layer — concrete implementations of application port
//! traits: the bollard-backed Docker runtime and the reqwest-backed
//! registry probe.
//!
//! Imports from `crate::domain` and `crate::application::ports` are
//! allowed. Imports from `crate::commands` are forbidden.

pub mod docker;
pub mod registry;
