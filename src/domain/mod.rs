//! Domain layer — pure update-orchestration logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`, or
//! `crate::application`. Everything here is synchronous: data in, data out.

pub mod container;
pub mod error;
pub mod graph;
pub mod image;
pub mod labels;

pub use container::{ManagedContainer, network_mode_dependency};
pub use error::{CycleError, SelfUpdateError};
pub use graph::{DependencyGraph, propagate_restarts};
pub use image::{DEFAULT_REGISTRY, ImageRef, same_image};
pub use labels::{ControlLabel, LifecycleHook};
