//! Application services — the update-orchestration use-cases.
//!
//! Services import only from `crate::domain` and
//! `crate::application::ports`; all I/O is routed through injected port
//! traits so every service is testable with canned doubles.

pub mod digest;
pub mod hooks;
pub mod orchestrator;
pub mod self_update;
