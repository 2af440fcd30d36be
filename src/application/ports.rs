//! Port trait definitions for the application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`
//! or `crate::commands`. The production implementations live in
//! `crate::infra`; tests supply canned doubles.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use bollard::container::Config;
use bollard::models::{ContainerInspectResponse, ContainerSummary, ImageInspect};

use crate::domain::ImageRef;

// ── Value types ───────────────────────────────────────────────────────────────

/// Result of one in-container command execution.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// Process exit code as reported by the runtime (`-1` when unavailable).
    pub exit_code: i64,
    /// Combined stdout/stderr.
    pub output: String,
}

// ── Container runtime ports ───────────────────────────────────────────────────

/// Read-only container inspection and listing.
#[allow(async_fn_in_trait)]
pub trait ContainerInspector {
    /// Inspect a single container by ID or name.
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse>;

    /// List containers matching the given filters (`label`, `status`, …).
    async fn list_containers(
        &self,
        filters: HashMap<String, Vec<String>>,
        all: bool,
    ) -> Result<Vec<ContainerSummary>>;
}

/// Local image inspection and pulling.
#[allow(async_fn_in_trait)]
pub trait ImageStore {
    /// Inspect a local image by reference, returning its ID and repo digests.
    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect>;

    /// Pull an image, draining the progress stream to completion.
    async fn pull_image(&self, reference: &str, auth_token: Option<&str>) -> Result<()>;
}

/// Destructive container lifecycle operations: rename, stop, remove,
/// create, start.
#[allow(async_fn_in_trait)]
pub trait ContainerLifecycle {
    /// Rename a container, freeing its current name.
    async fn rename_container(&self, id: &str, new_name: &str) -> Result<()>;

    /// Stop a container within `grace`, optionally delivering a custom
    /// signal first. Must not return before the container is stopped or the
    /// grace period has been enforced by the runtime.
    async fn stop_container(&self, id: &str, grace: Duration, signal: Option<&str>)
    -> Result<()>;

    /// Remove a container; `force` kills it first if still running.
    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;

    /// Create a container with the given name and config, returning its ID.
    async fn create_container(&self, name: &str, config: Config<String>) -> Result<String>;

    /// Start a created container.
    async fn start_container(&self, id: &str) -> Result<()>;
}

/// In-container command execution with combined output capture.
#[allow(async_fn_in_trait)]
pub trait ExecRunner {
    /// Run `cmd` inside the container and wait for its exit code and output.
    ///
    /// Implementations perform the full create/attach/inspect round-trip;
    /// callers bound the wait with their own timeout.
    async fn exec(&self, container_id: &str, cmd: &[String]) -> Result<ExecOutcome>;
}

/// Composite trait — any type implementing the four runtime sub-traits is a
/// `ContainerRuntime`.
pub trait ContainerRuntime:
    ContainerInspector + ImageStore + ContainerLifecycle + ExecRunner
{
}

impl<T> ContainerRuntime for T where
    T: ContainerInspector + ImageStore + ContainerLifecycle + ExecRunner
{
}

// ── Registry port ─────────────────────────────────────────────────────────────

/// Cheap remote-digest lookup against an image registry.
#[allow(async_fn_in_trait)]
pub trait RegistryClient {
    /// Fetch the manifest digest the registry currently serves for
    /// `image:tag`, without pulling the image.
    ///
    /// # Errors
    ///
    /// Returns an error when the registry is unreachable, rejects the
    /// request, or omits the digest header — callers fall back to
    /// pull-and-compare.
    async fn remote_digest(&self, image: &ImageRef, auth_token: Option<&str>) -> Result<String>;
}
