//! Shared mock infrastructure for unit tests.
//!
//! Provides a canned in-memory runtime implementing the container and
//! registry ports, plus builders for inspect responses, so each test file
//! doesn't have to re-define the same boilerplate.

#![allow(clippy::expect_used)]
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, bail};
use bollard::container::Config;
use bollard::models::{
    ContainerConfig, ContainerInspectResponse, ContainerState, ContainerSummary, HostConfig,
    ImageInspect,
};
use tokio_util::sync::CancellationToken;

use arcane_updater::application::ports::{
    ContainerInspector, ContainerLifecycle, ExecOutcome, ExecRunner, ImageStore, RegistryClient,
};
use arcane_updater::domain::{ImageRef, ManagedContainer};

// ── Fake runtime ──────────────────────────────────────────────────────────────

/// In-memory runtime double. Containers and images live in maps; every
/// mutating call is appended to `calls` so tests can assert ordering.
#[derive(Default)]
pub struct FakeRuntime {
    pub containers: Mutex<HashMap<String, ContainerInspectResponse>>,
    pub summaries: Mutex<Vec<ContainerSummary>>,
    pub images: Mutex<HashMap<String, ImageInspect>>,
    /// Images installed into the local store when their reference is pulled.
    pub images_after_pull: Mutex<HashMap<String, ImageInspect>>,
    /// Per-container canned exec results: (exit code, combined output).
    pub exec_responses: Mutex<HashMap<String, (i64, String)>>,
    /// Artificial delay before every exec completes.
    pub exec_delay: Option<Duration>,
    pub fail_rename: bool,
    pub fail_pull: bool,
    pub fail_stop_ids: Vec<String>,
    pub fail_remove_ids: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("calls lock").push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn add_container(&self, resp: ContainerInspectResponse) {
        let id = resp.id.clone().expect("container id");
        self.containers
            .lock()
            .expect("containers lock")
            .insert(id, resp);
    }

    pub fn add_image(&self, reference: &str, id: &str, repo_digest: Option<&str>) {
        self.images.lock().expect("images lock").insert(
            reference.to_owned(),
            image_inspect(id, repo_digest),
        );
    }

    pub fn set_exec_response(&self, container_id: &str, exit_code: i64, output: &str) {
        self.exec_responses
            .lock()
            .expect("exec lock")
            .insert(container_id.to_owned(), (exit_code, output.to_owned()));
    }
}

impl ContainerInspector for FakeRuntime {
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse> {
        match self.containers.lock().expect("containers lock").get(id) {
            Some(resp) => Ok(resp.clone()),
            None => bail!("no such container: {id}"),
        }
    }

    async fn list_containers(
        &self,
        _filters: HashMap<String, Vec<String>>,
        all: bool,
    ) -> Result<Vec<ContainerSummary>> {
        self.record(format!("list all={all}"));
        Ok(self.summaries.lock().expect("summaries lock").clone())
    }
}

impl ImageStore for FakeRuntime {
    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect> {
        match self.images.lock().expect("images lock").get(reference) {
            Some(inspect) => Ok(inspect.clone()),
            None => bail!("no such image: {reference}"),
        }
    }

    async fn pull_image(&self, reference: &str, _auth_token: Option<&str>) -> Result<()> {
        self.record(format!("pull {reference}"));
        if self.fail_pull {
            bail!("pull denied");
        }
        if let Some(updated) = self
            .images_after_pull
            .lock()
            .expect("images lock")
            .get(reference)
        {
            self.images
                .lock()
                .expect("images lock")
                .insert(reference.to_owned(), updated.clone());
        }
        Ok(())
    }
}

impl ContainerLifecycle for FakeRuntime {
    async fn rename_container(&self, id: &str, new_name: &str) -> Result<()> {
        self.record(format!("rename {id} -> {new_name}"));
        if self.fail_rename {
            bail!("rename rejected");
        }
        let mut containers = self.containers.lock().expect("containers lock");
        match containers.get_mut(id) {
            Some(resp) => {
                resp.name = Some(format!("/{new_name}"));
                Ok(())
            }
            None => bail!("no such container: {id}"),
        }
    }

    async fn stop_container(
        &self,
        id: &str,
        _grace: Duration,
        signal: Option<&str>,
    ) -> Result<()> {
        match signal {
            Some(signal) => self.record(format!("stop {id} signal={signal}")),
            None => self.record(format!("stop {id}")),
        }
        if self.fail_stop_ids.iter().any(|f| f == id) {
            bail!("container already exited");
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        self.record(format!("remove {id} force={force}"));
        if self.fail_remove_ids.iter().any(|f| f == id) {
            bail!("removal in progress");
        }
        self.containers.lock().expect("containers lock").remove(id);
        Ok(())
    }

    async fn create_container(&self, name: &str, config: Config<String>) -> Result<String> {
        self.record(format!(
            "create {name} image={}",
            config.image.unwrap_or_default()
        ));
        Ok(format!("new-{name}"))
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.record(format!("start {id}"));
        Ok(())
    }
}

impl ExecRunner for FakeRuntime {
    async fn exec(&self, container_id: &str, cmd: &[String]) -> Result<ExecOutcome> {
        if let Some(delay) = self.exec_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(format!("exec {container_id} {}", cmd.join(" ")));
        let (exit_code, output) = self
            .exec_responses
            .lock()
            .expect("exec lock")
            .get(container_id)
            .cloned()
            .unwrap_or((0, String::new()));
        Ok(ExecOutcome { exit_code, output })
    }
}

// ── Fake registry ─────────────────────────────────────────────────────────────

/// Registry double keyed by the canonical `registry/repository:tag` form.
/// Unknown references behave as an unreachable registry.
#[derive(Default)]
pub struct FakeRegistry {
    pub digests: HashMap<String, String>,
}

impl FakeRegistry {
    pub fn with_digest(mut self, reference: &str, digest: &str) -> Self {
        let key = ImageRef::parse(reference).to_string();
        self.digests.insert(key, digest.to_owned());
        self
    }
}

impl RegistryClient for FakeRegistry {
    async fn remote_digest(&self, image: &ImageRef, _auth_token: Option<&str>) -> Result<String> {
        match self.digests.get(&image.to_string()) {
            Some(digest) => Ok(digest.clone()),
            None => bail!("registry unreachable"),
        }
    }
}

// ── Builders ──────────────────────────────────────────────────────────────────

pub fn image_inspect(id: &str, repo_digest: Option<&str>) -> ImageInspect {
    ImageInspect {
        id: Some(id.to_owned()),
        repo_digests: repo_digest.map(|d| vec![d.to_owned()]),
        ..Default::default()
    }
}

pub fn inspect_response(
    id: &str,
    name: &str,
    image_ref: &str,
    labels: &[(&str, &str)],
) -> ContainerInspectResponse {
    ContainerInspectResponse {
        id: Some(id.to_owned()),
        name: Some(format!("/{name}")),
        image: Some(format!("sha256:{id}-image")),
        config: Some(ContainerConfig {
            image: Some(image_ref.to_owned()),
            labels: Some(label_map(labels)),
            ..Default::default()
        }),
        host_config: Some(HostConfig::default()),
        state: Some(ContainerState {
            running: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn container(id: &str, name: &str, image_ref: &str) -> ManagedContainer {
    ManagedContainer::from_inspect(&inspect_response(id, name, image_ref, &[]))
}

pub fn container_with_labels(
    id: &str,
    name: &str,
    image_ref: &str,
    labels: &[(&str, &str)],
) -> ManagedContainer {
    ManagedContainer::from_inspect(&inspect_response(id, name, image_ref, labels))
}

pub fn label_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

pub fn summary(
    id: &str,
    name: &str,
    created: i64,
    labels: &[(&str, &str)],
) -> ContainerSummary {
    ContainerSummary {
        id: Some(id.to_owned()),
        names: Some(vec![format!("/{name}")]),
        created: Some(created),
        labels: Some(label_map(labels)),
        ..Default::default()
    }
}

pub fn token() -> CancellationToken {
    CancellationToken::new()
}
