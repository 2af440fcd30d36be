//! Snapshot model of one managed container plus derived dependency facts.
//!
//! A [`ManagedContainer`] is constructed fresh per orchestration pass from a
//! runtime inspect call and discarded after the pass; it is never persisted.

use std::collections::HashMap;

use bollard::container::Config;
use bollard::models::ContainerInspectResponse;

use crate::domain::labels;

/// Length of the short container ID form.
pub const SHORT_ID_LEN: usize = 12;

/// One running container as seen at the start of a pass.
#[derive(Debug, Clone, Default)]
pub struct ManagedContainer {
    /// Full runtime ID.
    pub id: String,
    /// 12-character ID prefix.
    pub short_id: String,
    /// Display name: first runtime name with the leading separator stripped,
    /// falling back to the short ID when unnamed.
    pub name: String,
    /// Image reference the container was created from.
    pub image_ref: String,
    /// Content-addressed ID of the image the container is running.
    pub image_id: String,
    /// Container labels.
    pub labels: HashMap<String, String>,
    /// Names of containers this one is legacy-linked to.
    pub links: Vec<String>,
    /// Names declared via the explicit dependency label.
    pub depends_on: Vec<String>,
    /// Names/IDs implied by running in another container's network namespace.
    pub network_deps: Vec<String>,
    /// Whether the container is currently running.
    pub running: bool,
    /// Set during sort post-processing when a dependency is being updated.
    pub implicit_restart: bool,
    /// Raw inspect response, kept for recreation.
    pub raw: Option<Box<ContainerInspectResponse>>,
}

impl ManagedContainer {
    /// Build a snapshot from a runtime inspect response.
    #[must_use]
    pub fn from_inspect(resp: &ContainerInspectResponse) -> Self {
        let id = resp.id.clone().unwrap_or_default();
        let short_id: String = id.chars().take(SHORT_ID_LEN).collect();

        let name = resp
            .name
            .as_deref()
            .map(|n| n.trim_start_matches('/').to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| short_id.clone());

        let config = resp.config.as_ref();
        let host_config = resp.host_config.as_ref();

        let labels = config
            .and_then(|c| c.labels.clone())
            .unwrap_or_default();

        // HostConfig links come as "/dependency:/dependent/alias".
        let links = host_config
            .and_then(|h| h.links.as_ref())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.split(':').next())
                    .map(|target| target.trim_start_matches('/').to_owned())
                    .filter(|target| !target.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let depends_on = labels::depends_on(&labels);
        let network_deps = host_config
            .and_then(|h| h.network_mode.as_deref())
            .and_then(network_mode_dependency)
            .into_iter()
            .collect();

        Self {
            id,
            short_id,
            name,
            image_ref: config.and_then(|c| c.image.clone()).unwrap_or_default(),
            image_id: resp.image.clone().unwrap_or_default(),
            labels,
            links,
            depends_on,
            network_deps,
            running: resp
                .state
                .as_ref()
                .and_then(|s| s.running)
                .unwrap_or(false),
            implicit_restart: false,
            raw: Some(Box::new(resp.clone())),
        }
    }

    /// All dependency names in order Links → DependsOn → NetworkDeps,
    /// de-duplicated, first occurrence wins.
    #[must_use]
    pub fn dependency_names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.links
            .iter()
            .chain(self.depends_on.iter())
            .chain(self.network_deps.iter())
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Container config for the replacement, carrying over the original
    /// configuration with the image swapped for `new_image`.
    #[must_use]
    pub fn recreate_config(&self, new_image: &str) -> Config<String> {
        let original = self.raw.as_ref().and_then(|r| r.config.clone());
        let host_config = self.raw.as_ref().and_then(|r| r.host_config.clone());

        let mut config = Config {
            image: Some(new_image.to_owned()),
            host_config,
            ..Default::default()
        };
        if let Some(original) = original {
            config.hostname = original.hostname;
            config.domainname = original.domainname;
            config.user = original.user;
            config.env = original.env;
            config.cmd = original.cmd;
            config.entrypoint = original.entrypoint;
            config.labels = original.labels;
            config.working_dir = original.working_dir;
            config.volumes = original.volumes;
            config.exposed_ports = original.exposed_ports;
            config.stop_signal = original.stop_signal;
            config.stop_timeout = original.stop_timeout;
            config.tty = original.tty;
            config.open_stdin = original.open_stdin;
        }
        config
    }
}

/// Extract the implicit dependency from a network mode string.
///
/// `container:<name-or-id>` means this container runs inside another
/// container's network namespace. Whatever follows the prefix is kept
/// verbatim — it may be a name, a full ID, or a short ID, and the graph
/// index must resolve all three forms.
#[must_use]
pub fn network_mode_dependency(network_mode: &str) -> Option<String> {
    let target = network_mode.strip_prefix("container:")?;
    if target.is_empty() {
        return None;
    }
    Some(target.to_owned())
}
