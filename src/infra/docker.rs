//! Docker runtime adapter — implements the container runtime ports with
//! bollard against the local Docker daemon.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, ListContainersOptions, LogOutput,
    RemoveContainerOptions, RenameContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, ContainerSummary, ImageInspect};
use futures::StreamExt;
use tracing::debug;

use crate::application::ports::{
    ContainerInspector, ContainerLifecycle, ExecOutcome, ExecRunner, ImageStore,
};

/// Production container runtime backed by the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using the platform's default socket/pipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable.
    pub fn connect() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("connecting to Docker daemon")?;
        Ok(Self { docker })
    }
}

impl ContainerInspector for DockerRuntime {
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse> {
        Ok(self.docker.inspect_container(id, None).await?)
    }

    async fn list_containers(
        &self,
        filters: HashMap<String, Vec<String>>,
        all: bool,
    ) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions {
            all,
            filters,
            ..Default::default()
        };
        Ok(self.docker.list_containers(Some(options)).await?)
    }
}

impl ImageStore for DockerRuntime {
    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect> {
        Ok(self.docker.inspect_image(reference).await?)
    }

    async fn pull_image(&self, reference: &str, auth_token: Option<&str>) -> Result<()> {
        let options = CreateImageOptions {
            from_image: reference.to_owned(),
            ..Default::default()
        };
        let credentials = auth_token.map(|token| DockerCredentials {
            registrytoken: Some(token.to_owned()),
            ..Default::default()
        });

        let mut stream = self.docker.create_image(Some(options), None, credentials);
        while let Some(progress) = stream.next().await {
            let info = progress.with_context(|| format!("pulling {reference}"))?;
            if let Some(status) = info.status {
                debug!(image = %reference, status = %status, "pull progress");
            }
        }
        Ok(())
    }
}

impl ContainerLifecycle for DockerRuntime {
    async fn rename_container(&self, id: &str, new_name: &str) -> Result<()> {
        self.docker
            .rename_container(id, RenameContainerOptions { name: new_name })
            .await?;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &str,
        grace: Duration,
        signal: Option<&str>,
    ) -> Result<()> {
        // Deliver the custom signal first; stop enforces the grace period
        // and falls through to SIGKILL if the process ignores it.
        if let Some(signal) = signal {
            self.docker
                .kill_container(id, Some(KillContainerOptions { signal }))
                .await
                .with_context(|| format!("sending {signal} to {id}"))?;
        }
        let t = i64::try_from(grace.as_secs()).unwrap_or(i64::MAX);
        self.docker
            .stop_container(id, Some(StopContainerOptions { t }))
            .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn create_container(&self, name: &str, config: Config<String>) -> Result<String> {
        let options = CreateContainerOptions {
            name,
            platform: None,
        };
        let response = self.docker.create_container(Some(options), config).await?;
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }
}

impl ExecRunner for DockerRuntime {
    async fn exec(&self, container_id: &str, cmd: &[String]) -> Result<ExecOutcome> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(container_id, options)
            .await
            .with_context(|| format!("creating exec in {container_id}"))?;

        let mut output = String::new();
        if let StartExecResults::Attached { output: mut stream, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message } | LogOutput::StdErr { message }) => {
                        output.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("reading exec output from {container_id}")
                        });
                    }
                }
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .with_context(|| format!("inspecting exec in {container_id}"))?;
        Ok(ExecOutcome {
            exit_code: inspect.exit_code.unwrap_or(-1),
            output,
        })
    }
}
