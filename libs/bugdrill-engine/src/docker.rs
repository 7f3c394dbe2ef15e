/// Docker-based sandbox runner
///
/// **Docker Execution Rules:**
/// 1. Pulls the interpreter image if it is not present
/// 2. Creates one labelled container per run with:
///    - Network disabled
///    - Memory, CPU and pid limits enforced
///    - `no-new-privileges`, every capability dropped, read-only rootfs
///    - Unprivileged user
///    - An in-container `timeout -s KILL` a little past the deadline
/// 3. Runs `python -` and writes the script to its stdin
/// 4. Streams stdout/stderr into capped buffers
/// 5. Kills the container when the deadline passes
/// 6. Force-removes the container on every path, including when the
///    caller stops waiting

use crate::sandbox::{CappedBuffer, SandboxLimits, SandboxRunner};
use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config, CreateContainerOptions,
    KillContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerWaitResponse, HostConfig};
use bollard::Docker;
use bugdrill_common::{EngineError, ExecutionResult};
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Label key set on every sandbox container
pub const SANDBOX_LABEL: &str = "bugdrill.sandbox";

/// Seconds the in-container kill switch waits past the host deadline
const KILL_GRACE_SECS: u64 = 2;

#[derive(Clone)]
pub struct DockerRunner {
    docker: Docker,
    limits: SandboxLimits,
}

impl DockerRunner {
    /// Connect to the local Docker daemon (socket or `DOCKER_HOST`)
    pub fn connect(limits: SandboxLimits) -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Launch(format!("failed to connect to Docker daemon: {}", e)))?;

        Ok(Self::with_client(docker, limits))
    }

    pub fn with_client(docker: Docker, limits: SandboxLimits) -> Self {
        Self { docker, limits }
    }

    /// Ensure Docker image is available (pull if needed)
    async fn ensure_image(&self) -> Result<(), EngineError> {
        let image = self.limits.image.as_str();
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        debug!(image, "pulling sandbox image");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| {
                EngineError::Launch(format!("failed to pull image {}: {}", image, e))
            })?;
        }

        Ok(())
    }

    /// Create, drive and remove one container
    async fn lifecycle(&self, source: &str, timeout: Duration) -> Result<ExecutionResult, EngineError> {
        let id = self.create(timeout).await?;
        let outcome = self.drive(&id, source, timeout).await;
        self.remove(&id).await;

        outcome
    }

    async fn create(&self, timeout: Duration) -> Result<String, EngineError> {
        let name = format!("bugdrill-{}", uuid::Uuid::new_v4());
        let options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(options), container_config(&self.limits, timeout))
            .await
            .map_err(|e| EngineError::Launch(format!("failed to create container: {}", e)))?;

        for warning in &container.warnings {
            warn!(container = %name, "{}", warning);
        }

        Ok(container.id)
    }

    /// Start the container, feed it the script and follow it until exit or deadline
    async fn drive(
        &self,
        id: &str,
        source: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, EngineError> {
        let AttachContainerResults { mut output, mut input } = self
            .docker
            .attach_container(
                id,
                Some(AttachContainerOptions::<String> {
                    stdin: Some(true),
                    stdout: Some(true),
                    stderr: Some(true),
                    stream: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| EngineError::Launch(format!("failed to attach to container: {}", e)))?;

        let start_time = Instant::now();

        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| EngineError::Launch(format!("failed to start container: {}", e)))?;

        let mut stdout = CappedBuffer::new(self.limits.max_output_bytes);
        let mut stderr = CappedBuffer::new(self.limits.max_output_bytes);

        let completion = async {
            let feed = async move {
                if let Err(e) = input.write_all(source.as_bytes()).await {
                    debug!(container = id, error = %e, "stdin closed before the script was written");
                }
                if let Err(e) = input.shutdown().await {
                    debug!(container = id, error = %e, "failed to close stdin");
                }
            };

            let collect = async {
                while let Some(chunk) = output.next().await {
                    match chunk {
                        Ok(LogOutput::StdOut { message }) => stdout.push(&message),
                        Ok(LogOutput::StdErr { message }) => stderr.push(&message),
                        Ok(_) => {}
                        Err(e) => {
                            warn!(container = id, error = %e, "output stream interrupted");
                            break;
                        }
                    }
                }
            };

            tokio::join!(feed, collect);

            let mut wait = self.docker.wait_container(
                id,
                Some(WaitContainerOptions {
                    condition: "not-running",
                }),
            );
            wait_status(wait.next().await)
        };

        let finished = tokio::time::timeout(timeout, completion).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        match finished {
            Ok(exit_code) => Ok(ExecutionResult::exited(
                stdout.into_string(),
                stderr.into_string(),
                exit_code?,
                elapsed_ms,
            )),
            Err(_) => {
                if let Err(e) = self
                    .docker
                    .kill_container(id, None::<KillContainerOptions<String>>)
                    .await
                {
                    debug!(container = id, error = %e, "kill after deadline failed");
                }

                let partial = stderr.into_string();
                let partial = self.limits.keep_partial_stderr.then_some(partial.as_str());
                Ok(ExecutionResult::timed_out(stdout.into_string(), partial, elapsed_ms))
            }
        }
    }

    async fn remove(&self, id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        if let Err(e) = self.docker.remove_container(id, Some(options)).await {
            warn!(container = id, error = %e, "failed to remove sandbox container");
        }
    }
}

#[async_trait]
impl SandboxRunner for DockerRunner {
    async fn run(&self, source: &str, timeout: Duration) -> Result<ExecutionResult, EngineError> {
        self.ensure_image().await?;

        // The spawned task owns the container, so removal still happens
        // when this future is dropped mid-run.
        let runner = self.clone();
        let source = source.to_string();
        let lifecycle = tokio::spawn(async move { runner.lifecycle(&source, timeout).await });

        lifecycle
            .await
            .map_err(|e| EngineError::Launch(format!("sandbox task failed: {}", e)))?
    }
}

/// Container definition for one untrusted run
pub(crate) fn container_config(limits: &SandboxLimits, timeout: Duration) -> Config<String> {
    let kill_after = timeout.as_secs() + KILL_GRACE_SECS;

    Config {
        image: Some(limits.image.clone()),
        cmd: Some(vec![
            "timeout".to_string(),
            "-s".to_string(),
            "KILL".to_string(),
            kill_after.to_string(),
            "python".to_string(),
            "-".to_string(),
        ]),
        user: Some("nobody".to_string()),
        labels: Some(HashMap::from([(SANDBOX_LABEL.to_string(), "true".to_string())])),
        attach_stdin: Some(true),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        open_stdin: Some(true),
        stdin_once: Some(true),
        tty: Some(false),
        network_disabled: Some(true),
        host_config: Some(HostConfig {
            memory: Some(limits.memory_bytes),
            memory_swap: Some(limits.memory_bytes),
            nano_cpus: Some(limits.nano_cpus),
            pids_limit: Some(limits.pids_limit),
            network_mode: Some("none".to_string()),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            cap_drop: Some(vec!["ALL".to_string()]),
            readonly_rootfs: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Bollard surfaces a non-zero exit as `DockerContainerWaitError`
fn wait_status(
    item: Option<Result<ContainerWaitResponse, DockerError>>,
) -> Result<i64, EngineError> {
    match item {
        Some(Ok(response)) => Ok(response.status_code),
        Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
        Some(Err(e)) => Err(EngineError::Launch(format!(
            "failed to wait for container: {}",
            e
        ))),
        None => Err(EngineError::Launch(
            "container wait stream ended without a status".to_string(),
        )),
    }
}
