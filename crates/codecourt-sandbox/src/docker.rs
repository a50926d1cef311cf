//! Sandbox Executor: one Docker container per writ, run through
//! `bollard`'s async Docker Engine API client.

use crate::scratch::ScratchDir;
use anyhow::{Context, Result};
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;
use codecourt_schemas::RunState;
use futures_util::StreamExt;
use std::time::Duration;

/// Resource bounds and image identity for the judging container. Values
/// are the ones the original executor used in production.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub image: String,
    pub run_timeout: Duration,
    pub output_limit_bytes: usize,
    pub cpu_period: i64,
    pub mem_limit_bytes: i64,
    pub pids_limit: i64,
    pub mem_swappiness: i64,
    pub container_user: String,
    /// Runs the runner as a plain host subprocess instead of inside a
    /// Docker container: no resource limits, no network isolation, no
    /// unprivileged user. Off by default; only for tests that can't reach
    /// a Docker daemon.
    pub insecure_host_exec: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "code-court-executor".to_string(),
            run_timeout: Duration::from_secs(5),
            output_limit_bytes: 100_000,
            cpu_period: 500_000,
            mem_limit_bytes: 128 * 1024 * 1024,
            pids_limit: 50,
            mem_swappiness: 0,
            container_user: "user".to_string(),
            insecure_host_exec: false,
        }
    }
}

/// Outcome of running one writ through the sandbox. `state` is advisory
/// the server always recomputes `is_passed` itself for
/// submissions, but the sandbox is the only thing that knows *why* a run
/// produced no usable output.
#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    pub output: String,
    pub state: RunState,
}

pub struct Sandbox {
    docker: Docker,
    config: SandboxConfig,
}

impl Sandbox {
    pub fn connect_local(config: SandboxConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().context("connecting to Docker engine")?;
        Ok(Self { docker, config })
    }

    pub fn with_docker(docker: Docker, config: SandboxConfig) -> Self {
        Self { docker, config }
    }

    /// Run one writ to completion: stage the scratch dir, launch the
    /// container, collect stdout under the output cap and wall-clock
    /// timeout, then clean up. Always removes the container, even on the
    /// error paths.
    pub async fn execute(&self, run_script: &str, input: &str, source_code: &str) -> Result<SandboxOutcome> {
        if self.config.insecure_host_exec {
            return self.run_host_exec(run_script, input, source_code).await;
        }

        let scratch = ScratchDir::create(run_script, input, source_code)?;
        let container_name = format!("codecourt-{}", uuid::Uuid::new_v4());

        let host_config = HostConfig {
            binds: Some(vec![format!("{}:/share:ro", scratch.host_path().display())]),
            memory: Some(self.config.mem_limit_bytes),
            memory_swappiness: Some(self.config.mem_swappiness),
            pids_limit: Some(self.config.pids_limit),
            cpu_period: Some(self.config.cpu_period),
            network_mode: Some("none".to_string()),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(self.config.image.clone()),
            cmd: Some(vec!["/share/runner".to_string()]),
            working_dir: Some("/share".to_string()),
            user: Some(self.config.container_user.clone()),
            network_disabled: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container_name.clone(),
                    platform: None,
                }),
                container_config,
            )
            .await
            .context("creating sandbox container")?;

        let outcome = self.run_created_container(&created.id).await;

        let _ = self
            .docker
            .remove_container(
                &created.id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;

        outcome
    }

    /// Insecure fallback: runs the staged `runner` directly as a host
    /// subprocess, no container, no resource limits. Same timeout and
    /// output cap as the Docker path so callers see the same outcome
    /// states either way.
    async fn run_host_exec(&self, run_script: &str, input: &str, source_code: &str) -> Result<SandboxOutcome> {
        let scratch = ScratchDir::create_for_host_exec(run_script, input, source_code)?;
        let runner_path = scratch.host_path().join("runner");

        let mut cmd = tokio::process::Command::new(&runner_path);
        cmd.current_dir(scratch.host_path())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().context("spawning insecure host-exec runner")?;

        let output = match tokio::time::timeout(self.config.run_timeout, child.wait_with_output()).await {
            Err(_) => {
                return Ok(SandboxOutcome {
                    output: "Error: Timed out".to_string(),
                    state: RunState::TimedOut,
                });
            }
            Ok(result) => result.context("running insecure host-exec runner")?,
        };

        let mut out = String::from_utf8_lossy(&output.stdout).into_owned();
        out.push_str(&String::from_utf8_lossy(&output.stderr));

        if out.len() > self.config.output_limit_bytes {
            Ok(SandboxOutcome {
                output: "Error: Output limit exceeded".to_string(),
                state: RunState::OutputLimitExceeded,
            })
        } else if out.is_empty() {
            Ok(SandboxOutcome {
                output: out,
                state: RunState::NoOutput,
            })
        } else {
            Ok(SandboxOutcome {
                output: out,
                state: RunState::Executed,
            })
        }
    }

    async fn run_created_container(&self, container_id: &str) -> Result<SandboxOutcome> {
        self.docker
            .start_container::<String>(container_id, None)
            .await
            .context("starting sandbox container")?;

        let collect = self.collect_output(container_id);

        match tokio::time::timeout(self.config.run_timeout, collect).await {
            Err(_) => Ok(SandboxOutcome {
                output: "Error: Timed out".to_string(),
                state: RunState::TimedOut,
            }),
            Ok(Err(CollectError::OutputLimitExceeded)) => Ok(SandboxOutcome {
                output: "Error: Output limit exceeded".to_string(),
                state: RunState::OutputLimitExceeded,
            }),
            Ok(Err(CollectError::Other(err))) => Err(err),
            Ok(Ok(output)) => {
                self.wait_for_exit(container_id).await?;
                if output.is_empty() {
                    Ok(SandboxOutcome {
                        output,
                        state: RunState::NoOutput,
                    })
                } else {
                    Ok(SandboxOutcome {
                        output,
                        state: RunState::Executed,
                    })
                }
            }
        }
    }

    async fn collect_output(&self, container_id: &str) -> Result<String, CollectError> {
        let mut stream = self.docker.logs(
            container_id,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("reading sandbox container logs")?;
            out.push_str(&chunk.to_string());
            if out.len() > self.config.output_limit_bytes {
                return Err(CollectError::OutputLimitExceeded);
            }
        }
        Ok(out)
    }

    async fn wait_for_exit(&self, container_id: &str) -> Result<()> {
        let mut stream = self
            .docker
            .wait_container(container_id, None::<WaitContainerOptions<String>>);
        while let Some(result) = stream.next().await {
            // A non-zero exit code is still a completed run; the
            // comparator, not the sandbox, decides pass/fail.
            result.context("waiting for sandbox container to exit")?;
        }
        Ok(())
    }
}

enum CollectError {
    OutputLimitExceeded,
    Other(anyhow::Error),
}

impl<E: Into<anyhow::Error>> From<E> for CollectError {
    fn from(err: E) -> Self {
        CollectError::Other(err.into())
    }
}
