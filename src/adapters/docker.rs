//! Docker CLI worker runtime.
//!
//! Drives the `docker` binary through `tokio::process`. Every worker is a
//! `--rm` container carrying the configured label, so running workers can be
//! counted across processes.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::errors::{DispatchError, DispatchResult};
use crate::domain::models::DispatcherConfig;
use crate::domain::ports::WorkerRuntime;

pub struct DockerCliRuntime {
    config: DispatcherConfig,
    docker: String,
}

impl DockerCliRuntime {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            docker: "docker".to_string(),
        }
    }

    /// Use another executable in place of `docker`.
    pub fn with_binary(mut self, docker: impl Into<String>) -> Self {
        self.docker = docker.into();
        self
    }

    async fn docker(&self, args: &[String]) -> DispatchResult<String> {
        let output = Command::new(&self.docker)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(DispatchError::Runtime(format!(
                "{} {} exited with {}: {}",
                self.docker,
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Arguments of `docker run` for a worker named `name`.
    pub fn run_args(&self, name: &str, worker_args: &[String]) -> Vec<String> {
        let c = &self.config;
        let mut args: Vec<String> = [
            "run",
            "--rm",
            "--name",
            name,
            "--hostname",
            name,
            "--shm-size",
            c.shm_size.as_str(),
            "--memory",
            c.memory_limit.as_str(),
            "--network",
            c.network.as_str(),
            "--label",
            c.label.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for volume in &c.volumes {
            args.push("-v".to_string());
            args.push(volume.clone());
        }
        for var in &c.env_passthrough {
            args.push("-e".to_string());
            args.push(var.clone());
        }
        args.push(c.image.clone());
        args.push(c.entrypoint.clone());
        args.extend(worker_args.iter().cloned());
        args
    }
}

fn ids(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl WorkerRuntime for DockerCliRuntime {
    async fn running_count(&self) -> DispatchResult<usize> {
        let output = self
            .docker(&[
                "ps".to_string(),
                "-q".to_string(),
                "--filter".to_string(),
                format!("label={}", self.config.label),
                "--filter".to_string(),
                "status=running".to_string(),
            ])
            .await?;
        Ok(ids(&output).len())
    }

    async fn remove_stale(&self, name: &str) -> DispatchResult<usize> {
        let list = [
            "ps".to_string(),
            "-a".to_string(),
            "-q".to_string(),
            "--filter".to_string(),
            format!("name=^/{name}$"),
        ];
        let found = AtomicUsize::new(0);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(5))
            .with_max_elapsed_time(Some(Duration::from_millis(self.config.removal_timeout_ms)))
            .build();

        let (this, list, found_ref) = (self, &list, &found);
        backoff::future::retry(policy, move || async move {
            let stale = ids(&this.docker(list).await.map_err(backoff::Error::permanent)?);
            if stale.is_empty() {
                return Ok(());
            }
            found_ref.fetch_max(stale.len(), Ordering::SeqCst);
            let mut rm = vec!["rm".to_string(), "-f".to_string()];
            rm.extend(stale);
            // A removal already in progress makes `rm` fail; the next listing decides.
            if let Err(e) = this.docker(&rm).await {
                debug!(container = %name, error = %e, "stale removal pending");
            }
            Err(backoff::Error::transient(DispatchError::StaleRemoval {
                name: name.to_string(),
                reason: "container still present".to_string(),
            }))
        })
        .await?;

        Ok(found.load(Ordering::SeqCst))
    }

    async fn run(&self, name: &str, args: &[String]) -> DispatchResult<()> {
        let run_args = self.run_args(name, args);
        info!(container = %name, image = %self.config.image, "running worker container");
        let status = Command::new(&self.docker)
            .args(&run_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if status.status.success() {
            Ok(())
        } else {
            Err(DispatchError::WorkerFailed {
                name: name.to_string(),
                status: format!(
                    "{}: {}",
                    status.status,
                    String::from_utf8_lossy(&status.stderr).trim()
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_layout() {
        let mut config = DispatcherConfig::default();
        config.env_passthrough = vec!["DISPLAY".to_string()];
        let runtime = DockerCliRuntime::new(config);
        let args = runtime.run_args(
            "bci_worker_0",
            &["--state_id".to_string(), "1000".to_string()],
        );
        assert_eq!(&args[..4], &["run", "--rm", "--name", "bci_worker_0"]);
        let joined = args.join(" ");
        assert!(joined.contains("--hostname bci_worker_0"));
        assert!(joined.contains("--shm-size 2gb --memory 1g --network bci_net --label bci_worker"));
        assert!(joined.contains("-v /dev/shm:/dev/shm -e DISPLAY bci_worker ./worker.sh"));
        assert!(joined.ends_with("./worker.sh --state_id 1000"));
    }

    #[test]
    fn test_ids_skips_blank_lines() {
        assert_eq!(ids("abc\n\n def \n"), vec!["abc", "def"]);
        assert!(ids("").is_empty());
    }

    #[cfg(unix)]
    fn fake_docker(dir: &std::path::Path, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("docker");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_running_count_counts_listed_ids() {
        let dir = tempfile::tempdir().unwrap();
        let docker = fake_docker(dir.path(), "printf 'a1\\nb2\\n'");
        let runtime = DockerCliRuntime::new(DispatcherConfig::default()).with_binary(docker);
        assert_eq!(runtime.running_count().await.unwrap(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_worker_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let docker = fake_docker(dir.path(), "echo boom >&2; exit 3");
        let runtime = DockerCliRuntime::new(DispatcherConfig::default()).with_binary(docker);
        let err = runtime.run("bci_worker_1", &[]).await.unwrap_err();
        assert!(matches!(err, DispatchError::WorkerFailed { ref name, .. } if name == "bci_worker_1"));
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nothing_stale_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let docker = fake_docker(dir.path(), "exit 0");
        let runtime = DockerCliRuntime::new(DispatcherConfig::default()).with_binary(docker);
        assert_eq!(runtime.remove_stale("bci_worker_0").await.unwrap(), 0);
    }
}
