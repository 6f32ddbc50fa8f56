//! Browser binary availability.
//!
//! A revision is available when its binary is already on disk, or when the
//! snapshot server answers a `HEAD` request for it. Online probes share one
//! rate limiter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::models::{AvailabilityConfig, Revision, RevisionId};
use crate::domain::ports::AvailabilityOracle;

/// Subfolders of the binary folder that may hold a revision.
const LOCAL_SOURCES: [&str; 2] = ["downloaded", "artisanal"];

pub struct SnapshotAvailability {
    bin_folder: PathBuf,
    executable_name: String,
    url_template: Option<String>,
    client: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
}

impl SnapshotAvailability {
    pub fn new(config: &AvailabilityConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for snapshot probes")?;
        let rate = NonZeroU32::new(config.probes_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            bin_folder: config.bin_folder.clone(),
            executable_name: config.executable_name.clone(),
            url_template: config.snapshot_url_template.clone(),
            client,
            limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }

    /// Path of the local binary for `id`, if one exists.
    pub fn local_binary(&self, id: &RevisionId) -> Option<PathBuf> {
        LOCAL_SOURCES
            .iter()
            .map(|source| {
                self.bin_folder
                    .join(source)
                    .join(id.to_string())
                    .join(&self.executable_name)
            })
            .find(|path| is_file(path))
    }

    pub fn snapshot_url(&self, id: &RevisionId) -> Option<String> {
        self.url_template
            .as_ref()
            .map(|template| template.replace("{id}", &id.to_string()))
    }

    async fn probe_online(&self, url: &str) -> bool {
        self.limiter.until_ready().await;
        match self.client.head(url).send().await {
            Ok(response) => {
                debug!(url, status = %response.status(), "probed snapshot");
                response.status().is_success()
            }
            Err(e) => {
                warn!(url, error = %e, "snapshot probe failed");
                false
            }
        }
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

#[async_trait]
impl AvailabilityOracle<Revision> for SnapshotAvailability {
    async fn is_available(&self, revision: &Revision) -> bool {
        if let Some(path) = self.local_binary(&revision.id) {
            debug!(revision = %revision, path = %path.display(), "binary found locally");
            return true;
        }
        match self.snapshot_url(&revision.id) {
            Some(url) => self.probe_online(&url).await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bin_folder: &Path, template: Option<String>) -> AvailabilityConfig {
        AvailabilityConfig {
            bin_folder: bin_folder.to_path_buf(),
            executable_name: "chrome".to_string(),
            snapshot_url_template: template,
            probes_per_second: 50,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_local_binary_is_available() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("artisanal").join("1000");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("chrome"), b"").unwrap();

        let oracle = SnapshotAvailability::new(&config(dir.path(), None)).unwrap();
        assert!(oracle.is_available(&Revision::new(1000u64)).await);
        assert!(!oracle.is_available(&Revision::new(1001u64)).await);
    }

    #[tokio::test]
    async fn test_online_snapshot_is_probed() {
        let mut server = mockito::Server::new_async().await;
        let found = server
            .mock("HEAD", "/snapshots/2000/chrome.zip")
            .with_status(200)
            .create_async()
            .await;
        let missing = server
            .mock("HEAD", "/snapshots/2001/chrome.zip")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let template = format!("{}/snapshots/{{id}}/chrome.zip", server.url());
        let oracle = SnapshotAvailability::new(&config(dir.path(), Some(template))).unwrap();

        assert!(oracle.is_available(&Revision::new(2000u64)).await);
        assert!(!oracle.is_available(&Revision::new(2001u64)).await);
        found.assert_async().await;
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_counts_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = SnapshotAvailability::new(&config(
            dir.path(),
            Some("http://127.0.0.1:9/{id}".to_string()),
        ))
        .unwrap();
        assert!(!oracle.is_available(&Revision::new(1u64)).await);
    }
}
