//! Retrieval of the canonical hardening document

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use provision::Fetcher;

/// Upper bound for a configuration document
const MAX_DOCUMENT_SIZE: u64 = 1024 * 1024;

/// Fetches over HTTP(S), or from disk for `file://` sources
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .agent
            .get(url)
            .header(
                "User-Agent",
                concat!("hostprep/", env!("CARGO_PKG_VERSION")),
            )
            .call()
            .with_context(|| format!("Failed to download {url}"))?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_DOCUMENT_SIZE)
            .read_to_vec()
            .context("Failed to read response body")
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        if let Some(path) = source.strip_prefix("file://") {
            return read_local(Path::new(path));
        }
        self.download(source)
    }
}

fn read_local(path: &Path) -> Result<Vec<u8>> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Could not read {}", path.display()))?
        .len();
    if size > MAX_DOCUMENT_SIZE {
        anyhow::bail!(
            "{} is {size} bytes, larger than the {MAX_DOCUMENT_SIZE} byte limit",
            path.display()
        );
    }
    std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))
}
