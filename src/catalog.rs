//! Remote version catalog
//!
//! The artifact repository exposes two metadata endpoints:
//!
//! - the repository index, an HTML-like listing whose anchor texts are the
//!   published version directories
//! - `latest/versions.txt`, a small text body naming the most recent version
//!
//! The scraping is fragile by construction (it depends on the exact anchor
//! formatting of a third-party index page), so it is isolated behind the
//! narrow [`VersionCatalog`] trait and the parsing can be swapped without
//! touching the version resolver.

use crate::error::{BridgeError, BridgeResult};
use crate::fetcher::RetryPolicy;
use crate::ssl::TlsPolicy;
use crate::transport::Transport;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default artifact repository for Bridge CLI bundles
pub const DEFAULT_ARTIFACTORY_URL: &str =
    "https://repo.blackduck.com/bds-integrations-release/com/blackduck/integration/bridge/binaries/bridge-cli-bundle";

/// Line key naming the bundle version inside `latest/versions.txt`
const LATEST_VERSION_KEY: &str = "bridge-cli";

/// Source of truth for which Bridge CLI versions exist remotely
pub trait VersionCatalog {
    /// All versions published in the artifact repository.
    ///
    /// Exhausting retries degrades to a warning and whatever was collected,
    /// never a hard failure; the resolver reports the requested version as
    /// missing instead.
    fn available_versions(&self) -> BridgeResult<Vec<String>>;

    /// The most recent published version
    fn latest_version(&self) -> BridgeResult<String>;
}

/// Catalog scraping an Artifactory-style directory listing
pub struct ArtifactoryCatalog {
    transport: Arc<dyn Transport>,
    policy: TlsPolicy,
    retry: RetryPolicy,
    base_url: String,
    anchor_text: Regex,
    version_token: Regex,
}

impl ArtifactoryCatalog {
    /// Create a catalog rooted at `base_url`
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: TlsPolicy,
        retry: RetryPolicy,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            policy,
            retry,
            base_url: base_url.into(),
            anchor_text: Regex::new(r"<a[^>]*>([^<]+)</a>").expect("valid anchor pattern"),
            version_token: Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+").expect("valid version pattern"),
        }
    }

    /// Fetch a metadata URL with the shared retry/backoff classification
    fn fetch_text(&self, url: &str, what: &str) -> BridgeResult<String> {
        let headers: HashMap<String, String> =
            [("Accept".to_string(), "text/html".to_string())].into();
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = self
                .transport
                .get(url, &headers, &self.policy)
                .and_then(|response| {
                    if response.status != 200 {
                        Err(BridgeError::DownloadFailed {
                            status: response.status,
                        })
                    } else {
                        response.into_text()
                    }
                });
            match result {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if attempt >= self.retry.max_attempts.max(1) || !self.retry.is_retryable(&err) {
                        warn!("Unable to fetch {}: {}", what, err);
                        return Err(err);
                    }
                    info!(
                        "Fetching {} failed, retries left: {}, waiting: {} seconds",
                        what,
                        self.retry.max_attempts - attempt,
                        delay.as_secs_f64()
                    );
                    std::thread::sleep(delay);
                    delay = (delay * self.retry.backoff_multiplier).min(self.retry.max_delay);
                }
            }
        }
    }
}

impl VersionCatalog for ArtifactoryCatalog {
    fn available_versions(&self) -> BridgeResult<Vec<String>> {
        let listing = match self.fetch_text(&self.base_url, "Bridge CLI version listing") {
            Ok(listing) => listing,
            Err(err) => {
                warn!("Unable to retrieve the most recent Bridge CLI versions: {}", err);
                return Ok(Vec::new());
            }
        };
        let versions = parse_version_listing(&listing, &self.anchor_text, &self.version_token);
        debug!("Found {} Bridge CLI versions in the artifact repository", versions.len());
        Ok(versions)
    }

    fn latest_version(&self) -> BridgeResult<String> {
        let url = format!("{}/latest/versions.txt", self.base_url.trim_end_matches('/'));
        let body = self.fetch_text(&url, "latest Bridge CLI version")?;
        parse_latest_version(&body).ok_or_else(|| {
            BridgeError::Undefined(format!(
                "unable to determine the latest Bridge CLI version from {url}"
            ))
        })
    }
}

/// Collect anchor texts that look like version numbers
fn parse_version_listing(html: &str, anchor_text: &Regex, version_token: &Regex) -> Vec<String> {
    let mut versions = Vec::new();
    for capture in anchor_text.captures_iter(html) {
        let text = capture[1].trim().trim_end_matches('/');
        if let Some(found) = version_token.find(text) {
            versions.push(found.as_str().to_string());
        }
    }
    versions
}

/// Extract the version from a `bridge-cli: <version>` metadata line
fn parse_latest_version(body: &str) -> Option<String> {
    for line in body.lines() {
        if line.contains(LATEST_VERSION_KEY) {
            let version = line.split(':').nth(1)?.trim();
            if !version.is_empty() {
                return Some(version.to_string());
            }
        }
    }
    None
}
