//! Retrying download fetcher
//!
//! Streams an HTTP(S) GET to disk, validates the declared Content-Length
//! against the bytes written, and retries transient failures with capped
//! exponential backoff. A status code in the non-retryable set short-circuits
//! remaining attempts; a content-length mismatch is treated as a flaky
//! transfer and is retried.

use crate::error::{BridgeError, BridgeResult};
use crate::progress::download_bar;
use crate::ssl::TlsPolicy;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fallback archive name when the URL has no usable final path segment
const DEFAULT_ARCHIVE_NAME: &str = "bridge-cli-bundle.zip";

/// Environment variable holding the agent-scoped temp directory
pub const AGENT_TEMP_ENV: &str = "AGENT_TEMPDIRECTORY";

/// Retry behavior for downloads and metadata fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts (not retries); 0 means fail without trying
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_multiplier: u32,
    /// Ceiling for the backoff delay
    pub max_delay: Duration,
    /// HTTP statuses that mean the request was definitively rejected
    pub non_retryable: HashSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(15),
            backoff_multiplier: 2,
            max_delay: Duration::from_secs(120),
            non_retryable: [200, 201, 401, 403, 416].into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Whether a failed attempt should be retried under this policy
    pub fn is_retryable(&self, err: &BridgeError) -> bool {
        match err {
            BridgeError::DownloadFailed { status } => !self.non_retryable.contains(status),
            // A size mismatch signals a flaky transfer, not a rejection
            BridgeError::ContentLengthMismatch { .. } => true,
            BridgeError::Transport(_) | BridgeError::Io(_) => true,
            _ => false,
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        (current * self.backoff_multiplier).min(self.max_delay)
    }
}

/// One download request
#[derive(Debug, Clone)]
pub struct DownloadSpec {
    /// Source URL
    pub url: String,
    /// Destination: an explicit file path, or a directory (the file name is
    /// then derived from the URL). Relative paths are joined with the agent
    /// temp directory.
    pub destination: PathBuf,
    /// Extra request headers
    pub headers: HashMap<String, String>,
}

impl DownloadSpec {
    /// Download `url` into the given directory or file path
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            headers: HashMap::new(),
        }
    }
}

/// Streaming downloader with retry
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    temp_dir: PathBuf,
}

impl Fetcher {
    /// Create a fetcher resolving relative destinations against `temp_dir`
    pub fn new(transport: Arc<dyn Transport>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            temp_dir: temp_dir.into(),
        }
    }

    /// Fetch the spec's URL to disk, retrying per `retry`
    ///
    /// On success exactly one file exists at the returned path. No partial
    /// file is left behind on any terminal failure path.
    pub fn fetch(
        &self,
        spec: &DownloadSpec,
        policy: &TlsPolicy,
        retry: &RetryPolicy,
    ) -> BridgeResult<PathBuf> {
        if spec.url.trim().is_empty() {
            return Err(BridgeError::EmptyDownloadUrl);
        }
        let dest = self.resolve_destination(spec);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("Download request: {} -> {}", spec.url, dest.display());

        let mut delay = retry.initial_delay;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.attempt(spec, &dest, policy) {
                Ok(()) => {
                    info!("Bridge CLI download completed: {}", dest.display());
                    return Ok(dest);
                }
                Err(err) => {
                    if attempt >= retry.max_attempts.max(1) || !retry.is_retryable(&err) {
                        remove_stale_file(&dest);
                        return Err(err);
                    }
                    info!(
                        "Bridge CLI download failed, retries left: {}, waiting: {} seconds",
                        retry.max_attempts - attempt,
                        delay.as_secs_f64()
                    );
                    std::thread::sleep(delay);
                    delay = retry.next_delay(delay);
                }
            }
        }
    }

    fn attempt(&self, spec: &DownloadSpec, dest: &Path, policy: &TlsPolicy) -> BridgeResult<()> {
        // Idempotent re-download: never append to a stale file
        remove_stale_file(dest);

        let response = self.transport.get(&spec.url, &spec.headers, policy)?;
        if !(200..400).contains(&response.status) {
            debug!(
                "Failed to download from {}: HTTP status {}",
                spec.url, response.status
            );
            return Err(BridgeError::DownloadFailed {
                status: response.status,
            });
        }

        let declared = response.content_length;
        match declared {
            Some(len) => debug!("Content-Length of downloaded file: {}", len),
            None => debug!("Content-Length header missing"),
        }

        let mut body = response.body;
        let mut file = fs::File::create(dest)?;
        let written = match declared {
            Some(len) => {
                let bar = download_bar(len);
                let written = io::copy(&mut body, &mut bar.wrap_write(&mut file))?;
                bar.finish_and_clear();
                written
            }
            None => io::copy(&mut body, &mut file)?,
        };
        drop(file);

        if let Some(expected) = declared {
            if expected != written {
                remove_stale_file(dest);
                return Err(BridgeError::ContentLengthMismatch { expected, written });
            }
        }
        debug!("Downloaded {} bytes to {}", written, dest.display());
        Ok(())
    }

    fn resolve_destination(&self, spec: &DownloadSpec) -> PathBuf {
        let dest = if spec.destination.is_absolute() {
            spec.destination.clone()
        } else {
            self.temp_dir.join(&spec.destination)
        };
        if dest.is_dir() {
            dest.join(file_name_from_url(&spec.url))
        } else {
            dest
        }
    }
}

/// Read the agent-scoped temp directory from the environment
pub fn agent_temp_dir() -> BridgeResult<PathBuf> {
    match std::env::var(AGENT_TEMP_ENV) {
        Ok(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
        _ => Err(BridgeError::AgentTempDirectoryNotSet),
    }
}

fn file_name_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last())
                .map(str::to_string)
        })
        .filter(|segment| !segment.is_empty() && segment.contains('.'))
        .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string())
}

fn remove_stale_file(path: &Path) {
    if path.exists() {
        if let Err(err) = fs::remove_file(path) {
            debug!("Failed to delete {}: {}", path.display(), err);
        } else {
            debug!("Removed unfinished downloaded file {}", path.display());
        }
    }
}
