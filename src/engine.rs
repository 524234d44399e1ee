//! Acquisition orchestrator
//!
//! Composes the resolver, fetcher, installer and runner into the two public
//! entry points: [`BridgeEngine::ensure_installed`] and [`BridgeEngine::run`].
//! The engine owns the only mutable state of the core (the resolved
//! executable path) and the shared HTTP client cache.
//!
//! One acquisition-and-run sequence executes at a time; retries inside the
//! fetcher are sequential sleeps on the same call, never concurrent attempts.

use crate::catalog::{ArtifactoryCatalog, VersionCatalog, DEFAULT_ARTIFACTORY_URL};
use crate::error::{BridgeError, BridgeResult};
use crate::fetcher::{agent_temp_dir, DownloadSpec, Fetcher, RetryPolicy};
use crate::installer::{Archiver, Installer, ZipArchiver};
use crate::platform::Platform;
use crate::resolver::{executable_path, resolve_install_dir, InstallPrefs, Resolution, VersionResolver};
use crate::runner::{ExecutionResult, ProcessRunner};
use crate::ssl::TlsPolicy;
use crate::transport::{ClientCache, Transport, UreqTransport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Tool acquisition and execution engine
pub struct BridgeEngine {
    transport: Arc<dyn Transport>,
    client_cache: Arc<ClientCache>,
    catalog: Option<Box<dyn VersionCatalog>>,
    tls: TlsPolicy,
    retry: RetryPolicy,
    platform: Platform,
    temp_dir: PathBuf,
    base_url: String,
    archiver: Arc<dyn Archiver>,
    executable: Option<PathBuf>,
}

impl BridgeEngine {
    /// Create an engine staging downloads under `temp_dir`
    pub fn new(tls: TlsPolicy, temp_dir: impl Into<PathBuf>) -> Self {
        let client_cache = Arc::new(ClientCache::new());
        Self {
            transport: Arc::new(UreqTransport::new(client_cache.clone())),
            client_cache,
            catalog: None,
            tls,
            retry: RetryPolicy::default(),
            platform: Platform::current(),
            temp_dir: temp_dir.into(),
            base_url: DEFAULT_ARTIFACTORY_URL.to_string(),
            archiver: Arc::new(ZipArchiver),
            executable: None,
        }
    }

    /// Create an engine using the agent-provided temp directory
    pub fn from_env(tls: TlsPolicy) -> BridgeResult<Self> {
        Ok(Self::new(tls, agent_temp_dir()?))
    }

    /// Substitute the HTTP transport (tests inject a scripted one)
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Substitute the version catalog
    pub fn with_catalog(mut self, catalog: Box<dyn VersionCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Substitute the extraction capability
    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Point at a non-default artifact repository
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the detected platform family
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Force recreation of the shared HTTP client on the next request
    pub fn invalidate_client_cache(&self) {
        self.client_cache.invalidate();
    }

    /// Resolve, download and install the Bridge CLI as needed; returns the
    /// executable path
    ///
    /// Idempotent: with a populated install directory and unchanged prefs,
    /// a second call performs zero network requests.
    pub fn ensure_installed(&mut self, prefs: &InstallPrefs) -> BridgeResult<PathBuf> {
        let resolution = {
            let default_catalog;
            let catalog: &dyn VersionCatalog = match &self.catalog {
                Some(catalog) => catalog.as_ref(),
                None => {
                    default_catalog = ArtifactoryCatalog::new(
                        self.transport.clone(),
                        self.tls.clone(),
                        self.retry.clone(),
                        self.base_url.clone(),
                    );
                    &default_catalog
                }
            };
            let resolver =
                VersionResolver::with_base_url(catalog, self.platform, self.base_url.clone());
            resolver.resolve(prefs)?
        };

        let install_dir = match resolution {
            Resolution::AlreadyInstalled { install_dir, .. } => install_dir,
            Resolution::Download(plan) => {
                if !plan.version.is_empty() {
                    info!("Bridge CLI version: {}", plan.version);
                }
                info!("Downloading and configuring Bridge CLI from {}", plan.url);
                let fetcher = Fetcher::new(self.transport.clone(), self.temp_dir.clone());
                let spec = DownloadSpec::new(&plan.url, self.temp_dir.clone());
                let archive = fetcher.fetch(&spec, &self.tls, &self.retry)?;

                let install_dir = resolve_install_dir(prefs, self.platform)?;
                let installer = Installer::new(self.archiver.clone(), self.temp_dir.clone());
                installer.install(&archive, &install_dir, &plan.version, prefs.air_gap)?
            }
        };

        let executable = executable_path(&install_dir, self.platform);
        self.executable = Some(executable.clone());
        Ok(executable)
    }

    /// Run the installed Bridge CLI with the prepared command line
    ///
    /// Fails with [`BridgeError::NotInstalled`] unless a prior
    /// [`ensure_installed`](Self::ensure_installed) succeeded.
    pub fn run(&self, command: &str, workspace: &Path) -> BridgeResult<ExecutionResult> {
        let executable = self.executable.as_ref().ok_or(BridgeError::NotInstalled)?;
        ProcessRunner.execute(executable, command, workspace)
    }

    /// Executable path resolved by the last successful install, if any
    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }
}
