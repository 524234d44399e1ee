//! Version resolution
//!
//! Decides what, if anything, must be downloaded. Precedence is
//! explicit URL > explicit version > latest; exactly one reference is honored
//! per acquisition attempt. Whenever the requested version is already
//! recorded in the install marker, the resolver short-circuits without any
//! network call.

use crate::catalog::{VersionCatalog, DEFAULT_ARTIFACTORY_URL};
use crate::error::{BridgeError, BridgeResult};
use crate::installer;
use crate::platform::Platform;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolved acquisition preferences handed in by the configuration layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallPrefs {
    /// Explicit download URL, wins over everything else
    #[serde(default)]
    pub download_url: Option<String>,
    /// Explicit version to download
    #[serde(default)]
    pub version: Option<String>,
    /// Install directory override
    #[serde(default)]
    pub install_dir: Option<PathBuf>,
    /// No network access; trust a pre-installed copy
    #[serde(default)]
    pub air_gap: bool,
}

/// Which version reference the prefs select
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionReference {
    /// Fetch exactly this URL
    ExplicitUrl(String),
    /// Fetch the canonical artifact for this version
    ExplicitVersion(String),
    /// Fetch whatever the repository calls latest
    Latest,
}

impl VersionReference {
    /// Apply the precedence policy to the prefs
    pub fn from_prefs(prefs: &InstallPrefs) -> BridgeResult<Self> {
        if let Some(url) = &prefs.download_url {
            if url.trim().is_empty() {
                return Err(BridgeError::EmptyDownloadUrl);
            }
            return Ok(Self::ExplicitUrl(url.trim().to_string()));
        }
        if let Some(version) = prefs.version.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            return Ok(Self::ExplicitVersion(version.to_string()));
        }
        Ok(Self::Latest)
    }
}

/// A concrete download to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    /// Version being fetched; may be empty when an explicit URL does not
    /// encode one
    pub version: String,
    /// Fully resolved artifact URL
    pub url: String,
}

/// Outcome of version resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A matching install already exists; nothing to fetch
    AlreadyInstalled {
        /// The install directory holding the executable
        install_dir: PathBuf,
        /// Version recorded in the marker
        version: String,
    },
    /// Fetch and install this
    Download(DownloadPlan),
}

/// Resolves prefs into a download plan or an already-installed short-circuit
pub struct VersionResolver<'a> {
    catalog: &'a dyn VersionCatalog,
    platform: Platform,
    base_url: String,
    url_version: Regex,
}

impl<'a> VersionResolver<'a> {
    /// Create a resolver for the current platform
    pub fn new(catalog: &'a dyn VersionCatalog, platform: Platform) -> Self {
        Self::with_base_url(catalog, platform, DEFAULT_ARTIFACTORY_URL)
    }

    /// Create a resolver against a non-default artifact repository
    pub fn with_base_url(
        catalog: &'a dyn VersionCatalog,
        platform: Platform,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            platform,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            url_version: Regex::new(r"bridge-cli-bundle-([0-9][0-9.]*)").expect("valid version pattern"),
        }
    }

    /// Work out what must be downloaded, if anything
    pub fn resolve(&self, prefs: &InstallPrefs) -> BridgeResult<Resolution> {
        let install_dir = resolve_install_dir(prefs, self.platform)?;

        if prefs.air_gap {
            // No network access: whatever is installed is trusted as-is
            let version = installer::read_marker(&install_dir).unwrap_or_default();
            return Ok(self.already_installed(install_dir, version));
        }

        match VersionReference::from_prefs(prefs)? {
            VersionReference::ExplicitUrl(url) => {
                self.validate_url(&url)?;
                let version = self.version_from_url(&url).unwrap_or_default();
                if !version.is_empty() && installer::is_version_installed(&install_dir, &version) {
                    return Ok(self.already_installed(install_dir, version));
                }
                Ok(Resolution::Download(DownloadPlan { version, url }))
            }
            VersionReference::ExplicitVersion(version) => {
                // Marker check first: a second run with the same version must
                // stay off the network entirely.
                if installer::is_version_installed(&install_dir, &version) {
                    return Ok(self.already_installed(install_dir, version));
                }
                let available = self.catalog.available_versions()?;
                if !available.iter().any(|v| v == &version) {
                    return Err(BridgeError::VersionNotFound(version));
                }
                let url = self.version_url(&version);
                Ok(Resolution::Download(DownloadPlan { version, url }))
            }
            VersionReference::Latest => {
                debug!("Checking for the latest Bridge CLI version");
                let version = self.catalog.latest_version()?;
                if installer::is_version_installed(&install_dir, &version) {
                    return Ok(self.already_installed(install_dir, version));
                }
                let url = self.version_url(&version);
                Ok(Resolution::Download(DownloadPlan { version, url }))
            }
        }
    }

    /// Canonical per-OS/arch artifact URL for a version
    pub fn version_url(&self, version: &str) -> String {
        let suffix = self.platform.suffix_for_version(version);
        format!(
            "{}/{version}/bridge-cli-bundle-{version}-{suffix}.zip",
            self.base_url
        )
    }

    /// Validate an explicit URL: archive extension plus an OS token matching
    /// the current platform in the final path segment
    pub fn validate_url(&self, url: &str) -> BridgeResult<()> {
        let parsed =
            url::Url::parse(url).map_err(|_| BridgeError::InvalidUrl(url.to_string()))?;
        let file_name = parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or_default()
            .to_lowercase();
        if !file_name.ends_with(".zip") {
            return Err(BridgeError::InvalidUrl(url.to_string()));
        }
        if !file_name.contains(self.platform.os_token()) {
            return Err(BridgeError::InvalidUrl(url.to_string()));
        }
        Ok(())
    }

    /// Version embedded in an explicit URL's path, when present
    pub fn version_from_url(&self, url: &str) -> Option<String> {
        self.url_version
            .captures(url)
            .map(|capture| capture[1].trim_end_matches('.').to_string())
    }

    fn already_installed(&self, install_dir: PathBuf, version: String) -> Resolution {
        info!(
            "Bridge CLI {} already installed at {}, skipping download",
            version,
            install_dir.display()
        );
        Resolution::AlreadyInstalled {
            install_dir,
            version,
        }
    }
}

/// Install directory implied by the prefs: explicit override > per-OS default
///
/// A missing directory simply means "not installed", except in air-gap mode
/// where the default path must already hold a trusted install.
pub fn resolve_install_dir(prefs: &InstallPrefs, platform: Platform) -> BridgeResult<PathBuf> {
    let dir = match &prefs.install_dir {
        Some(dir) if !dir.as_os_str().is_empty() => {
            debug!("Looking for Bridge CLI in the configured install directory");
            dir.clone()
        }
        _ => {
            debug!("Looking for Bridge CLI in the default path");
            platform.default_install_dir()
        }
    };
    if prefs.air_gap && !dir.exists() {
        return Err(BridgeError::DefaultDirectoryNotFound(dir));
    }
    Ok(dir)
}

/// Executable path inside an install directory
pub fn executable_path(install_dir: &Path, platform: Platform) -> PathBuf {
    install_dir.join(platform.executable_name())
}
