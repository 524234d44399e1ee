//! Bridge Acquire - Tool Acquisition & Execution Engine
//!
//! This crate downloads, installs and runs the separately-versioned Bridge
//! CLI scanner inside a CI pipeline task. The surrounding pipeline resolves
//! its inputs into an [`InstallPrefs`] bundle, raw TLS settings and a fully
//! prepared command string; this crate does the rest:
//!
//! 1. **Resolve** which version/URL to use (explicit URL > explicit version
//!    > latest), skipping the network entirely when a matching install is
//!    already recorded on disk
//! 2. **Fetch** the artifact with redirect following, content-length
//!    validation and capped exponential backoff over transient failures
//! 3. **Install** the archive into the install directory and record the
//!    version marker
//! 4. **Execute** the installed binary and classify its exit code
//!
//! # Quick Start
//!
//! ```no_run
//! use bridge_acquire::{BridgeEngine, InstallPrefs, TlsPolicy};
//! use std::path::Path;
//!
//! # fn main() -> bridge_acquire::BridgeResult<()> {
//! let tls = TlsPolicy::resolve(false, None, false);
//! let mut engine = BridgeEngine::from_env(tls)?;
//!
//! let prefs = InstallPrefs {
//!     version: Some("0.1.244".to_string()),
//!     ..InstallPrefs::default()
//! };
//! engine.ensure_installed(&prefs)?;
//!
//! let result = engine.run("--stage polaris --state input.json", Path::new("."))?;
//! if !result.success() {
//!     eprintln!("scan failed with exit code {}", result.exit_code);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Failure model
//!
//! Every failure is a typed [`BridgeError`] carrying a stable numeric code
//! ([`BridgeError::code`]) that the pipeline appends to its failure message.
//! The fetcher recovers locally from transient failures; everything else
//! propagates unchanged to the caller.

mod catalog;
mod engine;
mod error;
mod fetcher;
mod installer;
mod platform;
pub mod progress;
mod resolver;
mod runner;
mod ssl;
mod transport;

pub use catalog::{ArtifactoryCatalog, VersionCatalog, DEFAULT_ARTIFACTORY_URL};
pub use engine::BridgeEngine;
pub use error::{BridgeError, BridgeResult};
pub use fetcher::{agent_temp_dir, DownloadSpec, Fetcher, RetryPolicy, AGENT_TEMP_ENV};
pub use installer::{
    is_version_installed, read_marker, write_marker, Archiver, Installer, ZipArchiver,
    VERSION_MARKER_FILE, VERSION_MARKER_PREFIX,
};
pub use platform::{
    Platform, LINUX_ARM_PLATFORM, LINUX_PLATFORM, MAC_ARM_PLATFORM, MAC_INTEL_PLATFORM,
    MIN_LINUX_ARM_VERSION, MIN_MAC_ARM_VERSION, WINDOWS_PLATFORM,
};
pub use resolver::{
    executable_path, resolve_install_dir, DownloadPlan, InstallPrefs, Resolution,
    VersionReference, VersionResolver,
};
pub use runner::{
    exit_code_meaning, split_command_line, ExecutionResult, ProcessRunner, RunStatus,
    EXIT_CODE_MAP,
};
pub use ssl::TlsPolicy;
pub use transport::{ClientCache, HttpResponse, Transport, UreqTransport, REQUEST_TIMEOUT};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
