//! Error types for bridge-acquire

use std::path::PathBuf;
use thiserror::Error;

/// Result type for acquisition and execution operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while acquiring or running the Bridge CLI
///
/// Every variant carries a stable numeric code (see [`BridgeError::code`])
/// that the surrounding pipeline appends to failure messages for triage.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Download URL does not match the current platform or is not an archive
    #[error("Provided Bridge CLI URL is not valid for the configured platform runner: {0}")]
    InvalidUrl(String),

    /// Download URL was provided but empty
    #[error("Provided Bridge CLI URL cannot be empty")]
    EmptyDownloadUrl,

    /// Requested version is not present in the artifact repository listing
    #[error("Provided Bridge CLI version {0} not found in artifact repository")]
    VersionNotFound(String),

    /// Server rejected the download request
    #[error("Failed to download Bridge CLI archive. HTTP status code: {status}")]
    DownloadFailed {
        /// HTTP status code outside [200, 400)
        status: u16,
    },

    /// Bytes written to disk did not match the declared Content-Length
    #[error("Downloaded file did not match the declared content length (expected {expected}, wrote {written})")]
    ContentLengthMismatch {
        /// Declared Content-Length
        expected: u64,
        /// Bytes actually written
        written: u64,
    },

    /// Transport-level failure (connection reset, timeout, TLS setup)
    #[error("Bridge CLI download failed: {0}")]
    Transport(String),

    /// Archive to extract does not exist
    #[error("Bridge CLI archive not found for extraction: {0:?}")]
    ArchiveNotFound(PathBuf),

    /// Extraction destination missing or not creatable
    #[error("No destination directory found for Bridge CLI extraction: {0:?}")]
    NoDestinationDirectory(PathBuf),

    /// Default install directory missing in air-gap mode
    #[error("Bridge CLI default directory does not exist: {0:?}")]
    DefaultDirectoryNotFound(PathBuf),

    /// Executable missing at the resolved install path
    #[error("Bridge CLI executable file could not be found at {0:?}")]
    ExecutableNotFound(PathBuf),

    /// Agent temp directory environment variable is unset
    #[error("Agent temp directory is not set")]
    AgentTempDirectoryNotSet,

    /// `run` was called before a successful `ensure_installed`
    #[error("Bridge CLI has not been installed; call ensure_installed first")]
    NotInstalled,

    /// Anything that does not map to a known condition
    #[error("Undefined error: {0}")]
    Undefined(String),
}

impl BridgeError {
    /// Stable numeric code appended to pipeline failure messages
    pub fn code(&self) -> u16 {
        match self {
            BridgeError::AgentTempDirectoryNotSet => 103,
            BridgeError::InvalidUrl(_) => 109,
            BridgeError::EmptyDownloadUrl => 110,
            BridgeError::VersionNotFound(_) => 112,
            BridgeError::Transport(_) => 113,
            BridgeError::DefaultDirectoryNotFound(_) => 115,
            BridgeError::ExecutableNotFound(_) | BridgeError::NotInstalled => 116,
            BridgeError::ArchiveNotFound(_) => 118,
            BridgeError::NoDestinationDirectory(_) => 119,
            BridgeError::DownloadFailed { .. } => 124,
            BridgeError::ContentLengthMismatch { .. } => 125,
            BridgeError::Io(_) | BridgeError::Undefined(_) => 999,
        }
    }
}
