//! Platform family detection and artifact naming
//!
//! The Bridge CLI is published as one zip per OS/architecture family:
//!
//! - Windows x86_64: `bridge-cli-bundle-{version}-win64.zip`
//! - Linux x86_64: `bridge-cli-bundle-{version}-linux64.zip`
//! - Linux arm64: `bridge-cli-bundle-{version}-linux_arm.zip`
//! - macOS x86_64: `bridge-cli-bundle-{version}-macosx.zip`
//! - macOS arm64: `bridge-cli-bundle-{version}-macos_arm.zip`
//!
//! ARM artifacts only exist from a minimum version onwards; older versions
//! fall back to the Intel artifact (run under emulation).

use semver::Version;
use std::path::PathBuf;
use tracing::debug;

/// Artifact suffix for Windows x86_64
pub const WINDOWS_PLATFORM: &str = "win64";
/// Artifact suffix for Linux x86_64
pub const LINUX_PLATFORM: &str = "linux64";
/// Artifact suffix for Linux arm64
pub const LINUX_ARM_PLATFORM: &str = "linux_arm";
/// Artifact suffix for macOS x86_64
pub const MAC_INTEL_PLATFORM: &str = "macosx";
/// Artifact suffix for macOS arm64
pub const MAC_ARM_PLATFORM: &str = "macos_arm";

/// First version with a macOS ARM artifact
pub const MIN_MAC_ARM_VERSION: &str = "2.1.0";
/// First version with a Linux ARM artifact
pub const MIN_LINUX_ARM_VERSION: &str = "3.5.1";

/// Default install directory name under the user's home
const DEFAULT_INSTALL_SUBDIR: &str = "bridge-cli";

/// OS/architecture family the Bridge CLI artifact is selected for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Win64,
    Linux64,
    LinuxArm,
    MacIntel,
    MacArm,
}

impl Platform {
    /// Detect the current platform family
    pub fn current() -> Self {
        #[cfg(target_os = "windows")]
        return Self::Win64;

        #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
        return Self::LinuxArm;

        #[cfg(all(target_os = "linux", not(target_arch = "aarch64")))]
        return Self::Linux64;

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        return Self::MacArm;

        #[cfg(all(target_os = "macos", not(target_arch = "aarch64")))]
        return Self::MacIntel;

        #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
        Self::Linux64
    }

    /// Artifact suffix for this platform
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Win64 => WINDOWS_PLATFORM,
            Self::Linux64 => LINUX_PLATFORM,
            Self::LinuxArm => LINUX_ARM_PLATFORM,
            Self::MacIntel => MAC_INTEL_PLATFORM,
            Self::MacArm => MAC_ARM_PLATFORM,
        }
    }

    /// Artifact suffix for a specific version, falling back from ARM to the
    /// Intel artifact when the version predates ARM support
    pub fn suffix_for_version(&self, version: &str) -> &'static str {
        let min = match self {
            Self::MacArm => MIN_MAC_ARM_VERSION,
            Self::LinuxArm => MIN_LINUX_ARM_VERSION,
            _ => return self.suffix(),
        };
        if version_at_least(version, min) {
            self.suffix()
        } else {
            let intel = match self {
                Self::MacArm => MAC_INTEL_PLATFORM,
                _ => LINUX_PLATFORM,
            };
            debug!(
                "Bridge CLI {} predates ARM support (minimum {}), using {} artifact",
                version, min, intel
            );
            intel
        }
    }

    /// Token the download URL's file name must contain for this platform
    pub fn os_token(&self) -> &'static str {
        match self {
            Self::Win64 => "win",
            Self::Linux64 | Self::LinuxArm => "linux",
            Self::MacIntel | Self::MacArm => "mac",
        }
    }

    /// Name of the installed executable
    pub fn executable_name(&self) -> &'static str {
        match self {
            Self::Win64 => "bridge-cli.exe",
            _ => "bridge-cli",
        }
    }

    /// Default install directory (`$HOME/bridge-cli`, `%USERPROFILE%\bridge-cli`)
    pub fn default_install_dir(&self) -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_INSTALL_SUBDIR)
    }
}

fn version_at_least(version: &str, min: &str) -> bool {
    match (Version::parse(version.trim()), Version::parse(min)) {
        (Ok(v), Ok(m)) => v >= m,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_tokens() {
        assert_eq!(Platform::Win64.suffix(), "win64");
        assert_eq!(Platform::LinuxArm.suffix(), "linux_arm");
        assert_eq!(Platform::MacArm.suffix(), "macos_arm");
    }

    #[test]
    fn test_arm_fallback_below_minimum() {
        assert_eq!(Platform::MacArm.suffix_for_version("2.0.0"), "macosx");
        assert_eq!(Platform::MacArm.suffix_for_version("2.1.0"), "macos_arm");
        assert_eq!(Platform::LinuxArm.suffix_for_version("3.5.0"), "linux64");
        assert_eq!(Platform::LinuxArm.suffix_for_version("3.5.1"), "linux_arm");
    }

    #[test]
    fn test_intel_platforms_ignore_version() {
        assert_eq!(Platform::Linux64.suffix_for_version("0.0.1"), "linux64");
        assert_eq!(Platform::Win64.suffix_for_version("0.0.1"), "win64");
    }

    #[test]
    fn test_unparseable_version_falls_back() {
        assert_eq!(Platform::MacArm.suffix_for_version("not-a-version"), "macosx");
    }

    #[test]
    fn test_executable_name() {
        assert_eq!(Platform::Win64.executable_name(), "bridge-cli.exe");
        assert_eq!(Platform::Linux64.executable_name(), "bridge-cli");
    }

    #[test]
    fn test_os_token() {
        assert_eq!(Platform::MacIntel.os_token(), "mac");
        assert_eq!(Platform::LinuxArm.os_token(), "linux");
        assert_eq!(Platform::Win64.os_token(), "win");
    }
}
