//! Archive installation and the install marker
//!
//! Extraction goes into a fresh, process-unique directory under the agent
//! temp root, then the contents replace whatever lives in the install
//! directory (air-gap installs preserve prior contents; nothing was fetched
//! to replace them with). A `versions.txt` marker records the installed
//! version so later runs can skip the download entirely.
//!
//! The extraction mechanics are platform- and format-specific, so they live
//! behind the [`Archiver`] capability trait; business logic never branches on
//! the mechanism.

use crate::error::{BridgeError, BridgeResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Marker file inside the install directory
pub const VERSION_MARKER_FILE: &str = "versions.txt";
/// Line prefix recording the installed version
pub const VERSION_MARKER_PREFIX: &str = "Bridge CLI Package: ";

/// Extracts a downloaded archive into a directory
pub trait Archiver: Send + Sync {
    /// Extract `archive` into `dest` (which already exists)
    fn extract(&self, archive: &Path, dest: &Path) -> BridgeResult<()>;
}

/// Zip extraction backed by the `zip` crate
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn extract(&self, archive: &Path, dest: &Path) -> BridgeResult<()> {
        let file = fs::File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| BridgeError::Undefined(format!("failed to read zip archive: {e}")))?;

        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| BridgeError::Undefined(format!("failed to read zip entry: {e}")))?;
            let entry_path = entry.mangled_name();
            let full_path = dest.join(entry_path);

            if entry.is_dir() {
                fs::create_dir_all(&full_path)?;
            } else {
                if let Some(parent) = full_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut outfile = fs::File::create(&full_path)?;
                io::copy(&mut entry, &mut outfile)?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    if let Some(mode) = entry.unix_mode() {
                        if mode & 0o111 != 0 {
                            let mut perms = outfile.metadata()?.permissions();
                            perms.set_mode(mode);
                            fs::set_permissions(&full_path, perms)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Installs extracted archives and maintains the version marker
pub struct Installer {
    archiver: Arc<dyn Archiver>,
    temp_dir: PathBuf,
}

impl Installer {
    /// Create an installer extracting through `archiver` and staging under
    /// `temp_dir`
    pub fn new(archiver: Arc<dyn Archiver>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            archiver,
            temp_dir: temp_dir.into(),
        }
    }

    /// Extract `archive` and move the contents into `install_dir`
    ///
    /// Prior contents of `install_dir` are removed first unless `air_gap`
    /// protects them. Writes the version marker when `version` is non-empty.
    /// Returns the install directory.
    pub fn install(
        &self,
        archive: &Path,
        install_dir: &Path,
        version: &str,
        air_gap: bool,
    ) -> BridgeResult<PathBuf> {
        if !archive.exists() {
            return Err(BridgeError::ArchiveNotFound(archive.to_path_buf()));
        }

        info!("Extracting Bridge CLI archive {}", archive.display());
        fs::create_dir_all(&self.temp_dir)?;
        let staging = tempfile::Builder::new()
            .prefix("bridge-extract-")
            .tempdir_in(&self.temp_dir)?;
        self.archiver.extract(archive, staging.path())?;

        // Bundles ship a single versioned top-level directory; flatten it so
        // the executable always sits directly in the install directory.
        let content_root = single_subdirectory(staging.path()).unwrap_or_else(|| staging.path().to_path_buf());

        if install_dir.exists() {
            if air_gap {
                debug!(
                    "Air-gap mode: preserving existing contents of {}",
                    install_dir.display()
                );
            } else {
                debug!("Clearing previous install at {}", install_dir.display());
                fs::remove_dir_all(install_dir)?;
            }
        }
        move_dir_contents(&content_root, install_dir)
            .map_err(|_| BridgeError::NoDestinationDirectory(install_dir.to_path_buf()))?;

        if !version.is_empty() {
            write_marker(install_dir, version)?;
        }
        info!("Bridge CLI installed at {}", install_dir.display());
        Ok(install_dir.to_path_buf())
    }
}

/// Write the install marker, replacing any previous one wholesale
pub fn write_marker(install_dir: &Path, version: &str) -> BridgeResult<()> {
    let marker = install_dir.join(VERSION_MARKER_FILE);
    fs::write(&marker, format!("{VERSION_MARKER_PREFIX}{version}\n"))?;
    debug!("Recorded installed version {} in {}", version, marker.display());
    Ok(())
}

/// Read the version recorded in the install marker, if any
pub fn read_marker(install_dir: &Path) -> Option<String> {
    let marker = install_dir.join(VERSION_MARKER_FILE);
    let contents = match fs::read_to_string(&marker) {
        Ok(contents) => contents,
        Err(err) => {
            debug!("No version marker at {}: {}", marker.display(), err);
            return None;
        }
    };
    contents
        .lines()
        .find_map(|line| line.strip_prefix(VERSION_MARKER_PREFIX))
        .map(|version| version.trim().to_string())
}

/// Whether the marker in `install_dir` records exactly `version`
pub fn is_version_installed(install_dir: &Path, version: &str) -> bool {
    match read_marker(install_dir) {
        Some(installed) => {
            let matches = installed == version.trim();
            if matches {
                debug!("Bridge CLI {} found at {}", version, install_dir.display());
            }
            matches
        }
        None => false,
    }
}

fn single_subdirectory(dir: &Path) -> Option<PathBuf> {
    let mut entries = fs::read_dir(dir).ok()?;
    let first = entries.next()?.ok()?;
    if entries.next().is_some() || !first.path().is_dir() {
        return None;
    }
    Some(first.path())
}

/// Move every child of `from` into `to`, falling back to copy when the
/// rename crosses filesystems
fn move_dir_contents(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if fs::rename(entry.path(), &target).is_err() {
            copy_recursively(&entry.path(), &target)?;
        }
    }
    Ok(())
}

fn copy_recursively(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursively(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        fs::copy(from, to)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_marker_round_trip() {
        let dir = TempDir::new().unwrap();
        write_marker(dir.path(), "1.2.3").unwrap();
        assert_eq!(read_marker(dir.path()).as_deref(), Some("1.2.3"));
        assert!(is_version_installed(dir.path(), "1.2.3"));
        assert!(!is_version_installed(dir.path(), "1.2.4"));
    }

    #[test]
    fn test_marker_is_exact_not_prefix() {
        let dir = TempDir::new().unwrap();
        write_marker(dir.path(), "1.2.3").unwrap();
        assert!(!is_version_installed(dir.path(), "1.2.30"));
        assert!(!is_version_installed(dir.path(), "1.2"));
    }

    #[test]
    fn test_missing_marker() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_marker(dir.path()), None);
        assert!(!is_version_installed(dir.path(), "1.0.0"));
    }

    #[test]
    fn test_archive_not_found() {
        let temp = TempDir::new().unwrap();
        let installer = Installer::new(Arc::new(ZipArchiver), temp.path());
        let err = installer
            .install(
                &temp.path().join("missing.zip"),
                &temp.path().join("install"),
                "1.0.0",
                false,
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::ArchiveNotFound(_)));
        assert_eq!(err.code(), 118);
    }
}
