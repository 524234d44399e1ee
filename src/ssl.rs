//! SSL policy resolution
//!
//! Turns the three raw network settings (trust-all flag, custom CA file,
//! air-gap flag) into a single immutable [`TlsPolicy`]. Resolution never
//! fails: an unreadable CA file degrades to the default system trust store
//! with a warning.

use crate::error::BridgeResult;
use native_tls::{Certificate, TlsConnector};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Immutable TLS policy for one acquisition attempt
#[derive(Debug, Clone, Default)]
pub struct TlsPolicy {
    /// Disable certificate verification entirely
    pub trust_all: bool,
    /// CA file the custom trust material was read from
    pub custom_ca_path: Option<PathBuf>,
    /// PEM bytes of the custom CA, used alongside the system roots
    pub combined_ca: Option<Vec<u8>>,
    /// No network access; a pre-installed Bridge CLI is trusted as-is
    pub air_gap: bool,
}

impl TlsPolicy {
    /// Resolve raw settings into a policy
    ///
    /// `trust_all` wins over any custom CA file. A CA file that cannot be
    /// read is logged and ignored, never a hard failure.
    pub fn resolve(trust_all: bool, custom_ca_file: Option<&Path>, air_gap: bool) -> Self {
        if trust_all {
            warn!("SSL certificate verification disabled (trust-all enabled)");
            return Self {
                trust_all: true,
                air_gap,
                ..Self::default()
            };
        }

        if let Some(ca_file) = custom_ca_file.filter(|p| !p.as_os_str().is_empty()) {
            match fs::read(ca_file) {
                Ok(pem) => {
                    debug!("Custom CA certificate loaded from {}", ca_file.display());
                    return Self {
                        trust_all: false,
                        custom_ca_path: Some(ca_file.to_path_buf()),
                        combined_ca: Some(pem),
                        air_gap,
                    };
                }
                Err(err) => {
                    warn!(
                        "Failed to read custom CA certificate file {}, using default SSL settings: {}",
                        ca_file.display(),
                        err
                    );
                }
            }
        }

        Self {
            air_gap,
            ..Self::default()
        }
    }

    /// Whether this policy needs a dedicated transport instead of the shared
    /// default client (trust-all or combined trust store)
    pub fn needs_direct_transport(&self) -> bool {
        self.trust_all || self.combined_ca.is_some()
    }

    /// Fingerprint used as the client-cache key; changes whenever the
    /// TLS-relevant settings change
    pub fn fingerprint(&self) -> String {
        format!(
            "trustAll:{}|certFile:{}",
            self.trust_all,
            self.custom_ca_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    }

    /// Build a TLS connector honoring this policy
    ///
    /// Certificates in the custom PEM that fail to parse are skipped with a
    /// warning so a single bad block does not take down the whole store.
    pub fn build_connector(&self) -> BridgeResult<TlsConnector> {
        let mut builder = TlsConnector::builder();

        if self.trust_all {
            debug!("Building TLS connector with verification disabled");
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        } else if let Some(pem) = &self.combined_ca {
            let mut added = 0usize;
            for block in split_pem_certificates(pem) {
                match Certificate::from_pem(&block) {
                    Ok(cert) => {
                        builder.add_root_certificate(cert);
                        added += 1;
                    }
                    Err(err) => warn!("Skipping unparseable certificate in custom CA file: {}", err),
                }
            }
            debug!("Added {} custom CA certificate(s) to the system trust store", added);
        }

        builder
            .build()
            .map_err(|e| crate::error::BridgeError::Transport(format!("TLS setup failed: {e}")))
    }
}

/// Split a PEM file into individual certificate blocks
fn split_pem_certificates(pem: &[u8]) -> Vec<Vec<u8>> {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";

    let text = String::from_utf8_lossy(pem);
    let mut blocks = Vec::new();
    let mut rest = text.as_ref();
    while let Some(start) = rest.find(BEGIN) {
        let Some(end) = rest[start..].find(END) else {
            break;
        };
        let block = &rest[start..start + end + END.len()];
        blocks.push(block.as_bytes().to_vec());
        rest = &rest[start + end + END.len()..];
    }
    blocks
}
