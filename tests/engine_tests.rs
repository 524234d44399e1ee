//! End-to-end acquisition tests against a scripted transport

use bridge_acquire::{
    read_marker, BridgeEngine, BridgeError, BridgeResult, HttpResponse, InstallPrefs, Platform,
    TlsPolicy, Transport,
};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const BASE_URL: &str = "https://repo.example.com/bridge/bridge-cli-bundle";

/// Serves canned responses by URL and counts every request.
struct ScriptedTransport {
    routes: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn route(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.routes.lock().unwrap().insert(url.into(), body.into());
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn get(
        &self,
        url: &str,
        _headers: &HashMap<String, String>,
        _policy: &TlsPolicy,
    ) -> BridgeResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.routes.lock().unwrap().get(url) {
            Some(body) => Ok(HttpResponse {
                status: 200,
                content_length: Some(body.len() as u64),
                body: Box::new(Cursor::new(body.clone())),
            }),
            None => Ok(HttpResponse {
                status: 404,
                content_length: Some(0),
                body: Box::new(Cursor::new(Vec::new())),
            }),
        }
    }
}

fn bundle_zip(version: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let top = format!("bridge-cli-bundle-{version}-{}", Platform::current().suffix_for_version(version));
    writer
        .start_file(
            format!("{top}/{}", Platform::current().executable_name()),
            SimpleFileOptions::default().unix_permissions(0o755),
        )
        .unwrap();
    writer.write_all(b"#!/bin/sh\nexit 0\n").unwrap();
    writer.finish().unwrap().into_inner()
}

fn bundle_url(version: &str) -> String {
    format!(
        "{BASE_URL}/{version}/bridge-cli-bundle-{version}-{}.zip",
        Platform::current().suffix_for_version(version)
    )
}

const LISTING_HTML: &str = concat!(
    r#"<html><body><a href="../">../</a>"#,
    r#"<a href="0.1.168/">0.1.168/</a>"#,
    r#"<a href="0.1.198/">0.1.198/</a>"#,
    r#"<a href="0.1.244/">0.1.244/</a>"#,
    r#"<a href="latest/">latest/</a></body></html>"#,
);

struct Harness {
    engine: BridgeEngine,
    transport: Arc<ScriptedTransport>,
    _temp: TempDir,
    install_dir: TempDir,
}

fn harness() -> Harness {
    let temp = TempDir::new().unwrap();
    let install_dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    let engine = BridgeEngine::new(TlsPolicy::resolve(false, None, false), temp.path())
        .with_transport(transport.clone())
        .with_base_url(BASE_URL);
    Harness {
        engine,
        transport,
        _temp: temp,
        install_dir,
    }
}

fn prefs(h: &Harness) -> InstallPrefs {
    InstallPrefs {
        install_dir: Some(h.install_dir.path().to_path_buf()),
        ..InstallPrefs::default()
    }
}

#[test]
fn test_explicit_version_end_to_end() {
    let mut h = harness();
    h.transport.route(BASE_URL, LISTING_HTML);
    h.transport.route(bundle_url("0.1.244"), bundle_zip("0.1.244"));

    let prefs = InstallPrefs {
        version: Some("0.1.244".into()),
        ..prefs(&h)
    };
    let executable = h.engine.ensure_installed(&prefs).unwrap();

    assert_eq!(
        executable,
        h.install_dir.path().join(Platform::current().executable_name())
    );
    assert!(executable.is_file());
    assert_eq!(read_marker(h.install_dir.path()), Some("0.1.244".to_string()));
    assert_eq!(h.engine.executable(), Some(executable.as_path()));
    // One listing fetch plus one bundle fetch.
    assert_eq!(h.transport.calls(), 2);
}

#[test]
fn test_second_acquisition_stays_off_the_network() {
    let mut h = harness();
    h.transport.route(BASE_URL, LISTING_HTML);
    h.transport.route(bundle_url("0.1.244"), bundle_zip("0.1.244"));

    let prefs = InstallPrefs {
        version: Some("0.1.244".into()),
        ..prefs(&h)
    };
    h.engine.ensure_installed(&prefs).unwrap();
    let calls_after_first = h.transport.calls();

    let executable = h.engine.ensure_installed(&prefs).unwrap();
    assert!(executable.is_file());
    assert_eq!(h.transport.calls(), calls_after_first);
}

#[test]
fn test_latest_end_to_end() {
    let mut h = harness();
    h.transport.route(
        format!("{BASE_URL}/latest/versions.txt"),
        "bridge-cli: 0.1.244\n",
    );
    h.transport.route(bundle_url("0.1.244"), bundle_zip("0.1.244"));

    let executable = h.engine.ensure_installed(&prefs(&h)).unwrap();

    assert!(executable.is_file());
    assert_eq!(read_marker(h.install_dir.path()), Some("0.1.244".to_string()));
    assert_eq!(h.transport.calls(), 2);
}

#[test]
fn test_explicit_url_skips_metadata_endpoints() {
    let mut h = harness();
    h.transport.route(bundle_url("0.1.198"), bundle_zip("0.1.198"));

    let prefs = InstallPrefs {
        download_url: Some(bundle_url("0.1.198")),
        ..prefs(&h)
    };
    h.engine.ensure_installed(&prefs).unwrap();

    assert_eq!(read_marker(h.install_dir.path()), Some("0.1.198".to_string()));
    assert_eq!(h.transport.calls(), 1);
}

#[test]
fn test_missing_version_is_reported() {
    let mut h = harness();
    h.transport.route(BASE_URL, LISTING_HTML);

    let prefs = InstallPrefs {
        version: Some("9.9.9".into()),
        ..prefs(&h)
    };
    let err = h.engine.ensure_installed(&prefs).unwrap_err();
    assert!(matches!(err, BridgeError::VersionNotFound(_)));
    assert_eq!(err.code(), 112);
}

#[test]
fn test_run_before_install_is_rejected() {
    let h = harness();
    let workspace = TempDir::new().unwrap();
    let err = h.engine.run("--stage polaris", workspace.path()).unwrap_err();
    assert!(matches!(err, BridgeError::NotInstalled));
    assert_eq!(err.code(), 116);
}

#[cfg(unix)]
#[test]
fn test_install_then_run() {
    let mut h = harness();
    h.transport.route(BASE_URL, LISTING_HTML);
    h.transport.route(bundle_url("0.1.244"), bundle_zip("0.1.244"));

    let prefs = InstallPrefs {
        version: Some("0.1.244".into()),
        ..prefs(&h)
    };
    h.engine.ensure_installed(&prefs).unwrap();

    let workspace = TempDir::new().unwrap();
    let result = h
        .engine
        .run("--stage polaris --state input.json", workspace.path())
        .unwrap();
    assert!(result.success());
}

#[test]
fn test_air_gap_acquisition_without_network() {
    let mut h = harness();
    bridge_acquire::write_marker(h.install_dir.path(), "0.1.198").unwrap();
    std::fs::write(
        h.install_dir.path().join(Platform::current().executable_name()),
        b"#!/bin/sh\nexit 0\n",
    )
    .unwrap();

    let prefs = InstallPrefs {
        air_gap: true,
        ..prefs(&h)
    };
    let executable = h.engine.ensure_installed(&prefs).unwrap();
    assert!(executable.is_file());
    assert_eq!(h.transport.calls(), 0);
}
