//! Tests for process execution against real child processes

use bridge_acquire::{BridgeError, ProcessRunner, RunStatus};
use tempfile::TempDir;

#[test]
fn test_missing_executable_fails_before_spawn() {
    let temp = TempDir::new().unwrap();
    let err = ProcessRunner
        .execute(&temp.path().join("bridge-cli"), "--stage polaris", temp.path())
        .unwrap_err();
    assert!(matches!(err, BridgeError::ExecutableNotFound(_)));
    assert_eq!(err.code(), 116);
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("bridge-cli");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[test]
    fn test_successful_run() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "exit 0");

        let result = ProcessRunner
            .execute(&script, "--stage polaris --state input.json", temp.path())
            .unwrap();

        assert_eq!(result.exit_code, 0);
        assert!(result.success());
        assert_eq!(result.status(), RunStatus::Succeeded);
        assert_eq!(result.executable_path, script);
    }

    #[test]
    fn test_known_failure_code_is_classified() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "exit 9");

        let result = ProcessRunner.execute(&script, "", temp.path()).unwrap();

        assert_eq!(result.exit_code, 9);
        assert!(!result.success());
        assert_eq!(
            result.status(),
            RunStatus::FailedKnown("Bridge initialization failed")
        );
    }

    #[test]
    fn test_unknown_failure_code_is_classified() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "exit 42");

        let result = ProcessRunner.execute(&script, "", temp.path()).unwrap();
        assert_eq!(result.status(), RunStatus::FailedUnknown);
    }

    #[test]
    fn test_arguments_and_working_directory_are_passed() {
        let temp = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        // Record cwd and argv so the test can observe exactly what ran.
        let script = write_script(temp.path(), r#"printf '%s\n' "$PWD" "$@" > out.txt; exit 0"#);

        let result = ProcessRunner
            .execute(&script, r#"--stage srm --state "state file.json""#, workspace.path())
            .unwrap();
        assert!(result.success());

        let out = fs::read_to_string(workspace.path().join("out.txt")).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            workspace.path().canonicalize().unwrap().to_str().unwrap()
        );
        assert_eq!(&lines[1..], ["--stage", "srm", "--state", "state file.json"]);
    }
}
