//! Process execution and exit-code classification
//!
//! Runs the installed Bridge CLI exactly once per orchestration call: verify
//! the executable exists, spawn it in the pipeline workspace, and classify
//! the exit code against the published table. Spawn-level failures are
//! reported, never retried.

use crate::error::{BridgeError, BridgeResult};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Published Bridge CLI exit codes and their meanings; diagnostics only, any
/// non-zero code is still a failed run
pub const EXIT_CODE_MAP: &[(i32, &str)] = &[
    (0, "Bridge execution successfully completed"),
    (1, "Undefined error, check error logs"),
    (2, "Error from adapter end"),
    (3, "Failed to shutdown the bridge"),
    (8, "The config option bridge.break has been set to true"),
    (9, "Bridge initialization failed"),
];

/// Meaning of a Bridge CLI exit code, when documented
pub fn exit_code_meaning(code: i32) -> Option<&'static str> {
    EXIT_CODE_MAP
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, meaning)| *meaning)
}

/// Classification of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Exit code 0
    Succeeded,
    /// Non-zero exit code with a documented meaning
    FailedKnown(&'static str),
    /// Non-zero exit code absent from the table
    FailedUnknown,
}

/// Outcome of one Bridge CLI execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Exit code reported by the process
    pub exit_code: i32,
    /// Executable that was run
    pub executable_path: PathBuf,
}

impl ExecutionResult {
    /// Classify the exit code
    pub fn status(&self) -> RunStatus {
        if self.exit_code == 0 {
            return RunStatus::Succeeded;
        }
        match exit_code_meaning(self.exit_code) {
            Some(meaning) => RunStatus::FailedKnown(meaning),
            None => RunStatus::FailedUnknown,
        }
    }

    /// Whether the run succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes the installed Bridge CLI
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Run `executable` with the prepared command line, cwd set to
    /// `working_dir`, and return the classified outcome
    pub fn execute(
        &self,
        executable: &Path,
        command: &str,
        working_dir: &Path,
    ) -> BridgeResult<ExecutionResult> {
        if !executable.exists() {
            return Err(BridgeError::ExecutableNotFound(executable.to_path_buf()));
        }

        let args = split_command_line(command);
        debug!(
            "Executing {} with {} argument(s) in {}",
            executable.display(),
            args.len(),
            working_dir.display()
        );

        let status = Command::new(executable)
            .args(&args)
            .current_dir(working_dir)
            .status()?;

        let exit_code = status
            .code()
            .ok_or_else(|| BridgeError::Undefined("Bridge CLI was terminated by a signal".into()))?;

        match exit_code_meaning(exit_code) {
            Some(meaning) => info!("Bridge CLI exited with code {}: {}", exit_code, meaning),
            None => info!("Bridge CLI exited with code {}", exit_code),
        }

        Ok(ExecutionResult {
            exit_code,
            executable_path: executable.to_path_buf(),
        })
    }
}

/// Split a prepared command line into arguments, honoring double quotes
/// around paths with spaces
pub fn split_command_line(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in command.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}
