//! Shell Runner
//!
//! Executes an already-validated command line through PowerShell and
//! captures exit code, stdout, stderr and duration. Validation is NOT done
//! here; callers pass commands through the validator first.
//!
//! Output is returned raw. Sanitizing happens at the consumers (display,
//! conversation, audit).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default timeout for a single command
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default PowerShell binary
pub const DEFAULT_SHELL: &str = "pwsh";

/// Maximum output captured per stream
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Exit code 0
    Success,
    /// Ran but returned non-zero
    NonZeroExit,
    /// Shell binary not found
    ShellNotFound,
    /// Killed after the timeout
    Timeout,
    /// Any other spawn/wait failure
    OsError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonZeroExit => "non-zero exit",
            Self::ShellNotFound => "shell not found",
            Self::Timeout => "timeout",
            Self::OsError => "OS error",
        }
    }

    /// True if the process started and exited on its own
    pub fn process_ran(&self) -> bool {
        matches!(self, Self::Success | Self::NonZeroExit)
    }
}

/// Result of one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub command: String,
    pub status: ExecutionStatus,
    /// None when the process never produced one (spawn failure, timeout)
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionOutcome {
    /// Outcome for an attempt that never produced process output
    pub fn failed(command: &str, status: ExecutionStatus, message: String, duration_ms: u64) -> Self {
        Self {
            command: command.to_string(),
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: message,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Text to show the user: stdout, else stderr, else a placeholder.
    /// Raw; sanitize before display.
    pub fn primary_output(&self) -> &str {
        if !self.stdout.trim().is_empty() {
            &self.stdout
        } else if !self.stderr.trim().is_empty() {
            &self.stderr
        } else {
            "No output"
        }
    }
}

// ============================================================================
// Shell Executor Trait
// ============================================================================

/// Runs a command line and reports what happened. Never panics, never
/// returns Err: failures are encoded in the outcome.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    async fn run(&self, command: &str) -> ExecutionOutcome;
}

// ============================================================================
// PowerShell Executor (Production)
// ============================================================================

/// `<shell> -NoProfile -Command <command>` via tokio::process
#[derive(Debug, Clone)]
pub struct PowerShellExecutor {
    shell: String,
    timeout: Duration,
}

impl PowerShellExecutor {
    pub fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for PowerShellExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl ShellExecutor for PowerShellExecutor {
    async fn run(&self, command: &str) -> ExecutionOutcome {
        let start = Instant::now();

        let child = tokio::process::Command::new(&self.shell)
            .arg("-NoProfile")
            .arg("-Command")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                let status = if e.kind() == std::io::ErrorKind::NotFound {
                    ExecutionStatus::ShellNotFound
                } else {
                    ExecutionStatus::OsError
                };
                warn!(shell = %self.shell, error = %e, "Failed to start shell");
                return ExecutionOutcome::failed(
                    command,
                    status,
                    format!("Error executing command: {}", e),
                    elapsed_ms(start),
                );
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it
        let outcome = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let status = if output.status.success() {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::NonZeroExit
                };
                ExecutionOutcome {
                    command: command.to_string(),
                    status,
                    exit_code: output.status.code(),
                    stdout: truncate_output(&output.stdout),
                    stderr: truncate_output(&output.stderr),
                    duration_ms: elapsed_ms(start),
                    timestamp: Utc::now(),
                }
            }
            Ok(Err(e)) => ExecutionOutcome::failed(
                command,
                ExecutionStatus::OsError,
                format!("Error executing command: {}", e),
                elapsed_ms(start),
            ),
            Err(_) => ExecutionOutcome::failed(
                command,
                ExecutionStatus::Timeout,
                format!(
                    "Command execution timed out after {} seconds",
                    self.timeout.as_secs()
                ),
                elapsed_ms(start),
            ),
        };

        info!(
            status = outcome.status.as_str(),
            exit_code = ?outcome.exit_code,
            duration_ms = outcome.duration_ms,
            "Command executed"
        );
        outcome
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Lossy UTF-8, cut at a char boundary below the byte cap
fn truncate_output(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.into_owned();
    }
    let mut end = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... (output truncated)", &text[..end])
}

// ============================================================================
// Fake Shell (Testing)
// ============================================================================

pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned response for one command line
    #[derive(Debug, Clone)]
    pub struct FakeShellResponse {
        pub status: ExecutionStatus,
        pub exit_code: Option<i32>,
        pub stdout: String,
        pub stderr: String,
    }

    impl FakeShellResponse {
        pub fn ok(stdout: &str) -> Self {
            Self {
                status: ExecutionStatus::Success,
                exit_code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }
        }

        pub fn error(exit_code: i32, stderr: &str) -> Self {
            Self {
                status: ExecutionStatus::NonZeroExit,
                exit_code: Some(exit_code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            }
        }

        pub fn timeout() -> Self {
            Self {
                status: ExecutionStatus::Timeout,
                exit_code: None,
                stdout: String::new(),
                stderr: format!(
                    "Command execution timed out after {} seconds",
                    DEFAULT_TIMEOUT_SECS
                ),
            }
        }
    }

    /// Shell executor with pre-configured responses, keyed by the exact
    /// command line. Unknown commands succeed with empty output.
    #[derive(Debug, Default)]
    pub struct FakeShell {
        responses: HashMap<String, FakeShellResponse>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeShell {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(mut self, command: &str, response: FakeShellResponse) -> Self {
            self.responses.insert(command.to_string(), response);
            self
        }

        /// Commands run so far, in order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
        }
    }

    #[async_trait]
    impl ShellExecutor for FakeShell {
        async fn run(&self, command: &str) -> ExecutionOutcome {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(command.to_string());

            let response = self
                .responses
                .get(command)
                .cloned()
                .unwrap_or_else(|| FakeShellResponse::ok(""));

            ExecutionOutcome {
                command: command.to_string(),
                status: response.status,
                exit_code: response.exit_code,
                stdout: response.stdout,
                stderr: response.stderr,
                duration_ms: 1,
                timestamp: Utc::now(),
            }
        }
    }
}
