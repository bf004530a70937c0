//! Audit Log
//!
//! Append-only record of every validation decision and every command
//! execution attempt. Sinks are constructed by the process and injected
//! into the components that need them; nothing here is global.
//!
//! Storage: JSONL, one [`AuditEntry`] per line.

use crate::error::AuditError;
use crate::runner::{ExecutionOutcome, ExecutionStatus};
use crate::sanitizer::sanitize;
use crate::verdict::ValidationVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Characters of validated content kept in logs
pub const PREVIEW_CHARS: usize = 50;

/// Truncate text for logging: at most [`PREVIEW_CHARS`] characters plus an
/// ellipsis marker when something was cut.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// What was validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    UserQuery,
    Command,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::UserQuery => "user_query",
            ValidationKind::Command => "command",
        }
    }
}

/// Audited event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A gate decision
    Validation {
        kind: ValidationKind,
        valid: bool,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rejection: Option<String>,
        /// Truncated preview of the validated text
        content: String,
    },
    /// A shell execution attempt
    Execution {
        command: String,
        status: ExecutionStatus,
        exit_code: Option<i32>,
        /// Sanitized
        stdout: String,
        /// Sanitized
        stderr: String,
        duration_ms: u64,
    },
    SessionStart {
        catalog_size: usize,
        embeddings: bool,
    },
    SessionEnd,
}

impl AuditEvent {
    pub fn validation(kind: ValidationKind, content: &str, verdict: &ValidationVerdict) -> Self {
        AuditEvent::Validation {
            kind,
            valid: verdict.valid,
            reason: verdict.reason.clone(),
            rejection: verdict.rejection.as_ref().map(|r| r.code().to_string()),
            content: preview(content),
        }
    }

    pub fn execution(outcome: &ExecutionOutcome) -> Self {
        AuditEvent::Execution {
            command: outcome.command.clone(),
            status: outcome.status,
            exit_code: outcome.exit_code,
            stdout: sanitize(&outcome.stdout),
            stderr: sanitize(&outcome.stderr),
            duration_ms: outcome.duration_ms,
        }
    }
}

/// Audit log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    #[serde(flatten)]
    pub event: AuditEvent,
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for audit events. Recording never fails the caller.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Keeps events in memory (tests, dry runs)
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

/// Appends JSONL entries to a file
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl JsonlAuditLog {
    /// Create the parent directory and bind to a fresh session id
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            session_id: uuid::Uuid::new_v4().to_string(),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn append(&self, event: AuditEvent) -> Result<(), AuditError> {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            session_id: self.session_id.clone(),
            event,
        };
        let json = serde_json::to_string(&entry)?;

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    /// Read back entries (skips unparseable lines)
    pub fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
        let content = fs::read_to_string(path)?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.append(event) {
            warn!(path = %self.path.display(), error = %e, "Failed to write audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Rejection;

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("Get-NetAdapter"), "Get-NetAdapter");
        let exact = "a".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let text = "ü".repeat(80);
        let p = preview(&text);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn test_validation_event_records_rejection_code() {
        let verdict = ValidationVerdict::reject(Rejection::InputOutOfScope);
        let event = AuditEvent::validation(ValidationKind::UserQuery, "pasta", &verdict);
        match event {
            AuditEvent::Validation {
                kind,
                valid,
                rejection,
                content,
                ..
            } => {
                assert_eq!(kind, ValidationKind::UserQuery);
                assert!(!valid);
                assert_eq!(rejection.as_deref(), Some("input_out_of_scope"));
                assert_eq!(content, "pasta");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_execution_event_sanitizes_output() {
        let outcome = ExecutionOutcome {
            command: "Get-NetIPAddress".to_string(),
            status: ExecutionStatus::Success,
            exit_code: Some(0),
            stdout: "IPAddress : 10.0.0.12".to_string(),
            stderr: String::new(),
            duration_ms: 12,
            timestamp: Utc::now(),
        };
        match AuditEvent::execution(&outcome) {
            AuditEvent::Execution { stdout, exit_code, .. } => {
                assert_eq!(stdout, "IPAddress : [IP_ADDRESS]");
                assert_eq!(exit_code, Some(0));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_jsonl_log_appends_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("audit.jsonl");
        let log = JsonlAuditLog::open(&path).unwrap();

        log.record(AuditEvent::SessionStart {
            catalog_size: 16,
            embeddings: false,
        });
        let verdict = ValidationVerdict::accept("Command is valid");
        log.record(AuditEvent::validation(
            ValidationKind::Command,
            "Get-NetAdapter",
            &verdict,
        ));
        log.record(AuditEvent::SessionEnd);

        let entries = JsonlAuditLog::read_entries(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.session_id == log.session_id()));
        assert!(matches!(entries[1].event, AuditEvent::Validation { valid: true, .. }));

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.lines().nth(1).unwrap().contains("\"type\":\"validation\""));
    }

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemoryAuditSink::default();
        sink.record(AuditEvent::SessionStart {
            catalog_size: 1,
            embeddings: true,
        });
        sink.record(AuditEvent::SessionEnd);
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], AuditEvent::SessionEnd);
    }
}
