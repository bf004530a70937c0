//! Command Validator
//!
//! The single gate every command passes before it can reach a shell. Used
//! both when vetting commands proposed by the model and again right before
//! execution.
//!
//! Rules, first failure wins:
//! 1. Length bound (500 characters)
//! 2. Harmful-pattern scan (command rule table)
//! 3. Base name = leading whitespace-delimited token
//! 4. Base name must resolve in the catalog
//! 5. Base name must carry an approved verb prefix, independently of the
//!    catalog
//! 6. Every `-Option` token must be accepted by the resolved entry

use crate::audit::{preview, AuditEvent, AuditSink, NullAuditSink, ValidationKind};
use crate::catalog::Catalog;
use crate::rules::{CompiledTable, RuleSet};
use crate::verdict::{Rejection, ValidationVerdict};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::info;

/// Maximum accepted command length, in characters
pub const MAX_COMMAND_CHARS: usize = 500;

/// Approved verb prefixes for network diagnostics (lowercase)
pub const SAFE_CMDLET_PREFIXES: &[&str] = &[
    "get-net",
    "test-",
    "resolve-dns",
    "get-dns",
    "clear-dns",
    "get-service",
    "restart-service",
];

/// One or more dashes opening a token, or following a comma in a list
static OPTION_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s,])-+(\w+)").ok());

/// Leading whitespace-delimited token of a command
pub fn base_name(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}

/// True if the name starts with an approved verb prefix
pub fn has_safe_prefix(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SAFE_CMDLET_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Option names following the base name, in order of appearance
pub fn extract_options(command: &str) -> Vec<&str> {
    let trimmed = command.trim_start();
    let rest = match trimmed.find(char::is_whitespace) {
        Some(idx) => &trimmed[idx..],
        None => return Vec::new(),
    };
    match OPTION_REGEX.as_ref() {
        Some(re) => re
            .captures_iter(rest)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect(),
        None => rest
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| t.starts_with('-'))
            .map(|t| t.trim_start_matches('-'))
            .map(|t| t.split(|c: char| !(c.is_alphanumeric() || c == '_')).next().unwrap_or(t))
            .filter(|t| !t.is_empty())
            .collect(),
    }
}

/// Safety gate for literal command text
pub struct CommandValidator {
    rules: CompiledTable,
    audit: Arc<dyn AuditSink>,
}

impl CommandValidator {
    pub fn new(rules: CompiledTable, audit: Arc<dyn AuditSink>) -> Self {
        Self { rules, audit }
    }

    /// Validate and record the decision
    pub fn validate(&self, catalog: &Catalog, command: &str) -> ValidationVerdict {
        let verdict = self.check(catalog, command);
        info!(
            valid = verdict.valid,
            reason = %verdict.reason,
            content = %preview(command),
            "Command validation"
        );
        self.audit.record(AuditEvent::validation(
            ValidationKind::Command,
            command,
            &verdict,
        ));
        verdict
    }

    /// Same decision as [`validate`](Self::validate), not logged or audited
    pub fn admits(&self, catalog: &Catalog, command: &str) -> bool {
        self.check(catalog, command).valid
    }

    fn check(&self, catalog: &Catalog, command: &str) -> ValidationVerdict {
        if command.chars().count() > MAX_COMMAND_CHARS {
            return Rejection::CommandTooLong {
                limit: MAX_COMMAND_CHARS,
            }
            .into();
        }

        if let Some(rule) = self.rules.first_match(command) {
            return Rejection::CommandHarmfulPattern {
                pattern: rule.pattern().to_string(),
                reason: rule.reason().to_string(),
            }
            .into();
        }

        let Some(name) = base_name(command) else {
            return Rejection::CommandUnparseable.into();
        };

        let Some(entry) = catalog.lookup(name) else {
            return Rejection::CommandUnknown {
                name: name.to_string(),
            }
            .into();
        };

        if !has_safe_prefix(name) {
            return Rejection::CommandPrefixDisallowed {
                name: name.to_string(),
            }
            .into();
        }

        if let Some(option) = extract_options(command)
            .into_iter()
            .find(|o| !entry.accepts_option(o))
        {
            return Rejection::CommandOptionInvalid {
                name: name.to_string(),
                option: option.to_string(),
            }
            .into();
        }

        ValidationVerdict::accept("Command is valid")
    }
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new(RuleSet::builtin().command, Arc::new(NullAuditSink))
    }
}
