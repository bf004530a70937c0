//! Verdicts returned by the input classifier and the command validator.
//!
//! A verdict is a value, never a fault: the reason string is what the user
//! sees and what lands in the audit log.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a gate refused its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("Input is too long (>{limit} characters)")]
    InputTooLong { limit: usize },

    #[error("Input doesn't appear to be related to network troubleshooting")]
    InputOutOfScope,

    #[error("Input contains potentially harmful pattern: {pattern} ({reason})")]
    InputHarmfulPattern { pattern: String, reason: String },

    #[error("Command is too long (>{limit} characters)")]
    CommandTooLong { limit: usize },

    #[error("Command contains harmful pattern: {pattern} ({reason})")]
    CommandHarmfulPattern { pattern: String, reason: String },

    #[error("Could not parse command")]
    CommandUnparseable,

    #[error("Command '{name}' not found in knowledge base")]
    CommandUnknown { name: String },

    #[error("Command '{name}' is not a safe network diagnostic command")]
    CommandPrefixDisallowed { name: String },

    #[error("Parameter '{option}' is not valid for command '{name}'")]
    CommandOptionInvalid { name: String, option: String },
}

impl Rejection {
    /// Stable identifier used in audit records
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputTooLong { .. } => "input_too_long",
            Self::InputOutOfScope => "input_out_of_scope",
            Self::InputHarmfulPattern { .. } => "input_harmful_pattern",
            Self::CommandTooLong { .. } => "command_too_long",
            Self::CommandHarmfulPattern { .. } => "command_harmful_pattern",
            Self::CommandUnparseable => "command_unparseable",
            Self::CommandUnknown { .. } => "command_unknown",
            Self::CommandPrefixDisallowed { .. } => "command_prefix_disallowed",
            Self::CommandOptionInvalid { .. } => "command_option_invalid",
        }
    }
}

/// Outcome of a single gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl ValidationVerdict {
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: reason.into(),
            rejection: None,
        }
    }

    pub fn reject(rejection: Rejection) -> Self {
        Self {
            valid: false,
            reason: rejection.to_string(),
            rejection: Some(rejection),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl From<Rejection> for ValidationVerdict {
    fn from(rejection: Rejection) -> Self {
        Self::reject(rejection)
    }
}
