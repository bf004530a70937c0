//! netdoc Common - guarded Windows network troubleshooting core
//!
//! Every command the model proposes passes one validator against a fixed
//! catalog before it can reach PowerShell, and every byte of command output
//! is sanitized before it is shown, stored, sent back to the model, or
//! audited.

pub mod agent;
pub mod audit;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod llm;
pub mod matcher;
pub mod prompts;
pub mod retry;
pub mod rules;
pub mod runner;
pub mod sanitizer;
pub mod validator;
pub mod verdict;

pub use agent::{CommandCandidate, CommandReport, IssueAnalysis, TroubleshootingAgent};
pub use audit::{AuditEvent, AuditSink, JsonlAuditLog, MemoryAuditSink, NullAuditSink};
pub use catalog::{Catalog, CatalogEntry, CatalogSource};
pub use classifier::InputClassifier;
pub use config::NetdocConfig;
pub use error::{AuditError, CatalogError, ConfigError, RulesError};
pub use history::{ConversationHistory, ConversationTurn, Role};
pub use llm::{EmbeddingProvider, LlmError, OpenAiClient, OpenAiConfig, TextGenerator};
pub use matcher::RelevanceMatcher;
pub use retry::RetryPolicy;
pub use rules::RuleSet;
pub use runner::{ExecutionOutcome, ExecutionStatus, PowerShellExecutor, ShellExecutor};
pub use sanitizer::sanitize;
pub use validator::CommandValidator;
pub use verdict::{Rejection, ValidationVerdict};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
