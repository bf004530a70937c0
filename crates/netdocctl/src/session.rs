//! Agent assembly from configuration
//!
//! Every optional component (model, audit log, knowledge base, rule file)
//! degrades to a working default; the reasons are collected as warnings for
//! the caller to show once.

use netdoc_common::audit::{AuditSink, JsonlAuditLog, NullAuditSink};
use netdoc_common::catalog::{Catalog, CatalogSource};
use netdoc_common::config::NetdocConfig;
use netdoc_common::llm::{OpenAiClient, OpenAiConfig};
use netdoc_common::rules::RuleSet;
use netdoc_common::runner::PowerShellExecutor;
use netdoc_common::TroubleshootingAgent;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// A ready agent plus what was degraded while building it
pub struct Session {
    pub agent: TroubleshootingAgent,
    pub warnings: Vec<String>,
    /// None when the audit log could not be opened
    pub audit_path: Option<PathBuf>,
}

/// Build the agent. `connect_model` is false for subcommands that never
/// talk to the model (check, classify, catalog).
pub fn build_session(config: &NetdocConfig, connect_model: bool) -> Session {
    let mut warnings = Vec::new();

    let rules = RuleSet::load(config.paths.rules_file.as_deref());

    let source = CatalogSource::from_optional_path(config.paths.knowledge_base.as_deref());
    let (catalog, catalog_error) = Catalog::load(&source);
    if let Some(e) = catalog_error {
        warnings.push(format!(
            "Error loading knowledge base: {}. Using built-in catalog.",
            e
        ));
    }

    let audit_file = config.paths.effective_audit_log();
    let (audit, audit_path): (Arc<dyn AuditSink>, Option<PathBuf>) =
        match JsonlAuditLog::open(&audit_file) {
            Ok(log) => (Arc::new(log), Some(audit_file)),
            Err(e) => {
                warnings.push(format!("Audit log disabled: {}", e));
                (Arc::new(NullAuditSink), None)
            }
        };

    let shell = Arc::new(PowerShellExecutor::new(
        config.executor.shell.clone(),
        config.executor.effective_timeout(),
    ));

    let mut agent = TroubleshootingAgent::new(catalog, shell)
        .with_rules(rules)
        .with_audit(audit)
        .with_retry(config.retry.policy())
        .with_history_capacity(config.session.effective_history_capacity())
        .with_top_n(config.session.effective_top_n())
        .with_temperature(config.llm.effective_temperature());

    if connect_model {
        match model_client(config) {
            Ok(client) => {
                let client = Arc::new(client);
                agent = agent.with_generator(client.clone()).with_embedder(client);
            }
            Err(message) => warnings.push(message),
        }
    }

    info!(
        warnings = warnings.len(),
        model = agent.has_generator(),
        "Session assembled"
    );

    Session {
        agent,
        warnings,
        audit_path,
    }
}

fn model_client(config: &NetdocConfig) -> Result<OpenAiClient, String> {
    if !config.llm.enabled {
        return Err("LLM is disabled in configuration; analysis is unavailable.".to_string());
    }
    let Some(api_key) = config.llm.api_key() else {
        return Err(format!(
            "{} is not set; analysis is unavailable. Commands can still be checked.",
            config.llm.api_key_env
        ));
    };
    OpenAiClient::new(OpenAiConfig {
        endpoint: config.llm.endpoint.clone(),
        chat_model: config.llm.chat_model.clone(),
        embedding_model: config.llm.embedding_model.clone(),
        api_key,
        timeout_secs: config.llm.effective_timeout_secs(),
    })
    .map_err(|e| format!("Model client unavailable: {}", e))
}
