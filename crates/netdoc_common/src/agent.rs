//! Troubleshooting Agent
//!
//! Ties the gates, matcher, model and shell into one conversation:
//!
//! ```text
//! message -> classify -> find relevant entries -> generate analysis
//!         -> extract candidates -> validate each
//! command -> re-validate -> run -> audit -> sanitize -> interpret
//! ```
//!
//! Capabilities are injected; a missing generator or embedder degrades the
//! session instead of failing it. Nothing here runs a command that the
//! validator did not accept in the same call.

use crate::audit::{preview, AuditEvent, AuditSink, NullAuditSink, ValidationKind};
use crate::catalog::{Catalog, CatalogEntry};
use crate::classifier::InputClassifier;
use crate::extract::extract_commands;
use crate::history::{ConversationHistory, ConversationTurn, Role};
use crate::llm::{ChatMessage, EmbeddingProvider, GenerationRequest, LlmError, TextGenerator};
use crate::matcher::{RelevanceMatcher, DEFAULT_TOP_N};
use crate::prompts;
use crate::retry::RetryPolicy;
use crate::rules::{CompiledTable, RuleSet};
use crate::runner::{ExecutionStatus, ShellExecutor};
use crate::sanitizer::sanitize;
use crate::validator::CommandValidator;
use crate::verdict::ValidationVerdict;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// Results
// ============================================================================

/// A command proposed by the model, with the gate's decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandCandidate {
    pub command: String,
    pub verdict: ValidationVerdict,
}

impl CommandCandidate {
    pub fn is_valid(&self) -> bool {
        self.verdict.valid
    }
}

/// Result of analyzing one user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueAnalysis {
    /// Model response, absent on failure
    pub analysis: Option<String>,
    /// Failure text, absent on success
    pub error: Option<String>,
    /// Names of the catalog entries offered to the model
    pub relevant: Vec<String>,
    pub candidates: Vec<CommandCandidate>,
}

impl IssueAnalysis {
    fn failed(relevant: Vec<String>, error: &LlmError) -> Self {
        Self {
            analysis: None,
            error: Some(format!("Error analyzing issue: {}", error)),
            relevant,
            candidates: Vec::new(),
        }
    }

    /// Candidates that passed validation, in order
    pub fn valid_commands(&self) -> impl Iterator<Item = &CommandCandidate> {
        self.candidates.iter().filter(|c| c.is_valid())
    }
}

/// Result of one execution request. Output is always sanitized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReport {
    pub command: String,
    pub verdict: ValidationVerdict,
    /// True if the process started and exited on its own
    pub executed: bool,
    pub status: Option<ExecutionStatus>,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    /// Timeout / spawn failure text
    pub error: Option<String>,
    pub interpretation: Option<String>,
}

impl CommandReport {
    fn rejected(command: &str, verdict: ValidationVerdict) -> Self {
        Self {
            command: command.to_string(),
            error: Some(verdict.reason.clone()),
            verdict,
            executed: false,
            status: None,
            exit_code: None,
            output: None,
            interpretation: None,
        }
    }
}

// ============================================================================
// Agent
// ============================================================================

pub struct TroubleshootingAgent {
    catalog: Catalog,
    classifier: InputClassifier,
    command_rules: CompiledTable,
    validator: CommandValidator,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    matcher: RelevanceMatcher,
    generator: Option<Arc<dyn TextGenerator>>,
    shell: Arc<dyn ShellExecutor>,
    audit: Arc<dyn AuditSink>,
    retry: RetryPolicy,
    history: ConversationHistory,
    top_n: usize,
    temperature: f32,
}

impl TroubleshootingAgent {
    /// Agent with built-in rules, no model, no audit sink
    pub fn new(catalog: Catalog, shell: Arc<dyn ShellExecutor>) -> Self {
        let rules = RuleSet::builtin();
        let audit: Arc<dyn AuditSink> = Arc::new(NullAuditSink);
        let retry = RetryPolicy::default();
        Self {
            catalog,
            classifier: InputClassifier::new(rules.input),
            validator: CommandValidator::new(rules.command.clone(), audit.clone()),
            command_rules: rules.command,
            embedder: None,
            matcher: RelevanceMatcher::new(None, retry),
            generator: None,
            shell,
            audit,
            retry,
            history: ConversationHistory::default(),
            top_n: DEFAULT_TOP_N,
            temperature: prompts::TEMPERATURE,
        }
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.classifier = InputClassifier::new(rules.input);
        self.command_rules = rules.command;
        self.rebuild_validator();
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self.rebuild_validator();
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self.rebuild_matcher();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.rebuild_matcher();
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = ConversationHistory::new(capacity);
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn rebuild_validator(&mut self) {
        self.validator = CommandValidator::new(self.command_rules.clone(), self.audit.clone());
    }

    fn rebuild_matcher(&mut self) {
        self.matcher = RelevanceMatcher::new(self.embedder.clone(), self.retry);
    }

    /// Index the catalog when an embedder is configured. Never fails;
    /// indexing errors leave the matcher in static-ordering mode.
    pub async fn initialize(&mut self) {
        if self.matcher.has_embedder() {
            // Failure already logged by the matcher
            let _ = self.matcher.index_catalog(&mut self.catalog).await;
        }
        self.audit.record(AuditEvent::SessionStart {
            catalog_size: self.catalog.len(),
            embeddings: self.catalog.has_embeddings(),
        });
        info!(
            entries = self.catalog.len(),
            embeddings = self.catalog.has_embeddings(),
            generator = self.generator.is_some(),
            "Agent initialized"
        );
    }

    /// Record the end of the session in the audit log
    pub fn finish(&self) {
        self.audit.record(AuditEvent::SessionEnd);
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn history(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.history.turns()
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Gate a user message before any model call
    pub fn check_query(&self, text: &str) -> ValidationVerdict {
        let verdict = self.classifier.classify(text);
        info!(
            valid = verdict.valid,
            reason = %verdict.reason,
            content = %preview(text),
            "User query validation"
        );
        self.audit.record(AuditEvent::validation(
            ValidationKind::UserQuery,
            text,
            &verdict,
        ));
        verdict
    }

    /// Gate a command without running it
    pub fn check_command(&self, command: &str) -> ValidationVerdict {
        self.validator.validate(&self.catalog, command)
    }

    /// Ask the model for a diagnosis and vet every command it proposes.
    /// The message should already have passed [`check_query`](Self::check_query).
    pub async fn analyze_issue(&mut self, text: &str) -> IssueAnalysis {
        self.history.push(Role::User, text);

        let relevant = self.matcher.find_relevant(&self.catalog, text, self.top_n).await;
        let relevant_names: Vec<String> = relevant.iter().map(|e| e.name().to_string()).collect();

        let offered = self.offerable(&relevant);
        let offered_refs: Vec<&CatalogEntry> = offered.iter().collect();

        let mut messages = vec![ChatMessage::system(prompts::analysis_system_prompt(&offered_refs))];
        messages.extend(self.history.turns().map(ChatMessage::from));

        let request = GenerationRequest {
            messages,
            temperature: self.temperature,
            max_tokens: prompts::ANALYSIS_MAX_TOKENS,
        };

        let response = match self.generate("analyze_issue", &request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Issue analysis failed");
                return IssueAnalysis::failed(relevant_names, &e);
            }
        };

        self.history.push(Role::Assistant, response.clone());

        let candidates = extract_commands(&response)
            .into_iter()
            .map(|command| {
                let verdict = self.validator.validate(&self.catalog, &command);
                CommandCandidate { command, verdict }
            })
            .collect();

        IssueAnalysis {
            analysis: Some(response),
            error: None,
            relevant: relevant_names,
            candidates,
        }
    }

    /// Relevant entries narrowed to what can pass validation: names the
    /// validator rejects outright are dropped, and so are options that trip
    /// a command rule
    fn offerable(&self, relevant: &[&CatalogEntry]) -> Vec<CatalogEntry> {
        relevant
            .iter()
            .filter(|e| self.validator.admits(&self.catalog, e.name()))
            .map(|e| {
                let options: Vec<&str> = e
                    .options()
                    .iter()
                    .map(String::as_str)
                    .filter(|o| {
                        self.validator
                            .admits(&self.catalog, &format!("{} -{}", e.name(), o))
                    })
                    .collect();
                CatalogEntry::new(e.name(), e.description(), &options)
            })
            .collect()
    }

    /// Re-validate, run, and interpret one command
    pub async fn execute_command(&mut self, command: &str) -> CommandReport {
        let verdict = self.validator.validate(&self.catalog, command);
        if !verdict.valid {
            return CommandReport::rejected(command, verdict);
        }

        let outcome = self.shell.run(command).await;
        self.audit.record(AuditEvent::execution(&outcome));

        if !outcome.status.process_ran() {
            warn!(status = outcome.status.as_str(), "Command did not complete");
            return CommandReport {
                command: command.to_string(),
                verdict,
                executed: false,
                status: Some(outcome.status),
                exit_code: outcome.exit_code,
                output: None,
                error: Some(sanitize(&outcome.stderr)),
                interpretation: None,
            };
        }

        let output = sanitize(outcome.primary_output());
        self.history
            .push(Role::System, prompts::execution_turn(command, &output));

        let interpretation = match self.interpret(command, &output).await {
            Ok(text) => text,
            Err(e) => format!("Error interpreting results: {}", e),
        };
        self.history.push(Role::Assistant, interpretation.clone());

        CommandReport {
            command: command.to_string(),
            verdict,
            executed: true,
            status: Some(outcome.status),
            exit_code: outcome.exit_code,
            output: Some(output),
            error: None,
            interpretation: Some(interpretation),
        }
    }

    async fn interpret(&self, command: &str, output: &str) -> Result<String, LlmError> {
        let request = GenerationRequest {
            messages: vec![
                ChatMessage::system(prompts::INTERPRETATION_SYSTEM_PROMPT),
                ChatMessage::user(prompts::interpretation_user_prompt(command, output)),
            ],
            temperature: self.temperature,
            max_tokens: prompts::INTERPRETATION_MAX_TOKENS,
        };
        self.generate("interpret_results", &request).await
    }

    async fn generate(&self, label: &str, request: &GenerationRequest) -> Result<String, LlmError> {
        let Some(generator) = &self.generator else {
            return Err(LlmError::Disabled);
        };
        self.retry.run(label, || generator.generate(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::llm::fake::{FakeEmbedder, FakeGenerator};
    use crate::runner::fake::{FakeShell, FakeShellResponse};

    const ANALYSIS: &str = "Check the adapter first:\n```powershell\nGet-NetAdapter -Name Eth0\n```\nThen try `Get-NetAdapter -BogusOption X` and `Restart-Computer`.";

    fn agent(generator: FakeGenerator, shell: FakeShell) -> (TroubleshootingAgent, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::default());
        let agent = TroubleshootingAgent::new(Catalog::builtin(), Arc::new(shell))
            .with_generator(Arc::new(generator))
            .with_audit(sink.clone())
            .with_retry(RetryPolicy::none());
        (agent, sink)
    }

    #[test]
    fn test_check_query_is_audited() {
        let (agent, sink) = agent(FakeGenerator::always("ok"), FakeShell::new());
        assert!(agent.check_query("My wifi keeps disconnecting").valid);
        assert!(!agent.check_query("what's a good recipe for pasta").valid);
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            AuditEvent::Validation {
                kind: ValidationKind::UserQuery,
                valid: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_analysis_validates_every_candidate() {
        let (mut agent, _sink) = agent(FakeGenerator::always(ANALYSIS), FakeShell::new());
        let analysis = agent.analyze_issue("my ethernet adapter is down").await;

        assert!(analysis.error.is_none());
        // `Restart-Computer` carries no diagnostic hint and is not extracted
        assert_eq!(analysis.candidates.len(), 2);
        assert_eq!(analysis.candidates[0].command, "Get-NetAdapter -Name Eth0");
        assert!(analysis.candidates[0].is_valid());
        assert_eq!(analysis.candidates[1].command, "Get-NetAdapter -BogusOption X");
        assert!(!analysis.candidates[1].is_valid());
        assert_eq!(analysis.valid_commands().count(), 1);
        assert_eq!(analysis.relevant.len(), DEFAULT_TOP_N);

        let roles: Vec<Role> = agent.history().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_analysis_request_shape() {
        let generator = Arc::new(FakeGenerator::always("Try `Get-NetIPConfiguration`"));
        let mut agent = TroubleshootingAgent::new(Catalog::builtin(), Arc::new(FakeShell::new()))
            .with_generator(generator.clone())
            .with_retry(RetryPolicy::none());

        agent.analyze_issue("no internet").await;

        let request = &generator.requests()[0];
        assert_eq!(request.max_tokens, 1000);
        assert!((request.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("Get-NetIPAddress"));
        assert_eq!(request.messages[1], ChatMessage::user("no internet"));
    }

    #[tokio::test]
    async fn test_prompt_omits_commands_that_cannot_validate() {
        let catalog = Catalog::from_entries(vec![
            CatalogEntry::new("Restart-Service", "Restarts a service.", &["Name"]),
            CatalogEntry::new("Test-Connection", "Sends echo requests.", &["Count", "Delay"]),
            CatalogEntry::new("Get-NetAdapter", "Lists adapters.", &["Name"]),
        ])
        .unwrap();
        let generator = Arc::new(FakeGenerator::always("Try `Get-NetAdapter`"));
        let mut agent = TroubleshootingAgent::new(catalog, Arc::new(FakeShell::new()))
            .with_generator(generator.clone())
            .with_retry(RetryPolicy::none());

        let analysis = agent.analyze_issue("ping is slow").await;
        assert_eq!(analysis.relevant.len(), 3);

        let prompt = &generator.requests()[0].messages[0].content;
        assert!(!prompt.contains("Restart-Service"));
        assert!(prompt.contains("Test-Connection -Count: Sends echo requests."));
        assert!(!prompt.contains("-Delay"));
        assert!(prompt.contains("Get-NetAdapter -Name: Lists adapters."));
    }

    #[tokio::test]
    async fn test_generation_failure_becomes_error_string() {
        let (mut agent, _sink) = agent(
            FakeGenerator::always_error(LlmError::Status {
                status: 401,
                body: "bad key".to_string(),
            }),
            FakeShell::new(),
        );
        let analysis = agent.analyze_issue("dns fails").await;
        assert!(analysis.analysis.is_none());
        assert!(analysis.candidates.is_empty());
        assert!(analysis
            .error
            .as_deref()
            .unwrap()
            .starts_with("Error analyzing issue: HTTP 401"));
        // The user turn is kept, no assistant turn added
        assert_eq!(agent.history().count(), 1);
    }

    #[tokio::test]
    async fn test_no_generator_degrades() {
        let mut agent = TroubleshootingAgent::new(Catalog::builtin(), Arc::new(FakeShell::new()));
        let analysis = agent.analyze_issue("vpn drops").await;
        assert_eq!(
            analysis.error.as_deref(),
            Some("Error analyzing issue: LLM is disabled in configuration")
        );
    }

    #[tokio::test]
    async fn test_rejected_command_never_reaches_shell() {
        let shell = Arc::new(FakeShell::new());
        let mut agent = TroubleshootingAgent::new(Catalog::builtin(), shell.clone())
            .with_generator(Arc::new(FakeGenerator::always("fine")));

        let report = agent.execute_command("Restart-Computer").await;
        assert!(!report.executed);
        assert!(!report.verdict.valid);
        assert_eq!(report.error.as_deref(), Some(report.verdict.reason.as_str()));
        assert_eq!(shell.call_count(), 0);
        assert_eq!(agent.history().count(), 0);
    }

    #[tokio::test]
    async fn test_execution_sanitizes_and_interprets() {
        let shell = FakeShell::new().with_response(
            "Get-NetIPAddress -AddressFamily IPv4",
            FakeShellResponse::ok("IPAddress : 192.168.1.20\nInterfaceAlias : Wi-Fi"),
        );
        let (mut agent, sink) = agent(
            FakeGenerator::always("Your adapter has an address."),
            shell,
        );

        let report = agent
            .execute_command("Get-NetIPAddress -AddressFamily IPv4")
            .await;
        assert!(report.executed);
        assert_eq!(report.status, Some(ExecutionStatus::Success));
        let output = report.output.as_deref().unwrap();
        assert!(output.contains("[IP_ADDRESS]"));
        assert!(!output.contains("192.168.1.20"));
        assert_eq!(
            report.interpretation.as_deref(),
            Some("Your adapter has an address.")
        );

        let turns: Vec<&ConversationTurn> = agent.history().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::System);
        assert!(turns[0].content.starts_with("Command executed: `Get-NetIPAddress"));
        assert!(!turns[0].content.contains("192.168.1.20"));

        // Validation then execution, both audited, execution sanitized
        let events = sink.events();
        assert_eq!(events.len(), 2);
        match &events[1] {
            AuditEvent::Execution { stdout, .. } => assert!(stdout.contains("[IP_ADDRESS]")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stderr_used_when_stdout_empty() {
        let shell = FakeShell::new().with_response(
            "Get-Service -Name Dnscache",
            FakeShellResponse::error(1, "Cannot find any service with service name 'Dnscache'."),
        );
        let (mut agent, _sink) = agent(FakeGenerator::always("Service missing."), shell);
        let report = agent.execute_command("Get-Service -Name Dnscache").await;
        assert!(report.executed);
        assert_eq!(report.exit_code, Some(1));
        assert!(report.output.unwrap().starts_with("Cannot find any service"));
    }

    #[tokio::test]
    async fn test_timeout_reported_without_interpretation() {
        let shell = FakeShell::new().with_response(
            "Test-NetConnection -ComputerName example.com",
            FakeShellResponse::timeout(),
        );
        let generator = Arc::new(FakeGenerator::always("unused"));
        let mut agent = TroubleshootingAgent::new(Catalog::builtin(), Arc::new(shell))
            .with_generator(generator.clone());

        let report = agent
            .execute_command("Test-NetConnection -ComputerName example.com")
            .await;
        assert!(!report.executed);
        assert_eq!(report.status, Some(ExecutionStatus::Timeout));
        assert!(report.error.unwrap().contains("timed out"));
        assert!(report.interpretation.is_none());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_interpretation_failure_text() {
        let (mut agent, _sink) = agent(
            FakeGenerator::always_error(LlmError::EmptyResponse),
            FakeShell::new(),
        );
        let report = agent.execute_command("Get-DnsClientCache").await;
        assert_eq!(
            report.interpretation.as_deref(),
            Some("Error interpreting results: LLM returned empty response")
        );
    }

    #[tokio::test]
    async fn test_transient_generation_failure_retried() {
        let generator = Arc::new(FakeGenerator::new(vec![
            Err(LlmError::Timeout(60)),
            Ok("Run `Get-NetRoute`".to_string()),
        ]));
        let mut agent = TroubleshootingAgent::new(Catalog::builtin(), Arc::new(FakeShell::new()))
            .with_generator(generator.clone())
            .with_retry(RetryPolicy::new(
                3,
                std::time::Duration::ZERO,
                std::time::Duration::ZERO,
            ));

        let analysis = agent.analyze_issue("routing problem on the gateway").await;
        assert!(analysis.error.is_none());
        assert_eq!(analysis.candidates[0].command, "Get-NetRoute");
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_initialize_indexes_and_audits_session() {
        let sink = Arc::new(MemoryAuditSink::default());
        let mut agent = TroubleshootingAgent::new(Catalog::builtin(), Arc::new(FakeShell::new()))
            .with_embedder(Arc::new(FakeEmbedder::with_vocabulary(&["dns", "route"])))
            .with_audit(sink.clone())
            .with_retry(RetryPolicy::none());

        agent.initialize().await;
        agent.finish();

        assert!(agent.catalog().has_embeddings());
        let events = sink.events();
        assert_eq!(
            events[0],
            AuditEvent::SessionStart {
                catalog_size: 16,
                embeddings: true
            }
        );
        assert_eq!(events[1], AuditEvent::SessionEnd);
    }

    #[tokio::test]
    async fn test_history_bounded_across_turns() {
        let (mut agent, _sink) = agent(FakeGenerator::always("Try `Get-NetAdapter`"), FakeShell::new());
        for i in 0..8 {
            agent.analyze_issue(&format!("wifi problem {}", i)).await;
        }
        assert_eq!(agent.history().count(), 10);
        assert_eq!(agent.history().next().unwrap().content, "wifi problem 3");
    }
}
