//! Harmful-Pattern Rule Tables
//!
//! Two versioned tables of `{pattern, reason}` rules:
//! - `input`: scanned over natural-language messages. Word-anchored so
//!   prose like "information" or "network card" does not trip `format`/`rd`.
//! - `command`: scanned over literal command text before anything else.
//!   Raw substrings; this table is the union of every deny-list the
//!   assistant has ever enforced, so nothing once blocked becomes runnable.
//!
//! Both ship compiled into the binary and can be replaced from a TOML file
//! without touching the validation logic. All patterns are case-insensitive.

use crate::error::RulesError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Version of the built-in tables
pub const BUILTIN_RULES_VERSION: u32 = 1;

/// Built-in rules for user messages
const INPUT_RULES: &[(&str, &str)] = &[
    // System reboot operations
    (r"\bshutdown", "system shutdown"),
    (r"\brestart", "system restart"),
    (r"\breboot", "system reboot"),
    // Deletion operations
    (r"\bformat", "disk formatting"),
    (r"\bdelete", "deletion"),
    (r"\bremove", "removal"),
    (r"\buninstall", "software removal"),
    // Sensitive data
    (r"\bpassword", "credential access"),
    (r"\bcredential", "credential access"),
    (r"\bsecret", "secret access"),
    // Security operations
    (r"\bencrypt", "cryptographic operation"),
    (r"\bdecrypt", "cryptographic operation"),
    (r"\bcrack", "cryptographic attack"),
    // Malicious intent
    (r"\bhack", "malicious intent"),
    (r"\bexploit", "malicious intent"),
    (r"\bvulnerabilit", "malicious intent"),
    // Harmful software
    (r"\bmalware", "harmful software"),
    (r"\bvirus", "harmful software"),
    (r"\btrojan", "harmful software"),
    // Deletion commands
    (r"\brm\s+[-rf]", "shell deletion"),
    (r"\bdel\b", "shell deletion"),
    (r"\brd\b", "shell deletion"),
    (r"\brmdir\b", "shell deletion"),
    // Execution commands
    (r"invoke-expression", "code execution"),
    (r"\biex\b", "code execution"),
    // Creation/modification
    (r"new-item", "object creation"),
    (r"\bset-", "object modification"),
    // Process creation
    (r"start-process", "process creation"),
];

/// Built-in rules for command text
const COMMAND_RULES: &[(&str, &str)] = &[
    // Redirection and chaining
    (r">>", "file output redirection"),
    (r">", "file output redirection"),
    (r"<", "input redirection"),
    (r"\|", "pipeline"),
    (r";", "command chaining"),
    (r"&", "command chaining"),
    (r"`", "escape sequence"),
    (r"\$", "variable or subexpression"),
    (r"[(){}]", "subexpression or script block"),
    (r"@", "splatting or array expression"),
    (r"[\r\n]", "multi-line command"),
    (r"out-file", "file output"),
    // Specific dangerous cmdlets
    (r"remove-item", "destructive file operation"),
    (r"restart-computer", "system restart"),
    (r"start-process", "process creation"),
    (r"invoke-expression", "code execution"),
    (r"invoke-webrequest", "web request"),
    (r"new-item", "object creation"),
    (r"set-", "object modification"),
    (r"remove-", "removal"),
    (r"uninstall-", "software removal"),
    (r"iex", "code execution"),
    (r"wget", "web request"),
    (r"curl", "web request"),
    // Shell deletion idioms
    (r"rm\s+-r", "destructive file operation"),
    (r"rm\s+[-rf]", "destructive file operation"),
    (r"rmdir", "destructive file operation"),
    (r"del\s+", "destructive file operation"),
    (r"del", "destructive file operation"),
    (r"rd", "destructive file operation"),
    // System control
    (r"shutdown", "system shutdown"),
    (r"restart", "system restart"),
    (r"reboot", "system reboot"),
    // Deletion operations
    (r"format", "disk formatting"),
    (r"delete", "deletion"),
    (r"remove", "removal"),
    (r"uninstall", "software removal"),
    // Sensitive data
    (r"password", "credential access"),
    (r"credential", "credential access"),
    (r"secret", "secret access"),
    // Security operations
    (r"encrypt", "cryptographic operation"),
    (r"decrypt", "cryptographic operation"),
    (r"crack", "cryptographic attack"),
    (r"hack", "malicious intent"),
    (r"exploit", "malicious intent"),
    (r"vulnerability", "malicious intent"),
    // Harmful software
    (r"malware", "harmful software"),
    (r"virus", "harmful software"),
    (r"trojan", "harmful software"),
];

// ============================================================================
// Rule Table (serialized form)
// ============================================================================

/// One deny rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    pub reason: String,
}

/// Versioned list of deny rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub version: u32,
    pub rules: Vec<PatternRule>,
}

impl RuleTable {
    fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            version: BUILTIN_RULES_VERSION,
            rules: pairs
                .iter()
                .map(|(pattern, reason)| PatternRule {
                    pattern: pattern.to_string(),
                    reason: reason.to_string(),
                })
                .collect(),
        }
    }

    pub fn builtin_input() -> Self {
        Self::from_pairs(INPUT_RULES)
    }

    pub fn builtin_command() -> Self {
        Self::from_pairs(COMMAND_RULES)
    }
}

/// On-disk override file: either table may be omitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub input: Option<RuleTable>,
    #[serde(default)]
    pub command: Option<RuleTable>,
}

// ============================================================================
// Compiled Tables
// ============================================================================

/// A compiled deny rule
#[derive(Debug, Clone)]
pub struct CompiledRule {
    regex: Regex,
    pattern: String,
    reason: String,
}

impl CompiledRule {
    fn new(pattern: &str, reason: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            regex,
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// A compiled, ordered rule table. First match wins.
#[derive(Debug, Clone)]
pub struct CompiledTable {
    version: u32,
    rules: Vec<CompiledRule>,
}

impl CompiledTable {
    /// Compile every rule; any invalid pattern rejects the whole table
    pub fn compile(name: &str, table: &RuleTable) -> Result<Self, RulesError> {
        if table.rules.is_empty() {
            return Err(RulesError::EmptyTable(name.to_string()));
        }
        let rules = table
            .rules
            .iter()
            .map(|r| {
                CompiledRule::new(&r.pattern, &r.reason).map_err(|e| RulesError::InvalidPattern {
                    table: name.to_string(),
                    pattern: r.pattern.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            version: table.version,
            rules,
        })
    }

    /// Compile built-in literals. Patterns that fail to compile are skipped;
    /// the unit tests pin every built-in pattern as valid.
    fn compile_builtin(pairs: &[(&str, &str)]) -> Self {
        Self {
            version: BUILTIN_RULES_VERSION,
            rules: pairs
                .iter()
                .filter_map(|(p, r)| CompiledRule::new(p, r).ok())
                .collect(),
        }
    }

    pub fn first_match(&self, text: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.is_match(text))
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ============================================================================
// Rule Set
// ============================================================================

/// The input and command tables in force
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub input: CompiledTable,
    pub command: CompiledTable,
}

impl RuleSet {
    pub fn builtin() -> Self {
        Self {
            input: CompiledTable::compile_builtin(INPUT_RULES),
            command: CompiledTable::compile_builtin(COMMAND_RULES),
        }
    }

    /// Parse an override file. Tables it omits keep their built-in rules.
    pub fn from_toml_str(content: &str) -> Result<Self, RulesError> {
        let file: RulesFile = toml::from_str(content)?;
        let builtin = Self::builtin();
        let input = match &file.input {
            Some(table) => CompiledTable::compile("input", table)?,
            None => builtin.input,
        };
        let command = match &file.command {
            Some(table) => CompiledTable::compile("command", table)?,
            None => builtin.command,
        };
        Ok(Self { input, command })
    }

    pub fn from_file(path: &Path) -> Result<Self, RulesError> {
        let content = fs::read_to_string(path).map_err(|source| RulesError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load overrides if configured; any failure keeps the built-in tables
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::from_file(path) {
            Ok(rules) => {
                info!(
                    path = %path.display(),
                    input_version = rules.input.version(),
                    command_version = rules.command.version(),
                    "Loaded rule tables"
                );
                rules
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Rejected rule file, using built-in rules");
                Self::builtin()
            }
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtin_patterns_compile() {
        let rules = RuleSet::builtin();
        assert_eq!(rules.input.len(), INPUT_RULES.len());
        assert_eq!(rules.command.len(), COMMAND_RULES.len());
        assert_eq!(rules.input.version(), BUILTIN_RULES_VERSION);
    }

    #[test]
    fn test_command_table_is_case_insensitive() {
        let rules = RuleSet::builtin();
        let hit = rules.command.first_match("REMOVE-ITEM C:\\temp").unwrap();
        assert_eq!(hit.pattern(), "remove-item");
    }

    #[test]
    fn test_command_table_first_match_wins() {
        let rules = RuleSet::builtin();
        let hit = rules.command.first_match("Get-NetAdapter > out.txt").unwrap();
        assert_eq!(hit.pattern(), ">");
        assert_eq!(hit.reason(), "file output redirection");
    }

    #[test]
    fn test_input_table_is_word_anchored() {
        let rules = RuleSet::builtin();
        assert!(rules.input.first_match("I need information about my network card").is_none());
        assert!(rules.input.first_match("please format my drive").is_some());
        assert!(rules.input.first_match("del C:\\x").is_some());
    }

    #[test]
    fn test_override_file_replaces_one_table() {
        let toml = r#"
            [input]
            version = 7
            [[input.rules]]
            pattern = 'forbidden'
            reason = "test rule"
        "#;
        let rules = RuleSet::from_toml_str(toml).unwrap();
        assert_eq!(rules.input.version(), 7);
        assert_eq!(rules.input.len(), 1);
        assert_eq!(rules.command.len(), COMMAND_RULES.len());
    }

    #[test]
    fn test_override_rejects_invalid_pattern() {
        let toml = r#"
            [command]
            version = 2
            [[command.rules]]
            pattern = '(unclosed'
            reason = "broken"
        "#;
        assert!(matches!(
            RuleSet::from_toml_str(toml),
            Err(RulesError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_override_rejects_empty_table() {
        let toml = "[command]\nversion = 2\nrules = []\n";
        assert!(matches!(
            RuleSet::from_toml_str(toml),
            Err(RulesError::EmptyTable(_))
        ));
    }

    #[test]
    fn test_load_falls_back_on_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        fs::write(&path, "this is = = not toml").unwrap();
        let rules = RuleSet::load(Some(&path));
        assert_eq!(rules.command.len(), COMMAND_RULES.len());
    }
}
