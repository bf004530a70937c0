//! netdoc Configuration
//!
//! Per-user TOML file at `$XDG_CONFIG_HOME/netdoc/config.toml`, or the path
//! given with `--config`. Every section and field is optional; absent
//! values take defaults and out-of-range values are clamped by the
//! `effective_*` helpers.
//!
//! ```toml
//! [llm]
//! chat_model = "gpt-4o"
//!
//! [executor]
//! timeout_secs = 45
//!
//! [paths]
//! knowledge_base = "/home/me/netdoc/commands.json"
//! ```

use crate::error::ConfigError;
use crate::llm::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_ENDPOINT};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "netdoc";
const CONFIG_FILE: &str = "config.toml";
const AUDIT_FILE: &str = "audit.jsonl";

// ============================================================================
// [llm]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Set false to run without generation or embeddings
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout (valid: 5-600)
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature (valid: 0.0-2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_llm_timeout(),
            temperature: default_temperature(),
        }
    }
}

impl LlmSettings {
    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.clamp(5, 600)
    }

    pub fn effective_temperature(&self) -> f32 {
        if self.temperature.is_finite() {
            self.temperature.clamp(0.0, 2.0)
        } else {
            default_temperature()
        }
    }

    /// API key from the configured environment variable, if non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

// ============================================================================
// [retry]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts per call, including the first (valid: 1-10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetrySettings {
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.clamp(1, 10)
    }

    pub fn policy(&self) -> RetryPolicy {
        let max_delay = self.max_delay_ms.min(60_000);
        RetryPolicy::new(
            self.effective_max_attempts(),
            Duration::from_millis(self.base_delay_ms.min(max_delay)),
            Duration::from_millis(max_delay),
        )
    }
}

// ============================================================================
// [executor]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// PowerShell binary (`pwsh` or `powershell`)
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Per-command timeout (valid: 1-300)
    #[serde(default = "default_exec_timeout")]
    pub timeout_secs: u64,
}

fn default_shell() -> String {
    crate::runner::DEFAULT_SHELL.to_string()
}

fn default_exec_timeout() -> u64 {
    crate::runner::DEFAULT_TIMEOUT_SECS
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            timeout_secs: default_exec_timeout(),
        }
    }
}

impl ExecutorSettings {
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(1, 300))
    }
}

// ============================================================================
// [paths]
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// JSON catalog; built-in catalog when unset
    #[serde(default)]
    pub knowledge_base: Option<PathBuf>,

    /// TOML rule tables; built-in tables when unset
    #[serde(default)]
    pub rules_file: Option<PathBuf>,

    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

impl PathSettings {
    /// Configured audit log, else the per-user state directory
    pub fn effective_audit_log(&self) -> PathBuf {
        if let Some(path) = &self.audit_log {
            return path.clone();
        }
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR)
            .join(AUDIT_FILE)
    }
}

// ============================================================================
// [session]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Conversation turns kept (valid: 2-100)
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Catalog entries offered to the model (valid: 1-20)
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_history_capacity() -> usize {
    crate::history::DEFAULT_HISTORY_CAPACITY
}

fn default_top_n() -> usize {
    crate::matcher::DEFAULT_TOP_N
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            top_n: default_top_n(),
        }
    }
}

impl SessionSettings {
    pub fn effective_history_capacity(&self) -> usize {
        self.history_capacity.clamp(2, 100)
    }

    pub fn effective_top_n(&self) -> usize {
        self.top_n.clamp(1, 20)
    }
}

// ============================================================================
// NetdocConfig
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetdocConfig {
    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub executor: ExecutorSettings,

    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub session: SessionSettings,
}

impl NetdocConfig {
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Malformed {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load from an explicit file. Missing file is an error.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Explicit path must exist; the default path may be absent (defaults).
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }
}

/// Default config file location
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}
