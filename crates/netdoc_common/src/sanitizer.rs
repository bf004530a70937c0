//! Output Sanitizer
//!
//! Redacts sensitive substrings from captured command output before it is
//! shown, stored in the conversation, sent to the model, or audited:
//! - MAC addresses
//! - IPv4 addresses
//! - Password key/value pairs (key kept)
//! - API keys, tokens and secrets
//! - Domain-qualified usernames (`DOMAIN\user`, key kept)
//!
//! Substitutions run in a fixed order. Placeholders never match any pattern,
//! so sanitizing twice equals sanitizing once.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const MAC_PLACEHOLDER: &str = "[MAC_ADDRESS]";
pub const IP_PLACEHOLDER: &str = "[IP_ADDRESS]";
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";
pub const CREDENTIALS_PLACEHOLDER: &str = "[CREDENTIALS_REDACTED]";

// =============================================================================
// Redaction Patterns
// =============================================================================

/// A compiled substitution
struct SanitizePattern {
    regex: Regex,
    /// Replacement template (`$1` refers to the preserved key)
    replacement: &'static str,
}

impl SanitizePattern {
    fn new(pattern: &str, replacement: &'static str) -> Option<Self> {
        Regex::new(pattern)
            .ok()
            .map(|regex| Self { regex, replacement })
    }
}

static SANITIZE_PATTERNS: LazyLock<Vec<SanitizePattern>> = LazyLock::new(|| {
    let patterns: Vec<(&str, &'static str)> = vec![
        // MAC addresses (colon or hyphen separated)
        (r"([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}", MAC_PLACEHOLDER),
        // IPv4 addresses
        (r"[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}", IP_PLACEHOLDER),
        // Password fields
        (r"(?i)(password)\s*[:=]\s*\S+", "${1}: [REDACTED]"),
        // Authentication tokens/keys
        (r"(?i)(api[-_]?key|token|secret)[:=]\s*\S+", CREDENTIALS_PLACEHOLDER),
        // Username with domain
        (r"(?i)(username)\s*[:=]\s*\S+\\+\S+", "${1}: [REDACTED]"),
    ];

    patterns
        .into_iter()
        .filter_map(|(p, r)| SanitizePattern::new(p, r))
        .collect()
});

// =============================================================================
// Sanitize Result
// =============================================================================

/// Result of a sanitize pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeResult {
    pub text: String,
    pub redaction_count: usize,
}

impl SanitizeResult {
    pub fn was_redacted(&self) -> bool {
        self.redaction_count > 0
    }
}

// =============================================================================
// Main Functions
// =============================================================================

/// Apply every substitution and count how many matches were replaced
pub fn sanitize_with_count(text: &str) -> SanitizeResult {
    let mut result = text.to_string();
    let mut count = 0;

    for pattern in SANITIZE_PATTERNS.iter() {
        let hits = pattern.regex.find_iter(&result).count();
        if hits > 0 {
            count += hits;
            result = pattern
                .regex
                .replace_all(&result, pattern.replacement)
                .into_owned();
        }
    }

    SanitizeResult {
        text: result,
        redaction_count: count,
    }
}

/// Redact sensitive substrings from captured text
pub fn sanitize(text: &str) -> String {
    sanitize_with_count(text).text
}

/// Check if text would be changed by [`sanitize`]
pub fn contains_sensitive(text: &str) -> bool {
    SANITIZE_PATTERNS.iter().any(|p| p.regex.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(SANITIZE_PATTERNS.len(), 5);
    }

    #[test]
    fn test_redact_ipv4() {
        let out = sanitize("Reply from 192.168.1.1: bytes=32");
        assert!(out.contains(IP_PLACEHOLDER));
        assert!(!out.contains("192.168.1.1"));
    }

    #[test]
    fn test_redact_mac_both_separators() {
        let out = sanitize("MacAddress : 00-15-5D-01-02-03\nother aa:bb:cc:dd:ee:ff");
        assert_eq!(out, "MacAddress : [MAC_ADDRESS]\nother [MAC_ADDRESS]");
    }

    #[test]
    fn test_redact_password_keeps_key() {
        assert_eq!(sanitize("Password=hunter2 ok"), "Password: [REDACTED] ok");
        assert_eq!(sanitize("password : s3cr3t"), "password: [REDACTED]");
    }

    #[test]
    fn test_redact_tokens_and_keys() {
        assert_eq!(sanitize("api_key=abc123"), CREDENTIALS_PLACEHOLDER);
        assert_eq!(sanitize("API-KEY: xyz"), CREDENTIALS_PLACEHOLDER);
        assert_eq!(sanitize("token=eyJabc rest"), "[CREDENTIALS_REDACTED] rest");
        assert_eq!(sanitize("Secret:foo"), CREDENTIALS_PLACEHOLDER);
    }

    #[test]
    fn test_redact_domain_username() {
        assert_eq!(
            sanitize("UserName : CORP\\alice"),
            "UserName: [REDACTED]"
        );
        // Plain usernames are left alone
        assert_eq!(sanitize("username: alice"), "username: alice");
    }

    #[test]
    fn test_clean_text_untouched() {
        let text = "Name  InterfaceDescription  Status\nEthernet  Intel(R) I219-V  Up";
        let result = sanitize_with_count(text);
        assert_eq!(result.text, text);
        assert!(!result.was_redacted());
        assert!(!contains_sensitive(text));
    }

    #[test]
    fn test_count_and_idempotence() {
        let text = "IPv4 10.0.0.2 gw 10.0.0.1 mac 00:11:22:33:44:55 password=x token=y";
        let once = sanitize_with_count(text);
        assert_eq!(once.redaction_count, 5);
        let twice = sanitize_with_count(&once.text);
        assert_eq!(twice.text, once.text);
        assert_eq!(twice.redaction_count, 1);
    }

    #[test]
    fn test_placeholders_are_stable() {
        for placeholder in [
            MAC_PLACEHOLDER,
            IP_PLACEHOLDER,
            CREDENTIALS_PLACEHOLDER,
            "password: [REDACTED]",
            "username: [REDACTED]",
        ] {
            assert_eq!(sanitize(placeholder), placeholder);
        }
    }
}
