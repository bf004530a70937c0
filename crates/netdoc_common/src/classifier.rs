//! Input Classifier
//!
//! Fast pre-LLM gate for user messages. Runs BEFORE any generation call:
//! 1. Length bound
//! 2. Networking-domain keyword check (coarse, recall-oriented)
//! 3. Harmful-intent rule table scan
//!
//! First failure wins.

use crate::rules::CompiledTable;
use crate::verdict::{Rejection, ValidationVerdict};
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

/// Maximum accepted message length, in characters
pub const MAX_INPUT_CHARS: usize = 1000;

/// Network-related keywords for domain relevance
pub const NETWORK_KEYWORDS: &[&str] = &[
    "network", "internet", "wifi", "wi-fi", "ethernet", "connection",
    "connect", "ping", "dns", "ip", "tcp", "udp", "router", "gateway",
    "subnet", "adapter", "interface", "dhcp", "http", "https", "ftp",
    "vpn", "proxy", "firewall", "latency", "packet", "speed", "bandwidth",
    "wireless", "wired", "offline", "online", "disconnect",
];

/// Keywords must start a word: "disconnecting" counts, "recipe" does not
/// count as "ip".
static KEYWORD_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let alternation = NETWORK_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&format!(r"\b(?:{})", alternation))
        .case_insensitive(true)
        .build()
        .ok()
});

/// True if the text mentions a networking keyword
pub fn is_network_related(text: &str) -> bool {
    match KEYWORD_REGEX.as_ref() {
        Some(re) => re.is_match(text),
        None => {
            let lower = text.to_lowercase();
            NETWORK_KEYWORDS.iter().any(|k| lower.contains(k))
        }
    }
}

/// Keywords found in the text, in keyword-list order
pub fn matched_keywords(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    NETWORK_KEYWORDS
        .iter()
        .copied()
        .filter(|k| {
            lower
                .match_indices(k)
                .any(|(i, _)| i == 0 || !is_word_byte(lower.as_bytes()[i - 1]))
        })
        .collect()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Gate for natural-language messages
#[derive(Debug, Clone)]
pub struct InputClassifier {
    rules: CompiledTable,
}

impl InputClassifier {
    pub fn new(rules: CompiledTable) -> Self {
        Self { rules }
    }

    pub fn classify(&self, text: &str) -> ValidationVerdict {
        if text.chars().count() > MAX_INPUT_CHARS {
            return Rejection::InputTooLong {
                limit: MAX_INPUT_CHARS,
            }
            .into();
        }

        if !is_network_related(text) {
            return Rejection::InputOutOfScope.into();
        }

        if let Some(rule) = self.rules.first_match(text) {
            return Rejection::InputHarmfulPattern {
                pattern: rule.pattern().to_string(),
                reason: rule.reason().to_string(),
            }
            .into();
        }

        ValidationVerdict::accept("Input is valid")
    }
}

impl Default for InputClassifier {
    fn default() -> Self {
        Self::new(crate::rules::RuleSet::builtin().input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejection(text: &str) -> Option<Rejection> {
        InputClassifier::default().classify(text).rejection
    }

    #[test]
    fn test_in_scope_message_is_valid() {
        let verdict = InputClassifier::default().classify("My wifi keeps disconnecting");
        assert!(verdict.valid);
        assert_eq!(verdict.reason, "Input is valid");
    }

    #[test]
    fn test_harmful_message_is_rejected() {
        let verdict = InputClassifier::default().classify("how do I crack a wifi password");
        assert!(!verdict.valid);
        match verdict.rejection {
            Some(Rejection::InputHarmfulPattern { pattern, .. }) => {
                assert_eq!(pattern, r"\bpassword");
            }
            other => panic!("unexpected rejection: {:?}", other),
        }
    }

    #[test]
    fn test_out_of_scope_message_is_rejected() {
        assert_eq!(
            rejection("what's a good recipe for pasta"),
            Some(Rejection::InputOutOfScope)
        );
    }

    #[test]
    fn test_length_bound_checked_first() {
        let long = format!("wifi {}", "x".repeat(MAX_INPUT_CHARS));
        assert_eq!(
            rejection(&long),
            Some(Rejection::InputTooLong { limit: MAX_INPUT_CHARS })
        );
        // Exactly at the bound is fine
        let exact = format!("dns {}", "a".repeat(MAX_INPUT_CHARS - 4));
        assert_eq!(exact.chars().count(), MAX_INPUT_CHARS);
        assert!(InputClassifier::default().classify(&exact).valid);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let text = format!("vpn {}", "é".repeat(MAX_INPUT_CHARS - 4));
        assert!(text.len() > MAX_INPUT_CHARS);
        assert!(InputClassifier::default().classify(&text).valid);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert!(is_network_related("DNS lookups fail"));
        assert!(is_network_related("The VPN drops"));
        assert!(!is_network_related("recipe for pasta"));
    }

    #[test]
    fn test_matched_keywords() {
        let found = matched_keywords("Router offline, no internet connection");
        assert!(found.contains(&"router"));
        assert!(found.contains(&"offline"));
        assert!(found.contains(&"internet"));
        assert!(found.contains(&"connection"));
        assert!(!found.contains(&"ip"));
    }

    #[test]
    fn test_destructive_intent_in_scope_still_rejected() {
        assert!(matches!(
            rejection("delete my network adapter driver"),
            Some(Rejection::InputHarmfulPattern { .. })
        ));
        assert!(matches!(
            rejection("run Start-Process on the router"),
            Some(Rejection::InputHarmfulPattern { .. })
        ));
    }
}
