//! Pulls candidate command lines out of model-generated markdown.
//!
//! Fenced blocks contribute one candidate per line; inline code spans
//! outside fences contribute one candidate each. Only lines mentioning a
//! diagnostic verb hint survive. Extraction does not validate anything.

use regex::Regex;
use std::sync::LazyLock;

/// Substrings a candidate must contain (lowercase)
pub const COMMAND_HINTS: &[&str] = &[
    "get-net",
    "test-",
    "resolve-dns",
    "get-dns",
    "clear-dns",
    "restart-service",
    "get-service",
];

static FENCE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").ok());

static INLINE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").ok());

/// `PS>` / `PS C:\Users\me>` prompt prefix
static PROMPT_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^PS(?:\s+[^>]*)?>\s*").ok());

/// Ordered, de-duplicated candidates
pub fn extract_commands(text: &str) -> Vec<String> {
    let (Some(fence), Some(inline)) = (FENCE_REGEX.as_ref(), INLINE_REGEX.as_ref()) else {
        return Vec::new();
    };

    let mut raw: Vec<String> = Vec::new();

    for caps in fence.captures_iter(text) {
        if let Some(body) = caps.get(1) {
            raw.extend(fence_lines(body.as_str()).map(str::to_string));
        }
    }

    let outside = fence.replace_all(text, "\n");
    for caps in inline.captures_iter(&outside) {
        if let Some(span) = caps.get(1) {
            raw.push(span.as_str().to_string());
        }
    }

    let mut commands: Vec<String> = Vec::new();
    for candidate in raw.iter().filter_map(|c| clean(c)) {
        if is_command_like(&candidate) && !commands.contains(&candidate) {
            commands.push(candidate);
        }
    }
    commands
}

/// Body lines, without a leading info string such as `powershell`
fn fence_lines(body: &str) -> impl Iterator<Item = &str> {
    let mut lines = body.lines().peekable();
    if let Some(first) = lines.peek() {
        if is_info_string(first) {
            lines.next();
        }
    }
    lines
}

fn is_info_string(line: &str) -> bool {
    let word = line.trim();
    !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn clean(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let without_prompt = match PROMPT_REGEX.as_ref() {
        Some(re) => re.replace(trimmed, "").trim().to_string(),
        None => trimmed.to_string(),
    };
    (!without_prompt.is_empty()).then_some(without_prompt)
}

fn is_command_like(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    COMMAND_HINTS.iter().any(|hint| lower.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_split_into_lines() {
        let text = "Run these:\n```powershell\nGet-NetAdapter\n# check DNS\nGet-DnsClientServerAddress -InterfaceAlias Wi-Fi\n```\n";
        assert_eq!(
            extract_commands(text),
            vec!["Get-NetAdapter", "Get-DnsClientServerAddress -InterfaceAlias Wi-Fi"]
        );
    }

    #[test]
    fn test_inline_spans_outside_fences() {
        let text = "First run `Test-NetConnection -ComputerName example.com` then `ipconfig`.";
        assert_eq!(
            extract_commands(text),
            vec!["Test-NetConnection -ComputerName example.com"]
        );
    }

    #[test]
    fn test_untagged_fence_and_prompt_prefix() {
        let text = "```\nPS C:\\Users\\me> Get-NetIPConfiguration -Detailed\nPS> Resolve-DnsName example.com\n```";
        assert_eq!(
            extract_commands(text),
            vec!["Get-NetIPConfiguration -Detailed", "Resolve-DnsName example.com"]
        );
    }

    #[test]
    fn test_duplicates_removed_in_order() {
        let text = "`Get-NetAdapter`\n```ps1\nGet-NetRoute\nGet-NetAdapter\n```\n`Get-NetRoute`";
        assert_eq!(extract_commands(text), vec!["Get-NetRoute", "Get-NetAdapter"]);
    }

    #[test]
    fn test_unsafe_candidates_still_extracted() {
        // Filtering by hint only; the validator decides
        let text = "`Get-NetAdapter | Out-File x.txt`";
        assert_eq!(extract_commands(text), vec!["Get-NetAdapter | Out-File x.txt"]);
    }

    #[test]
    fn test_no_code_means_no_commands() {
        assert!(extract_commands("Restart your router and try Get-NetAdapter.").is_empty());
        assert!(extract_commands("").is_empty());
    }

    #[test]
    fn test_single_line_fence_keeps_command() {
        assert_eq!(extract_commands("```Get-DnsClientCache```"), vec!["Get-DnsClientCache"]);
    }
}
