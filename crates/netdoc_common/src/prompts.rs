//! Prompt templates for analysis and interpretation calls.

use crate::catalog::CatalogEntry;

/// Sampling temperature for both calls
pub const TEMPERATURE: f32 = 0.3;
pub const ANALYSIS_MAX_TOKENS: u32 = 1000;
pub const INTERPRETATION_MAX_TOKENS: u32 = 800;

/// One context line per entry: `Name -Opt1, -Opt2: description`
pub fn command_context_line(entry: &CatalogEntry) -> String {
    let options = entry
        .options()
        .iter()
        .map(|o| format!("-{}", o))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} {}: {}", entry.name(), options, entry.description())
}

/// System prompt for issue analysis, listing the candidate commands
pub fn analysis_system_prompt(entries: &[&CatalogEntry]) -> String {
    let context = entries
        .iter()
        .map(|e| command_context_line(e))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a Windows network troubleshooting assistant.\n\
         Your task is to analyze the user's network issue and suggest appropriate PowerShell commands to diagnose and fix the problem.\n\
         You have the following PowerShell commands available:\n\
         \n\
         {}\n\
         \n\
         For each command you recommend:\n\
         1. Explain why this command is relevant to the user's issue\n\
         2. Show the exact command syntax they should run\n\
         3. Explain what output to expect and how to interpret it\n\
         \n\
         Only recommend commands from the list provided. Do not make up commands.\n\
         Provide specific command lines, not general advice.",
        context
    )
}

pub const INTERPRETATION_SYSTEM_PROMPT: &str = "You are a Windows network troubleshooting assistant.\n\
Your task is to interpret the output of a PowerShell command and explain what it means for the user's network issue.\n\
Focus on:\n\
1. Explaining what the output shows in simple terms\n\
2. Identifying any potential issues or anomalies\n\
3. Suggesting next steps based on this information\n\
Be concise but thorough in your explanation.";

/// User message for interpretation. `output` must already be sanitized.
pub fn interpretation_user_prompt(command: &str, output: &str) -> String {
    format!(
        "I ran this PowerShell command: `{}`\n\nHere's the output:\n```\n{}\n```\n\nPlease explain what this means and what I should do next.",
        command, output
    )
}

/// System turn recorded after an execution. `output` must already be sanitized.
pub fn execution_turn(command: &str, output: &str) -> String {
    format!("Command executed: `{}`\nOutput:\n```\n{}\n```", command, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_context_line_format() {
        let catalog = Catalog::builtin();
        let entry = catalog.lookup("Get-NetAdapter").unwrap();
        assert_eq!(
            command_context_line(entry),
            "Get-NetAdapter -Name, -InterfaceDescription: Shows the network adapter's name, status, MAC address, link speed and related info."
        );
    }

    #[test]
    fn test_context_line_without_options() {
        let catalog = Catalog::builtin();
        let entry = catalog.lookup("Get-DnsClientCache").unwrap();
        assert_eq!(
            command_context_line(entry),
            "Get-DnsClientCache : Shows the DNS resolver cache."
        );
    }

    #[test]
    fn test_analysis_prompt_lists_entries() {
        let catalog = Catalog::builtin();
        let entries: Vec<&CatalogEntry> = catalog.entries().iter().take(2).collect();
        let prompt = analysis_system_prompt(&entries);
        assert!(prompt.contains("Get-NetIPAddress -InterfaceAlias"));
        assert!(prompt.contains("Get-NetIPConfiguration -InterfaceAlias, -Detailed"));
        assert!(prompt.contains("Only recommend commands from the list provided."));
        assert!(!prompt.contains("Get-NetAdapter"));
    }

    #[test]
    fn test_interpretation_prompt_embeds_output() {
        let prompt = interpretation_user_prompt("Get-NetAdapter", "Ethernet Up");
        assert!(prompt.starts_with("I ran this PowerShell command: `Get-NetAdapter`"));
        assert!(prompt.contains("```\nEthernet Up\n```"));
    }
}
