//! Output formatting - ASCII-only terminal output
//!
//! Formatters return plain strings so they can be tested; the `display_*`
//! functions add colour and print.

use netdoc_common::agent::{CommandCandidate, CommandReport};
use netdoc_common::catalog::Catalog;
use netdoc_common::verdict::ValidationVerdict;
use owo_colors::OwoColorize;

/// Width used when wrapping prose
pub const WRAP_WIDTH: usize = 80;

pub const SEPARATOR: &str =
    "------------------------------------------------------------";

// ============================================================================
// Plain formatters
// ============================================================================

/// One line of model text, classified for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextLine {
    /// A ``` fence marker (opening or closing)
    Fence(String),
    /// Inside a fenced block, kept verbatim
    Code(String),
    /// Wrapped prose
    Prose(String),
}

/// Split model text into lines, wrapping prose at `width` and leaving
/// fenced code untouched
pub fn layout_text(text: &str, width: usize) -> Vec<TextLine> {
    let mut lines = Vec::new();
    let mut in_code = false;

    for raw in text.lines() {
        if raw.trim_start().starts_with("```") {
            in_code = !in_code;
            lines.push(TextLine::Fence(raw.to_string()));
        } else if in_code {
            lines.push(TextLine::Code(raw.to_string()));
        } else if raw.trim().is_empty() {
            lines.push(TextLine::Prose(String::new()));
        } else {
            for wrapped in textwrap::wrap(raw, width) {
                lines.push(TextLine::Prose(wrapped.into_owned()));
            }
        }
    }
    lines
}

/// `[VALID] subject` or `[REJECTED] subject` followed by the reason
pub fn format_verdict(subject: &str, verdict: &ValidationVerdict) -> String {
    match &verdict.rejection {
        None => format!("[VALID] {}\n  {}", subject, verdict.reason),
        Some(rejection) => format!(
            "[REJECTED] {}\n  {} ({})",
            subject,
            verdict.reason,
            rejection.code()
        ),
    }
}

/// Numbered list of runnable commands
pub fn format_command_list<'a>(candidates: impl IntoIterator<Item = &'a CommandCandidate>) -> String {
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.command))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `- command: reason` for every rejected candidate
pub fn format_rejected_list(candidates: &[CommandCandidate]) -> String {
    candidates
        .iter()
        .filter(|c| !c.is_valid())
        .map(|c| format!("- {}: {}", c.command, c.verdict.reason))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Aligned table of catalog entries
pub fn format_catalog(catalog: &Catalog) -> String {
    let width = catalog
        .entries()
        .iter()
        .map(|e| e.name().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for entry in catalog.entries() {
        out.push_str(&format!("{:<width$}  {}\n", entry.name(), entry.description()));
        if !entry.options().is_empty() {
            let options: Vec<String> = entry.options().iter().map(|o| format!("-{}", o)).collect();
            out.push_str(&format!("{:<width$}  options: {}\n", "", options.join(", ")));
        }
    }
    out.push_str(&format!("{} commands", catalog.len()));
    out
}

/// Short failure line for a command that did not run
pub fn format_not_executed(report: &CommandReport) -> String {
    let reason = report
        .error
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or("Unknown error");
    format!("Failed to execute command: {}", reason)
}

// ============================================================================
// Display
// ============================================================================

pub fn display_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red(), message.red());
}

pub fn display_warning(message: &str) {
    eprintln!("{} {}", "[WARN]".yellow(), message.yellow());
}

pub fn display_success(message: &str) {
    println!("{} {}", "[OK]".green(), message);
}

pub fn display_info(message: &str) {
    println!("{} {}", "[INFO]".cyan(), message);
}

/// Model text with fences in cyan and code in green
pub fn display_text(text: &str) {
    for line in layout_text(text, WRAP_WIDTH) {
        match line {
            TextLine::Fence(l) => println!("{}", l.cyan()),
            TextLine::Code(l) => println!("{}", l.green()),
            TextLine::Prose(l) => println!("{}", l),
        }
    }
}

pub fn display_verdict(subject: &str, verdict: &ValidationVerdict) {
    let text = format_verdict(subject, verdict);
    if verdict.valid {
        println!("{}", text.green());
    } else {
        println!("{}", text.red());
    }
}

/// Output, error and interpretation of one executed command
pub fn display_report(report: &CommandReport) {
    if !report.executed {
        display_error(&format_not_executed(report));
        return;
    }

    match report.exit_code {
        Some(0) => display_success("Command executed successfully!"),
        Some(code) => display_warning(&format!("Command exited with code {}", code)),
        None => display_warning("Command finished without an exit code"),
    }

    if let Some(output) = &report.output {
        println!("Output:");
        println!("{}", "```".cyan());
        println!("{}", output.green());
        println!("{}", "```".cyan());
    }

    if let Some(error) = &report.error {
        println!("{}", "Error:".red());
        println!("{}", error);
    }

    if let Some(interpretation) = &report.interpretation {
        println!();
        println!("Interpretation:");
        display_text(interpretation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_keeps_code_verbatim() {
        let long = "word ".repeat(40);
        let text = format!("{}\n```powershell\n{}\n```", long.trim(), long.trim());
        let lines = layout_text(&text, 40);

        let code: Vec<&TextLine> = lines.iter().filter(|l| matches!(l, TextLine::Code(_))).collect();
        assert_eq!(code.len(), 1);
        assert!(lines.iter().all(|l| match l {
            TextLine::Prose(p) => p.len() <= 40,
            _ => true,
        }));
        assert_eq!(
            lines.iter().filter(|l| matches!(l, TextLine::Fence(_))).count(),
            2
        );
    }

    #[test]
    fn test_blank_lines_survive() {
        let lines = layout_text("a\n\nb", 80);
        assert_eq!(
            lines,
            vec![
                TextLine::Prose("a".to_string()),
                TextLine::Prose(String::new()),
                TextLine::Prose("b".to_string()),
            ]
        );
    }
}
