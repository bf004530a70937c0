//! Interactive troubleshooting loop
//!
//! One turn: gate the message, ask the model, list the commands that passed
//! validation, and run them only after an explicit "y". Ctrl-C cancels the
//! prompt or the turn in flight and returns to the prompt.

use crate::output::{
    display_error, display_info, display_report, display_text, display_warning,
    format_command_list, format_rejected_list, SEPARATOR,
};
use netdoc_common::TroubleshootingAgent;
use owo_colors::OwoColorize;
use std::future::Future;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const PROMPT: &str = "What network issue are you experiencing? ";
pub const CONFIRM_PROMPT: &str = "May I run diagnostic commands? (Y/N): ";

/// `exit`, `quit` or `q`, any case
pub fn is_exit_command(input: &str) -> bool {
    matches!(
        input.trim().to_lowercase().as_str(),
        "exit" | "quit" | "q"
    )
}

/// Only `y`/`Y` grants permission
pub fn is_confirmation(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("y")
}

/// What a turn did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Message failed the input gate
    Rejected,
    /// Model call failed or is unavailable
    AnalysisFailed,
    /// Analysis shown, nothing runnable
    NoCommands,
    /// User declined to run the commands
    Declined,
    /// Commands were run (some may have failed)
    Executed(usize),
    /// Interrupted before it finished
    Cancelled,
}

pub const CANCELLED_MESSAGE: &str = "Operation cancelled. Type 'exit' to quit.";

pub fn print_banner() {
    println!();
    println!("{}", SEPARATOR.cyan());
    println!("{}", "  Windows Network Troubleshooting Agent".cyan());
    println!("{}", SEPARATOR.cyan());
    println!("Describe your network issue, and I'll help diagnose it.");
    println!("{}", "Type 'exit' to quit.".yellow());
    println!();
}

/// Read one line; None at end of input
async fn read_line<R: AsyncBufRead + Unpin>(
    input: &mut R,
    prompt: &str,
) -> io::Result<Option<String>> {
    print!("{}", prompt.cyan());
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Handle one user message end to end
pub async fn handle_message<R: AsyncBufRead + Unpin>(
    agent: &mut TroubleshootingAgent,
    message: &str,
    input: &mut R,
) -> io::Result<TurnOutcome> {
    let verdict = agent.check_query(message);
    if !verdict.valid {
        display_error("Sorry, I can only help with network-related issues.");
        display_warning(&verdict.reason);
        return Ok(TurnOutcome::Rejected);
    }

    display_info("Analyzing your issue...");
    let analysis = agent.analyze_issue(message).await;
    if let Some(error) = &analysis.error {
        display_error(error);
        return Ok(TurnOutcome::AnalysisFailed);
    }

    println!();
    println!("{}", "Analysis:".green());
    if let Some(text) = &analysis.analysis {
        display_text(text);
    }
    println!();

    let valid: Vec<String> = analysis.valid_commands().map(|c| c.command.clone()).collect();
    if valid.is_empty() {
        display_warning("No valid PowerShell commands found to run for this issue.");
        let rejected = format_rejected_list(&analysis.candidates);
        if !rejected.is_empty() {
            println!("{}", "Invalid commands:".red());
            println!("{}", rejected);
        }
        return Ok(TurnOutcome::NoCommands);
    }

    println!(
        "{}",
        format!(
            "I can run {} PowerShell command(s) to help diagnose this issue:",
            valid.len()
        )
        .green()
    );
    println!("{}", format_command_list(analysis.valid_commands()));
    println!();

    let answer = read_line(input, CONFIRM_PROMPT).await?.unwrap_or_default();
    if !is_confirmation(&answer) {
        display_warning("Commands not executed. Let me know if you want to try something else.");
        return Ok(TurnOutcome::Declined);
    }

    for command in &valid {
        println!();
        println!("{}", format!("Running: {}", command).yellow());
        let report = agent.execute_command(command).await;
        display_report(&report);
    }
    Ok(TurnOutcome::Executed(valid.len()))
}

/// Run one turn unless `interrupt` resolves first. Dropping the turn drops
/// any running command, which kills it.
pub async fn run_turn<R, F>(
    agent: &mut TroubleshootingAgent,
    message: &str,
    input: &mut R,
    interrupt: F,
) -> io::Result<TurnOutcome>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = interrupt => {
            println!();
            display_warning(CANCELLED_MESSAGE);
            Ok(TurnOutcome::Cancelled)
        }
        outcome = handle_message(agent, message, input) => outcome,
    }
}

/// Prompt loop until an exit command or end of input. `interrupt` is called
/// once for the prompt and once for each turn.
pub async fn run_with_input<R, I, F>(
    agent: &mut TroubleshootingAgent,
    input: &mut R,
    interrupt: I,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    I: Fn() -> F,
    F: Future<Output = ()>,
{
    print_banner();
    loop {
        println!();
        let line = tokio::select! {
            biased;
            _ = interrupt() => {
                println!();
                display_warning(CANCELLED_MESSAGE);
                continue;
            }
            line = read_line(input, PROMPT) => line?,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        println!();

        if is_exit_command(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        run_turn(agent, &line, input, interrupt()).await?;
    }
    println!("{}", "Goodbye!".yellow());
    Ok(())
}

/// Resolves on Ctrl-C; never, if the handler cannot be installed
pub async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Interactive loop on stdin
pub async fn run(agent: &mut TroubleshootingAgent) -> io::Result<()> {
    let mut input = tokio::io::BufReader::new(tokio::io::stdin());
    run_with_input(agent, &mut input, ctrl_c).await
}
