//! netdocctl - guarded Windows network troubleshooting assistant

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netdoc_common::config::NetdocConfig;
use netdoc_common::sanitizer::sanitize;
use netdocctl::errors::{verdict_exit_code, EXIT_CONFIG_ERROR, EXIT_IO_ERROR, EXIT_SUCCESS};
use netdocctl::output::{
    display_error, display_info, display_success, display_verdict, display_warning,
    format_catalog,
};
use netdocctl::session::{build_session, Session};
use netdocctl::{logging, repl};
use std::io::{Read, Write};
use std::path::PathBuf;

const VERSION: &str = env!("NETDOC_VERSION");

#[derive(Parser)]
#[command(name = "netdocctl")]
#[command(about = "Windows network troubleshooting assistant", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/netdoc/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overrides NETDOC_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive troubleshooting session (default)
    Chat,

    /// Validate a PowerShell command line without running it
    Check {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Check whether a message would be accepted
    Classify {
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// List the diagnostic commands the assistant may run
    Catalog {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write the active catalog to a JSON knowledge-base file
    ExportCatalog { path: PathBuf },

    /// Sanitize stdin to stdout
    Sanitize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be read before the API key lookup
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let config = match NetdocConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            display_error(&e.to_string());
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let code = match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config).await?,
        Commands::Check { command } => {
            let session = offline_session(&config);
            let line = command.join(" ");
            let verdict = session.agent.check_command(&line);
            display_verdict(&line, &verdict);
            verdict_exit_code(verdict.valid)
        }
        Commands::Classify { text } => {
            let session = offline_session(&config);
            let message = text.join(" ");
            let verdict = session.agent.check_query(&message);
            display_verdict(&message, &verdict);
            verdict_exit_code(verdict.valid)
        }
        Commands::Catalog { json } => {
            let session = offline_session(&config);
            let catalog = session.agent.catalog();
            if json {
                let rendered = serde_json::to_string_pretty(catalog.entries())
                    .context("Failed to serialize catalog")?;
                println!("{}", rendered);
            } else {
                println!("{}", format_catalog(catalog));
            }
            EXIT_SUCCESS
        }
        Commands::ExportCatalog { path } => {
            let session = offline_session(&config);
            match session.agent.catalog().save_to_file(&path) {
                Ok(()) => {
                    display_success(&format!(
                        "Wrote {} commands to {}",
                        session.agent.catalog().len(),
                        path.display()
                    ));
                    EXIT_SUCCESS
                }
                Err(e) => {
                    display_error(&e.to_string());
                    EXIT_IO_ERROR
                }
            }
        }
        Commands::Sanitize => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            let mut stdout = std::io::stdout();
            stdout
                .write_all(sanitize(&text).as_bytes())
                .context("Failed to write stdout")?;
            stdout.flush()?;
            EXIT_SUCCESS
        }
    };

    std::process::exit(code);
}

fn show_warnings(session: &Session) {
    for warning in &session.warnings {
        display_warning(warning);
    }
}

fn offline_session(config: &NetdocConfig) -> Session {
    let session = build_session(config, false);
    show_warnings(&session);
    session
}

async fn run_chat(config: &NetdocConfig) -> Result<i32> {
    if !cfg!(windows) {
        display_warning("This tool is designed for Windows systems.");
        display_warning("Some functionality may not work on non-Windows systems.");
    }

    display_info("Initializing agent...");
    let mut session = build_session(config, true);
    show_warnings(&session);
    if let Some(path) = &session.audit_path {
        display_info(&format!("Audit log: {}", path.display()));
    }

    session.agent.initialize().await;
    let result = repl::run(&mut session.agent).await;
    session.agent.finish();
    result.context("Interactive session failed")?;
    Ok(EXIT_SUCCESS)
}
