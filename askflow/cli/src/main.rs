//! askflow
//!
//! Terminal client for the askflow query service. Each line typed is sent as
//! a question; results, clarifications and insights are printed as they
//! arrive.
//!
//! # Usage
//!
//! ```bash
//! # Against a local service
//! askflow
//!
//! # Against a remote environment
//! askflow --base-url https://ask.example.com --env QA
//!
//! # With verbose logging (written to stderr)
//! RUST_LOG=debug askflow
//! ```
//!
//! # Commands
//!
//! - `/stop`: cancel the question in flight
//! - `/edit <text>`: change the stopped question and resend it
//! - `/viz on|off`: always ask for charts, or only when the question implies one
//! - `/history`: print the conversation history
//! - `/help`: list commands
//! - `/quit`: exit
//!
//! # Files
//!
//! - Config: `$XDG_CONFIG_HOME/askflow/askflow.toml`

mod presenter;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use askflow_core::config::{self, ConfigOverrides};
use askflow_core::{
    ChatResult, ChatSession, EnterAction, HttpQueryBackend, Presenter, TurnOutcome,
};

use crate::presenter::TerminalPresenter;

/// Ask questions about your operations data from the terminal
#[derive(Debug, Parser)]
#[command(name = "askflow", version, about)]
struct Args {
    /// Base URL of the query service
    #[arg(long)]
    base_url: Option<String>,

    /// Environment to query (sent in the environment header)
    #[arg(long = "env")]
    environment: Option<String>,

    /// Name of the environment header
    #[arg(long)]
    env_header: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/askflow/askflow.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ask for charts with every question
    #[arg(long)]
    visualize: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.base_url {
            overrides = overrides.with_base_url(url.clone());
        }
        if let Some(ref environment) = self.environment {
            overrides = overrides.with_environment(environment.clone());
        }
        if let Some(ref header) = self.env_header {
            overrides = overrides.with_environment_header(header.clone());
        }
        if self.visualize {
            overrides = overrides.with_visualize(true);
        }
        overrides
    }
}

/// A line of user input
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ask(String),
    Stop,
    Edit(String),
    Visualize(bool),
    History,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Ask(line.to_string());
        };

        let (name, arg) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(name, arg)| (name, arg.trim()));
        match (name, arg) {
            ("stop", _) => Self::Stop,
            ("edit", text) => Self::Edit(text.to_string()),
            ("viz", "on") => Self::Visualize(true),
            ("viz", "off") => Self::Visualize(false),
            ("history", _) => Self::History,
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

const HELP: &str = "\
Type a question and press Enter.
  /stop          cancel the question in flight
  /edit <text>   change the stopped question and resend it
  /viz on|off    always ask for charts, or only when implied
  /history       print the conversation history
  /quit          exit";

type Session = ChatSession<HttpQueryBackend>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with answers
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("askflow_cli=warn".parse()?)
                .add_directive("askflow_core=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let args = Args::parse();

    let config_path = args.config.clone().or_else(config::default_config_path);
    let mut config = config::load_config_from_path(config_path)
        .context("Failed to load askflow configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid askflow configuration")?;

    info!(
        base_url = %config.base_url,
        environment = ?config.environment,
        source = %config.source(),
        "Configuration loaded"
    );

    let backend = HttpQueryBackend::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create query backend: {e}"))?;
    let presenter: Arc<dyn Presenter> = Arc::new(TerminalPresenter::new());
    let session = Arc::new(ChatSession::new(Arc::new(backend), presenter, &config));

    if !session.backend_healthy().await {
        warn!(base_url = %config.base_url, "Query service is not answering");
        println!("Warning: {} is not answering yet.", config.base_url);
    }
    println!("askflow ready. /help for commands.");

    run(session).await
}

/// Read commands from stdin until `/quit` or end of input
async fn run(session: Arc<Session>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                if session.cancel() {
                    continue;
                }
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Ask(text) => match session.route_enter(false, false) {
                EnterAction::Suppressed => {
                    println!("Still working on the last question. /stop to cancel it.");
                }
                _ => {
                    let s = Arc::clone(&session);
                    spawn_turn(async move { s.submit(&text).await });
                }
            },
            Command::Edit(text) => match session.route_enter(false, true) {
                EnterAction::CommitEdit => {
                    let s = Arc::clone(&session);
                    spawn_turn(async move { s.commit_edit(&text).await });
                }
                EnterAction::Suppressed => {
                    println!("Still working on the last question. /stop to cancel it.");
                }
                _ => println!("Nothing to edit. Stop a question first with /stop."),
            },
            Command::Stop => {
                if !session.cancel() {
                    println!("Nothing to stop.");
                }
            }
            Command::Visualize(enabled) => {
                session.set_visualization(enabled);
                println!("Charts {}.", if enabled { "always on" } else { "on request" });
            }
            Command::History => {
                for turn in session.history() {
                    println!("{}: {}", turn.role, turn.content);
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Unknown(text) => println!("Unknown command {text}. /help for commands."),
        }
    }

    session.cancel();
    Ok(())
}

/// Run a turn in the background so `/stop` stays responsive
fn spawn_turn<F>(turn: F)
where
    F: Future<Output = ChatResult<TurnOutcome>> + Send + 'static,
{
    tokio::spawn(async move {
        match turn.await {
            Ok(TurnOutcome::Completed {
                enrichment: Some(job),
                ..
            }) => {
                let outcome = job.join().await;
                tracing::debug!(?outcome, "Insights finished");
            }
            Ok(outcome) => tracing::debug!(?outcome, "Turn finished"),
            Err(err) if err.is_user_visible() => println!("{err}"),
            Err(err) => warn!(error = %err, "Turn rejected"),
        }
    });
}
