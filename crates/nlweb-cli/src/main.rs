//! # nlweb-ask
//!
//! Command-line host for the streaming query engine: asks one query, or
//! reads queries from stdin in interactive mode, and renders the streamed
//! answer in the terminal.

#![deny(unsafe_code)]

mod render;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use nlweb_core::GenerateMode;
use nlweb_core::logging::init_subscriber;
use nlweb_settings::ClientSettings;
use nlweb_stream::{
    ChatClient, ClientCommand, HttpTransport, RecordingRenderer, Renderer, SessionOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::render::TerminalRenderer;

/// Stream answers from an NLWeb endpoint.
#[derive(Parser, Debug)]
#[command(name = "nlweb-ask", about = "Stream answers from an NLWeb endpoint")]
struct Cli {
    /// Query to ask (omit with --interactive).
    query: Option<String>,

    /// Streaming endpoint URL (overrides settings).
    #[arg(long)]
    endpoint: Option<String>,

    /// Restrict the search to one site.
    #[arg(long)]
    site: Option<String>,

    /// Answer shape: list, summarize, or generate.
    #[arg(long)]
    mode: Option<GenerateMode>,

    /// Page URL sent as query context.
    #[arg(long)]
    context_url: Option<String>,

    /// Earlier turns as a JSON array of strings.
    #[arg(long)]
    prev: Option<String>,

    /// Reconnect attempts before giving up.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Log filter directive (`RUST_LOG` takes precedence).
    #[arg(long)]
    log_level: Option<String>,

    /// Settings file (default: ~/.nlweb/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print the final round as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Read queries from stdin; each line pre-empts the running one.
    #[arg(short, long)]
    interactive: bool,
}

impl Cli {
    /// Layer command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut ClientSettings) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            settings.endpoint.clone_from(endpoint);
        }
        if let Some(site) = &self.site {
            settings.site = Some(site.clone()).filter(|s| !s.is_empty());
        }
        if let Some(mode) = self.mode {
            settings.generate_mode = mode;
        }
        if let Some(url) = &self.context_url {
            settings.context_url = Some(url.clone());
        }
        if let Some(max_retries) = self.max_retries {
            settings.retry.max_retries = max_retries;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        settings.validate().context("invalid settings")?;
        Ok(())
    }

    fn prior_turns(&self) -> Result<Vec<String>> {
        match &self.prev {
            Some(raw) => serde_json::from_str(raw).context("--prev must be a JSON array of strings"),
            None => Ok(Vec::new()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(nlweb_settings::settings_path);
    let mut settings = nlweb_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings)?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    let prior_turns = cli.prior_turns()?;
    let transport = Arc::new(HttpTransport::new().context("Failed to build HTTP client")?);
    let client = ChatClient::new(settings, transport).with_prior_turns(prior_turns);

    if cli.interactive {
        run_interactive(client).await;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(query) = cli.query.as_deref() else {
        bail!("a query is required unless --interactive is set");
    };
    let outcome = if cli.json {
        ask_json(client, query).await?
    } else {
        let mut renderer = TerminalRenderer::new(std::io::stdout());
        ask_once(client, query, &mut renderer).await?
    };

    Ok(match outcome {
        SessionOutcome::Completed { .. } => ExitCode::SUCCESS,
        SessionOutcome::Cancelled => ExitCode::from(130),
        SessionOutcome::Failed { .. } => ExitCode::FAILURE,
    })
}

/// Ask one query, cancelling cleanly on Ctrl-C.
async fn ask_once(
    mut client: ChatClient,
    query: &str,
    renderer: &mut dyn Renderer,
) -> Result<SessionOutcome> {
    tokio::select! {
        outcome = client.ask(query, renderer) => outcome.context("Query failed"),
        _ = tokio::signal::ctrl_c() => {
            let _ = client.cancel_active(renderer);
            Ok(SessionOutcome::Cancelled)
        }
    }
}

/// Ask one query and print the final presented view as JSON.
async fn ask_json(client: ChatClient, query: &str) -> Result<SessionOutcome> {
    let mut recorder = RecordingRenderer::new();
    let outcome = ask_once(client, query, &mut recorder).await?;
    let report = serde_json::json!({
        "outcome": outcome,
        "results": recorder.last_view().unwrap_or_default(),
    });
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report).context("Failed to write JSON")?;
    writeln!(stdout)?;
    Ok(outcome)
}

/// Feed stdin lines to the client until EOF, `/quit`, or Ctrl-C.
///
/// `/cancel` stops the running query and `/clear` forgets the conversation.
async fn run_interactive(mut client: ChatClient) {
    let (commands, rx) = mpsc::channel(16);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let command = match line.trim() {
                "" => continue,
                "/quit" => break,
                "/cancel" => ClientCommand::Cancel,
                "/clear" => ClientCommand::ClearHistory,
                query => ClientCommand::Ask(query.to_owned()),
            };
            if commands.send(command).await.is_err() {
                break;
            }
        }
    });

    let mut renderer = TerminalRenderer::new(std::io::stdout());
    tokio::select! {
        () = client.run(rx, &mut renderer) => {}
        _ = tokio::signal::ctrl_c() => {
            let _ = client.cancel_active(&mut renderer);
        }
    }
    reader.abort();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
