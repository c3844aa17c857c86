//! Wayfinder CLI - conversational road-trip planning
//!
//! This binary serves the HTTP API or runs a single search or chat turn
//! from the command line.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use wayfinder_agent::{EventSink, StreamEvent};
use wayfinder_core::config::Config;
use wayfinder_discovery::{SearchRequest, SearchResponse};
use wayfinder_server::AppState;

#[derive(Parser)]
#[command(name = "wayfinder")]
#[command(about = "Conversational road-trip discovery")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Search for cities to visit
    Search {
        /// What you're looking for, e.g. "quiet beach towns"
        query: String,
        /// Force an intent instead of classifying the query
        #[arg(long)]
        intent: Option<String>,
        /// Region or country to stay within
        #[arg(long)]
        region: Option<String>,
        /// Only places within a short drive of this city
        #[arg(long)]
        near: Option<String>,
        /// Number of results
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Send one message to the assistant
    Chat {
        message: String,
        /// Session id; a new one is generated when omitted
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Serve) => serve(cli.config.as_deref()).await,
        Some(Commands::Search {
            query,
            intent,
            region,
            near,
            max_results,
            json,
        }) => {
            let request = SearchRequest {
                query,
                intent,
                region,
                near_city: near,
                exclude_cities: Vec::new(),
                max_results,
            };
            search(cli.config.as_deref(), &request, json).await
        }
        Some(Commands::Chat { message, session }) => {
            chat(cli.config.as_deref(), &message, session).await
        }
        None => {
            println!("Run 'wayfinder serve' to start the API, or --help for more options");
            Ok(())
        }
    }
}

/// Initialize logging system
///
/// Logs go to stderr so search and chat output stays clean on stdout.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "wayfinder={level},wayfinder_core={level},wayfinder_llm={level},\
             wayfinder_discovery={level},wayfinder_agent={level},wayfinder_server={level},\
             tower_http={level}"
        ))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    debug!(provider = %config.llm.provider, "Configuration loaded");
    Ok(config)
}

/// Start the HTTP API server
async fn serve(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    info!(
        "Starting wayfinder API on {}:{}",
        config.server.host, config.server.port
    );
    wayfinder_server::run_server(config)
        .await
        .context("Server failed")
}

async fn search(config_path: Option<&Path>, request: &SearchRequest, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let state = AppState::from_config(&config)?;
    let response = state
        .conversation
        .discovery()
        .search(request)
        .await
        .context("Search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_search(&response);
    }
    Ok(())
}

fn print_search(response: &SearchResponse) {
    println!("{}", response.narrative);
    println!(
        "(intent: {}, confidence {:.2}{})",
        response.intent.name,
        response.confidence,
        if response.cached { ", cached" } else { "" }
    );
    for (i, result) in response.cities.iter().enumerate() {
        let city = &result.city;
        println!(
            "{:>2}. {}, {}  [{:.2}]",
            i + 1,
            city.name,
            city.country,
            result.fused_score
        );
        for reason in &result.reasons {
            println!("      - {reason}");
        }
    }
}

async fn chat(config_path: Option<&Path>, message: &str, session: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let state = AppState::from_config(&config)?;
    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(session = %session_id, "Starting chat turn");

    let (sink, mut rx) = EventSink::channel(config.agent.event_buffer);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let result = state
        .conversation
        .handle_message(&session_id, message, sink)
        .await;
    // the sink is gone once the turn returns, so the printer drains and exits
    printer.await.context("Event printer failed")?;

    let reply = result.context("Chat turn failed")?;
    if !reply.route.is_empty() {
        println!("\nRoute: {}", reply.route.names().join(" → "));
    }
    eprintln!("(session {session_id})");
    Ok(())
}

fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::Thinking { iteration } => debug!(iteration, "thinking"),
        StreamEvent::Text { text } => println!("{text}"),
        StreamEvent::ToolStart { name, input, .. } => eprintln!("  → {name} {input}"),
        StreamEvent::ToolComplete { name, is_error, .. } => {
            if *is_error {
                eprintln!("  ✗ {name} failed");
            }
        }
        StreamEvent::RouteAction { change, .. } => eprintln!("  route: {}", change.kind()),
        StreamEvent::Complete { suggestion, .. } => {
            if let Some(message) = suggestion.as_ref().and_then(|s| s.message.as_deref()) {
                println!("\nTip: {message}");
            }
        }
        StreamEvent::Error { message } => eprintln!("{message}"),
    }
}
