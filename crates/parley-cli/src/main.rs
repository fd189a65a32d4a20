//! # parley
//!
//! Interactive loop over [`TurnDriver`]: reads a line, runs one turn, prints
//! the reply and any reflection summary.

#![deny(unsafe_code)]

mod provider;

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parley_agent::{CalculatorTool, ChatModel, TurnDriver, TurnOutcome};
use parley_settings::{ParleySettings, get_settings, init_settings, load_settings_from_path, settings_path};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::provider::{API_KEY_ENV, EchoModel, HttpChatModel};

/// Interactive Parley agent.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "Interactive Parley agent")]
struct Cli {
    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Answer locally instead of calling the configured model.
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings.unwrap_or_else(settings_path);
    let loaded = load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    if init_settings(loaded).is_err() {
        warn!("settings were already initialized");
    }
    let settings = get_settings();
    parley_core::logging::init_subscriber(&settings.logging.level);

    let mut driver = build_driver(settings, cli.offline, std::env::var(API_KEY_ENV).ok());
    repl(&mut driver).await
}

/// Pick the model and register tools. Tools are only offered to a real model;
/// the echo model cannot plan.
fn build_driver(settings: &ParleySettings, offline: bool, api_key: Option<String>) -> TurnDriver {
    let api_key = api_key.filter(|k| !k.trim().is_empty());
    let (model, online): (Arc<dyn ChatModel>, bool) = match api_key {
        Some(key) if !offline => (Arc::new(HttpChatModel::new(&settings.llm, key)), true),
        _ => {
            if !offline {
                warn!("{API_KEY_ENV} is not set, running offline");
            }
            (Arc::new(EchoModel), false)
        }
    };
    info!(model = model.model(), online, "parley ready");

    let driver = TurnDriver::new(model, settings);
    if online {
        driver.with_tool(Arc::new(CalculatorTool))
    } else {
        driver
    }
}

async fn repl(driver: &mut TurnDriver) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("User: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        match driver.run_turn(input).await {
            Ok(outcome) => println!("{}", render(&outcome)),
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

fn render(outcome: &TurnOutcome) -> String {
    let mut out = match &outcome.tool {
        Some(name) => {
            let prefix = format!("Tool {name} result: ");
            let result = outcome.reply.strip_prefix(&prefix).unwrap_or(&outcome.reply);
            format!("Agent (tool result): {result}")
        }
        None => format!("Agent: {}", outcome.reply),
    };
    if let Some(summary) = &outcome.reflection {
        out.push_str("\n\n--- Reflection Summary ---\n");
        out.push_str(summary);
        out.push('\n');
    }
    out
}
