// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Etikett — label printer bridge
//
// Entry point. Initialises logging, loads the bridge config, and runs one
// printer operation (or the printer simulator) from the command line.
// Results are printed to stdout as the JSON a host runtime would receive.

mod simulator;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info};

use etikett_bridge::LabelPrinterModule;
use etikett_core::config::{self, BridgeConfig};
use etikett_core::error::{EtikettError, Result};
use etikett_core::human_errors::humanize_error;

use simulator::Simulator;

#[derive(Parser)]
#[command(name = "etikett")]
#[command(about = "Print, find, and check network label printers", version)]
struct Cli {
    /// Config file to use instead of <data dir>/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print an image on a label printer
    Print {
        /// Printer address (ip, ip:port, or hostname)
        address: String,
        /// Image path, file:// URL, or content:// locator
        image: String,
        /// Printer model, e.g. QL_820NWB
        #[arg(long)]
        model: Option<String>,
        /// Label size, e.g. DieCutW17H54
        #[arg(long)]
        label: Option<String>,
        /// Directory that content:// locators are served from
        #[arg(long)]
        content_root: Option<PathBuf>,
    },
    /// Search the local network for printers
    Discover {
        /// Search duration in seconds
        #[arg(long)]
        timeout: Option<u32>,
    },
    /// Check whether a printer accepts connections (exit 1 if not)
    Ping {
        /// Printer address
        address: String,
    },
    /// Run a raw-port printer simulator that captures what it receives
    Simulate {
        #[arg(long, default_value_t = 9100)]
        port: u16,
        /// Where capture files are written
        #[arg(long, default_value = "printer-captures")]
        captures: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Etikett starting");

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load config");
            return ExitCode::from(2);
        }
    };

    let outcome = match cli.command {
        Command::Simulate { port, captures } => {
            return match run_simulator(port, captures).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "simulator stopped");
                    ExitCode::FAILURE
                }
            };
        }
        Command::Print {
            address,
            image,
            model,
            label,
            content_root,
        } => {
            let module = build_module(config, content_root);
            to_json(
                module
                    .print_image(&address, &image, model.as_deref(), label.as_deref())
                    .await,
            )
        }
        Command::Discover { timeout } => {
            let module = build_module(config, None);
            to_json(module.discover_printers(timeout).await)
        }
        Command::Ping { address } => {
            let module = build_module(config, None);
            to_json(module.ping_printer(&address).await)
        }
    };

    report(outcome)
}

fn load_config(path: Option<&std::path::Path>) -> Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::load(path),
        None => Ok(BridgeConfig::load_or_default(&config::data_dir())),
    }
}

fn build_module(config: BridgeConfig, content_root: Option<PathBuf>) -> LabelPrinterModule {
    etikett_bridge::label_printer_module(config, content_root, tokio::runtime::Handle::current())
}

fn to_json<T: serde::Serialize>(result: Result<T>) -> Result<Value> {
    result.and_then(|value| serde_json::to_value(value).map_err(EtikettError::from))
}

/// Print the payload or the error and pick the exit code.
fn report(outcome: Result<Value>) -> ExitCode {
    match outcome {
        Ok(value) => {
            match serde_json::to_string_pretty(&value) {
                Ok(text) => println!("{text}"),
                Err(e) => error!(error = %e, "failed to render result"),
            }
            if value.get("available") == Some(&Value::Bool(false)) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprint!("{}", render_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// The error kind and message, then the plain-language advice for staff.
fn render_error(err: &EtikettError) -> String {
    let human = humanize_error(err);
    let retry = if human.retriable {
        "trying again may work"
    } else {
        "trying again will not help"
    };
    format!(
        "{}: {err}\n  {}\n  {}\n  ({}, {retry})\n",
        err.kind(),
        human.message,
        human.suggestion,
        human.severity.as_str(),
    )
}

async fn run_simulator(port: u16, captures: PathBuf) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    let sim = Simulator::new(captures);
    tokio::select! {
        result = sim.serve(listener) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("simulator shutting down");
            Ok(())
        }
    }
}
