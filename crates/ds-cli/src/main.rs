//! `ds`: scan document snapshots and apply fix actions from the command line.
//!
//! Loads a JSON document snapshot into an in-memory host, then runs one
//! session operation against it and prints the outcome as JSON.

use clap::{Parser, Subcommand};
use ds_core::parse_snapshot;
use ds_core::record::encode_records;
use ds_engine::{EngineConfig, FixAction, FixReport, MemoryHost, Session, extract_planned_actions};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "ds")]
#[command(about = "Scan design documents and apply corrective style fixes")]
#[command(version)]
struct Cli {
    /// Engine configuration (JSON). Missing keys keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the element records of a document.
    Scan {
        document: PathBuf,
        /// Write MessagePack instead of JSON.
        #[arg(long)]
        msgpack: bool,
    },
    /// Locate an element and describe where it is.
    Describe { document: PathBuf, element_id: String },
    /// Apply fix actions: a JSON array of actions or a fix-planning response.
    Fix {
        document: PathBuf,
        actions: PathBuf,
        /// Also print the records after fixing.
        #[arg(long)]
        rescan: bool,
    },
    /// Print a record set on start and on every change, until interrupted.
    Watch { document: PathBuf },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("ds: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Scan { document, msgpack } => {
            let session = open(&document, config)?;
            let records = session.scan().await;
            if msgpack {
                std::io::stdout().write_all(&encode_records(&records)?)?;
            } else {
                print_json(&records)?;
            }
        }
        Command::Describe {
            document,
            element_id,
        } => {
            let session = open(&document, config)?;
            print_json(&session.resolve_and_describe(&element_id).await)?;
        }
        Command::Fix {
            document,
            actions,
            rescan,
        } => {
            let session = open(&document, config)?;
            let actions = read_actions(&actions)?;
            let report = FixReport::from_results(session.apply_bulk_fixes(actions).await);
            log::info!(
                "{} fixed, {} failed, {} skipped",
                report.fixed,
                report.failed,
                report.skipped
            );
            print_json(&report)?;
            if rescan {
                print_json(&session.scan().await)?;
            }
        }
        Command::Watch { document } => {
            let session = open(&document, config)?;
            let mut rx = session.subscribe();
            session.start_watching().await;
            loop {
                tokio::select! {
                    pushed = rx.recv() => match pushed {
                        Ok(records) => print_json(&*records)?,
                        Err(RecvError::Lagged(missed)) => log::warn!("watch: skipped {missed} pushes"),
                        Err(RecvError::Closed) => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            session.stop_watching();
        }
    }
    Ok(())
}

fn open(path: &Path, config: EngineConfig) -> CliResult<Session<MemoryHost>> {
    let graph = parse_snapshot(&std::fs::read_to_string(path)?)?;
    Ok(Session::new(Arc::new(MemoryHost::new(graph)), config))
}

fn read_actions(path: &Path) -> CliResult<Vec<FixAction>> {
    let value: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    if value.is_array() {
        return Ok(serde_json::from_value(value)?);
    }
    Ok(extract_planned_actions(&value)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
