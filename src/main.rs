// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use anyhow::Context;
use clap::Parser;
use parley_store::{SqliteStore, Store};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, OutputFormat};

fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins when set; otherwise `PARLEY_DEBUG` selects the level
/// (`0`..`3` → error/warn/info/debug, default warn).
fn init_logging() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("PARLEY_DEBUG").ok().as_deref() {
            Some("0") => "error",
            Some("2") => "info",
            Some("3") => "debug",
            _ => "warn",
        };
        EnvFilter::new(level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::List { db } => {
            let store = open(db)?;
            for session in store.list_sessions()? {
                println!("{session}");
            }
            Ok(())
        }
        Commands::Show {
            db,
            session,
            format,
        } => {
            let store = open(db)?;
            let records = store.get_all_records(session)?;
            if records.is_empty() {
                anyhow::bail!("no records for session {session:?}");
            }
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&records)?);
                }
                OutputFormat::Jsonl => {
                    for rec in &records {
                        println!("{}", serde_json::to_string(rec)?);
                    }
                }
            }
            Ok(())
        }
    }
}

fn open(db: &std::path::Path) -> anyhow::Result<SqliteStore> {
    anyhow::ensure!(db.exists(), "database {} does not exist", db.display());
    SqliteStore::open(db).with_context(|| format!("opening {}", db.display()))
}
