// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "parley", version, about = "Inspect parley chat session databases")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the session ids stored in a database.
    List {
        /// Path to the session database file.
        #[arg(long)]
        db: PathBuf,
    },
    /// Dump every record of one session.
    Show {
        /// Path to the session database file.
        #[arg(long)]
        db: PathBuf,
        /// Session id to dump.
        #[arg(long)]
        session: String,
        /// Output format.
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// A single pretty-printed JSON array.
    Json,
    /// One JSON object per line.
    Jsonl,
}
