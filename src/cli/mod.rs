//! CLI command definitions for task-sync
//!
//! This module defines the CLI structure using clap's derive macros.

pub mod shell;

use clap::{Parser, Subcommand};

/// Realtime task list sync engine and HTTP task API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (replaces the project and user tiers)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Port for the HTTP API (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Serve the HTTP task API (default if no subcommand given)
    Serve,

    /// Interactive terminal client for the realtime engine
    Shell,
}
