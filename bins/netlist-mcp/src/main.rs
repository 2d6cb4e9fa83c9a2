//! The SPICE model extraction MCP server binary.
//!
//! Extracts `.model` and `.subckt` definitions from the given netlists into
//! a SQLite store, then serves filtered lookups over stdio using the Model
//! Context Protocol.
#![warn(missing_docs)]

mod server;
mod tools;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use modeldb::{Extractor, ModelDb};
use tracing_subscriber::EnvFilter;

use crate::tools::Toolbox;

/// The arguments to the MCP server binary.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Netlist files or directories to extract before serving.
    ///
    /// Directories are scanned recursively for files with conventional SPICE
    /// extensions.
    #[clap(value_parser, value_hint = clap::ValueHint::AnyPath)]
    pub netlists: Vec<PathBuf>,
    /// Path of the SQLite store.
    ///
    /// A transient in-memory store is used when unspecified.
    #[clap(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
    /// Append one line per extraction anomaly to this file.
    #[clap(long, value_name = "PATH")]
    pub log: Option<PathBuf>,
    /// Change to this directory before resolving netlist paths.
    #[clap(short = 'C', long, value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
    pub workdir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Stdout carries protocol frames; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Some(dir) = &args.workdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {dir:?}"))?;
    }

    let db = match &args.db {
        Some(path) => ModelDb::open(path),
        None => ModelDb::open_in_memory(),
    }
    .context("failed to open the model store")?;

    let mut extractor = match &args.log {
        Some(path) => Extractor::with_log_path(db, path),
        None => Ok(Extractor::new(db)),
    }
    .context("failed to open the anomaly log")?;

    let summary = extractor
        .extract_paths(&args.netlists)
        .context("extraction failed")?;
    tracing::info!(
        files = summary.files,
        models = summary.models,
        subcircuits = summary.subcircuits,
        "extraction complete"
    );
    for path in &summary.failed {
        tracing::warn!(?path, "skipped unreadable netlist");
    }

    server::serve(Toolbox::new(extractor.into_db())).await
}
