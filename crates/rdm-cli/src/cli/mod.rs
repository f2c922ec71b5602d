//! CLI for the RDM route-diverse downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rdm_core::config;
use std::path::Path;

use commands::{run_checksum, run_fetch, run_interfaces, run_probe, FetchArgs};

/// Top-level CLI for the RDM downloader.
#[derive(Debug, Parser)]
#[command(name = "rdm")]
#[command(about = "RDM: adaptive multi-route segmented downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a file over multiple routes, one segment per route.
    Fetch(FetchArgs),

    /// List usable local network interfaces (IPv4, loopback excluded).
    Interfaces,

    /// Probe a URL for its content length and range support.
    Probe {
        /// Direct HTTP/HTTPS URL to probe.
        url: String,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch(args) => run_fetch(&cfg, &args)?,
            CliCommand::Interfaces => run_interfaces()?,
            CliCommand::Probe { url } => run_probe(&cfg, &url)?,
            CliCommand::Checksum { path } => run_checksum(Path::new(&path))?,
        }

        Ok(())
    }
}
