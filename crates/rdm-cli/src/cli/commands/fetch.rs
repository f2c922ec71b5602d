//! `rdm fetch` – download a file over multiple routes.
//!
//! The command is the engine's host: it builds one segment request per
//! route, starts the download, polls status once per second for rendering,
//! and waits for the terminal event.

use anyhow::{bail, ensure, Context, Result};
use clap::Args;
use rdm_core::checksum;
use rdm_core::config::RdmConfig;
use rdm_core::engine::{Engine, EngineEvent, FailureReason, SegmentRequest, SegmentSnapshot};
use rdm_core::filename;
use rdm_core::interfaces;
use rdm_core::route::Route;
use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Direct HTTP/HTTPS URL to download.
    pub url: String,

    /// Output path (defaults to a name derived from the URL).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Bind a segment to this local interface address (repeatable).
    #[arg(long = "interface", value_name = "ADDR")]
    pub interfaces: Vec<String>,

    /// Tunnel a segment through this SOCKS endpoint (repeatable).
    #[arg(long = "proxy", value_name = "HOST:PORT")]
    pub proxies: Vec<String>,

    /// Percentage share per route, in route order (defaults to an even split).
    #[arg(long = "share", value_name = "PCT")]
    pub shares: Vec<f64>,

    /// Verify the final file against this SHA-256 hex digest.
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Print status lines as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

pub fn run_fetch(cfg: &RdmConfig, args: &FetchArgs) -> Result<()> {
    let routes = build_routes(&args.interfaces, &args.proxies)?;
    ensure!(
        !routes.is_empty(),
        "no usable routes: pass --interface/--proxy, or connect a non-loopback interface"
    );
    let shares = resolve_shares(&args.shares, routes.len())?;

    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(filename::default_output_name(&args.url)));

    let requests: Vec<SegmentRequest> = routes
        .into_iter()
        .zip(shares)
        .map(|(route, share)| SegmentRequest {
            url: args.url.clone(),
            route,
            share,
        })
        .collect();

    println!(
        "fetching {} -> {} over {} route(s)",
        args.url,
        destination.display(),
        requests.len()
    );

    let (engine, events) = Engine::new(cfg.clone());
    ensure!(
        engine.start(requests, &destination),
        "could not start download (sizing probe failed or shares are invalid)"
    );

    loop {
        match events.recv_timeout(Duration::from_secs(1)) {
            Ok(EngineEvent::Completed) => {
                println!("completed: {}", destination.display());
                break;
            }
            Ok(EngineEvent::Failed(FailureReason::Stopped)) => {
                println!("stopped; partial files removed");
                return Ok(());
            }
            Ok(EngineEvent::Failed(reason)) => bail!("download failed ({reason})"),
            Err(RecvTimeoutError::Timeout) => render_status(&engine.status(), args.json)?,
            Err(RecvTimeoutError::Disconnected) => bail!("engine event channel closed"),
        }
    }

    if let Some(expected) = &args.sha256 {
        if checksum::verify_sha256(&destination, expected)? {
            println!("sha256 ok");
        } else {
            bail!(
                "sha256 mismatch for {} (expected {})",
                destination.display(),
                expected
            );
        }
    }

    Ok(())
}

fn render_status(status: &[SegmentSnapshot], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(status)?);
        return Ok(());
    }
    for s in status {
        let mut flags = String::new();
        if s.worst_connection {
            flags.push_str(" [worst]");
        }
        if s.shifted {
            flags.push_str(" [shifted]");
        }
        println!(
            "  #{} {:>3}% {:>12} / {:<12} {:>12}/s  {}{}",
            s.index,
            s.progress,
            human_bytes(s.downloaded_bytes),
            human_bytes(s.total_bytes),
            human_bytes(s.speed),
            s.route,
            flags
        );
    }
    Ok(())
}

fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Routes in CLI order: interfaces first, then proxies. With no explicit
/// route arguments, every usable local interface is used.
fn build_routes(interface_addrs: &[String], proxies: &[String]) -> Result<Vec<Route>> {
    let known = interfaces::enumerate()?;
    let mut routes = Vec::new();
    if interface_addrs.is_empty() && proxies.is_empty() {
        routes.extend(known.iter().map(|i| i.to_route()));
        return Ok(routes);
    }
    for addr in interface_addrs {
        let name = known
            .iter()
            .find(|i| &i.address == addr)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| addr.clone());
        routes.push(Route::LocalInterface {
            name,
            address: addr.clone(),
        });
    }
    for spec in proxies {
        routes.push(parse_proxy(spec)?);
    }
    Ok(routes)
}

fn parse_proxy(spec: &str) -> Result<Route> {
    let (host, port) = spec
        .rsplit_once(':')
        .with_context(|| format!("invalid proxy '{spec}', expected HOST:PORT"))?;
    ensure!(!host.is_empty(), "invalid proxy '{spec}', empty host");
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid proxy port in '{spec}'"))?;
    Ok(Route::SocksProxy {
        host: host.to_string(),
        port,
    })
}

fn resolve_shares(shares: &[f64], route_count: usize) -> Result<Vec<f64>> {
    if shares.is_empty() {
        return Ok(vec![100.0 / route_count as f64; route_count]);
    }
    ensure!(
        shares.len() == route_count,
        "{} share(s) given for {} route(s)",
        shares.len(),
        route_count
    );
    Ok(shares.to_vec())
}
