//! `rdm probe` – size a URL before committing to a download.

use anyhow::Result;
use rdm_core::config::RdmConfig;
use rdm_core::probe;

pub fn run_probe(cfg: &RdmConfig, url: &str) -> Result<()> {
    let result = probe::probe(url, &cfg.user_agent, cfg.connect_timeout())?;
    match result.content_length {
        Some(len) => println!("content-length: {len}"),
        None => println!("content-length: unknown"),
    }
    println!(
        "byte ranges:    {}",
        if result.accept_ranges {
            "advertised"
        } else {
            "not advertised"
        }
    );
    Ok(())
}
