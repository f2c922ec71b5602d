//! `rdm interfaces` – list usable local interface routes.

use anyhow::Result;
use rdm_core::interfaces;

pub fn run_interfaces() -> Result<()> {
    let found = interfaces::enumerate()?;
    if found.is_empty() {
        println!("No usable local interfaces (IPv4, non-loopback) found.");
    } else {
        println!("{:<16} ADDRESS", "NAME");
        for ifa in found {
            println!("{:<16} {}", ifa.name, ifa.address);
        }
    }
    Ok(())
}
