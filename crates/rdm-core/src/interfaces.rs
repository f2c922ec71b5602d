//! Local network interface enumeration for route selection.
//!
//! Lists IPv4, non-loopback interfaces the host can offer to the user as
//! bound-local-interface routes, alongside whatever proxy circuits it
//! constructs itself.

use crate::route::Route;
use anyhow::{Context, Result};
use serde::Serialize;

/// One usable local interface address.
#[derive(Debug, Clone, Serialize)]
pub struct NetInterface {
    pub name: String,
    pub address: String,
}

impl NetInterface {
    /// The route a segment request uses when bound to this interface.
    pub fn to_route(&self) -> Route {
        Route::LocalInterface {
            name: self.name.clone(),
            address: self.address.clone(),
        }
    }
}

/// Enumerate usable local interfaces: IPv4 only, loopback excluded.
pub fn enumerate() -> Result<Vec<NetInterface>> {
    let addrs = if_addrs::get_if_addrs().context("failed to list network interfaces")?;
    let mut out = Vec::new();
    for ifa in addrs {
        if ifa.is_loopback() {
            continue;
        }
        if let if_addrs::IfAddr::V4(v4) = &ifa.addr {
            out.push(NetInterface {
                name: ifa.name.clone(),
                address: v4.ip.to_string(),
            });
        }
    }
    Ok(out)
}
