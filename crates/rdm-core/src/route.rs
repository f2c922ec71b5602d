//! Route identity: a bound local interface or a SOCKS proxy circuit.

use serde::Serialize;
use std::fmt;

/// A network path one segment attempt travels over. The variant decides both
/// the transport built per attempt and the failure policy: local-interface
/// routes are re-tried, proxy circuits are retired on hard failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    /// Outgoing socket bound to a local interface address.
    LocalInterface { name: String, address: String },
    /// Tunneled through a SOCKS endpoint at host:port.
    SocksProxy { host: String, port: u16 },
}

impl Route {
    /// Stable key for the rate table and the idle/dead sets.
    pub fn id(&self) -> String {
        match self {
            Route::LocalInterface { address, .. } => format!("if:{address}"),
            Route::SocksProxy { host, port } => format!("socks:{host}:{port}"),
        }
    }

    /// Local-interface routes are assumed inherently reliable: on transport
    /// failure they go back into circulation instead of the dead set.
    pub fn is_local(&self) -> bool {
        matches!(self, Route::LocalInterface { .. })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::LocalInterface { name, address } => write!(f, "{name} ({address})"),
            Route::SocksProxy { host, port } => write!(f, "socks {host}:{port}"),
        }
    }
}
