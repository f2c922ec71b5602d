//! Per-attempt transport selection.
//!
//! A bound-local-interface route pins the outgoing socket's local address
//! (`CURLOPT_INTERFACE`); a proxy-circuit route tunnels through a SOCKS
//! endpoint. `socks5h` so hostname resolution happens on the proxy side,
//! which keeps DNS on the circuit.

use crate::route::Route;
use curl::easy::Easy;

pub(crate) fn apply(easy: &mut Easy, route: &Route) -> Result<(), curl::Error> {
    match route {
        Route::LocalInterface { address, .. } => easy.interface(address),
        Route::SocksProxy { host, port } => easy.proxy(&format!("socks5h://{host}:{port}")),
    }
}
