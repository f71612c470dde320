//! Environment/runtime helpers
//!
//! Resolves the address this instance reports as its provenance in responses.

use tracing::debug;

/// Address of this instance as `host:port`.
///
/// An explicit `configured` value wins. Otherwise the container/host name from
/// `HOSTNAME` is used, falling back to the bind host.
pub fn service_address(configured: Option<&str>, bind_host: &str, port: u16) -> String {
    if let Some(addr) = configured.map(str::trim).filter(|a| !a.is_empty()) {
        return addr.to_string();
    }
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| bind_host.to_string());
    let addr = format!("{host}:{port}");
    debug!(%addr, "resolved service address");
    addr
}
