//! Remote address parsing.
//!
//! Node addresses show up as `tcp://host:port`, bare `host:port`, or full
//! `http(s)://` / `ws(s)://` URLs. Both transports accept any of them.
//! Unix domain sockets are not supported.

use crate::error::TransportError;

/// Default WebSocket endpoint path on a node.
pub const DEFAULT_WS_ENDPOINT: &str = "/websocket";

fn split_remote(remote: &str) -> Result<(&str, &str), TransportError> {
    let (scheme, rest) = match remote.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("tcp", remote),
    };
    if scheme == "unix" {
        return Err(invalid(remote, "unix sockets are not supported, use a tcp address"));
    }
    if rest.is_empty() || rest.starts_with('/') {
        return Err(invalid(remote, "missing host"));
    }
    Ok((scheme, rest))
}

fn invalid(remote: &str, reason: &str) -> TransportError {
    TransportError::InvalidAddress {
        addr: remote.to_string(),
        reason: reason.to_string(),
    }
}

/// URL for the HTTP transport. TLS is kept when the scheme asks for it.
pub fn http_url(remote: &str) -> Result<String, TransportError> {
    let (scheme, rest) = split_remote(remote)?;
    let scheme = match scheme {
        "http" | "ws" | "tcp" => "http",
        "https" | "wss" => "https",
        other => return Err(invalid(remote, &format!("unsupported scheme {other}"))),
    };
    Ok(format!("{scheme}://{rest}"))
}

/// URL for the WebSocket transport, with `endpoint` appended unless the
/// address already carries a path.
pub fn ws_url(remote: &str, endpoint: &str) -> Result<String, TransportError> {
    let (scheme, rest) = split_remote(remote)?;
    let scheme = match scheme {
        "http" | "ws" | "tcp" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(remote, &format!("unsupported scheme {other}"))),
    };
    if rest.contains('/') {
        return Ok(format!("{scheme}://{rest}"));
    }
    let endpoint = if endpoint.starts_with('/') || endpoint.is_empty() {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    };
    Ok(format!("{scheme}://{rest}{endpoint}"))
}
