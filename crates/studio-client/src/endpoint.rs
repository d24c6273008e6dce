//! Daemon connection URLs.
//!
//! A daemon listens at `ws(s)://<host>:<port>/ws`, optionally guarded by an
//! API key passed as the `key` query parameter. The key is opaque here: it
//! is neither validated nor refreshed.

use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Host a locally launched daemon listens on.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// WebSocket port of the first locally launched daemon.
pub const DEFAULT_WS_PORT: u16 = 9091;

/// Path of the daemon's JSON-RPC socket.
pub const WS_PATH: &str = "/ws";

/// Query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "key";

/// Where one daemon instance can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonEndpoint {
    pub host: String,
    pub port: u16,
    /// `wss` instead of `ws`.
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_path() -> String {
    WS_PATH.to_string()
}

impl DaemonEndpoint {
    /// Plain `ws` endpoint at `host:port/ws` with no key.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            secure: false,
            path: default_path(),
            api_key: None,
        }
    }

    /// A daemon on this machine.
    pub fn local(port: u16) -> Self {
        Self::new(DEFAULT_HOST, port)
    }

    /// Attach an API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Parse a `ws://` or `wss://` URL.
    ///
    /// A URL without a path gets `/ws`; a `key` query parameter becomes the
    /// API key.
    pub fn parse(input: &str) -> ClientResult<Self> {
        let url = parse_ws_url(input)?;
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::InvalidEndpoint(format!("missing host in {input}")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ClientError::InvalidEndpoint(format!("missing port in {input}")))?;
        let api_key = url
            .query_pairs()
            .find(|(name, _)| name == API_KEY_PARAM)
            .map(|(_, value)| value.into_owned());

        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            secure: url.scheme() == "wss",
            path: url.path().to_string(),
            api_key,
        })
    }

    /// Build the connection URL.
    pub fn url(&self) -> ClientResult<Url> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        let mut url = Url::parse(&format!("{scheme}://{host}:{}", self.port))
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {e}", self.host)))?;
        url.set_path(&self.path);
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair(API_KEY_PARAM, key);
        }
        Ok(url)
    }
}

impl Default for DaemonEndpoint {
    fn default() -> Self {
        Self::local(DEFAULT_WS_PORT)
    }
}

impl fmt::Display for DaemonEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.url() {
            Ok(url) => f.write_str(&redact(&url)),
            Err(_) => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// Parse and normalise a daemon URL.
///
/// Only `ws` and `wss` are accepted. An empty path becomes `/ws`.
pub fn parse_ws_url(input: &str) -> ClientResult<Url> {
    let mut url =
        Url::parse(input).map_err(|e| ClientError::InvalidEndpoint(format!("{input}: {e}")))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(ClientError::InvalidEndpoint(format!(
                "unsupported scheme '{other}' in {input}"
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(ClientError::InvalidEndpoint(format!("missing host in {input}")));
    }
    if url.path().is_empty() || url.path() == "/" {
        url.set_path(WS_PATH);
    }
    Ok(url)
}

/// Render a URL for logs with the API key masked.
pub fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(name, _)| name == API_KEY_PARAM) {
        return url.to_string();
    }

    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if name == API_KEY_PARAM {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
