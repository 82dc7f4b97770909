//! Read-only facts about an accepted connection.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::request::Request;

/// Snapshot taken when the handshake completes. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Unique per process.
    pub id: u64,
    /// Peer IP address and port.
    pub client_addr: SocketAddr,
    pub path: String,
    pub host: Option<String>,
    /// `Origin`, or `Sec-WebSocket-Origin` for older clients.
    pub origin: Option<String>,
    /// Subprotocol echoed in the handshake response.
    pub sub_protocol: Option<String>,
    /// Request headers in the order received.
    pub headers: Vec<(String, String)>,
    /// Cookies from the `Cookie` header.
    pub cookies: HashMap<String, String>,
}

impl ConnectionInfo {
    pub(crate) fn from_request(
        id: u64,
        client_addr: SocketAddr,
        request: &Request,
        sub_protocol: Option<String>,
    ) -> Self {
        Self {
            id,
            client_addr,
            path: request.path().to_string(),
            host: request.header("Host").map(str::to_string),
            origin: request
                .header("Origin")
                .or_else(|| request.header("Sec-WebSocket-Origin"))
                .map(str::to_string),
            sub_protocol,
            headers: request.headers().to_vec(),
            cookies: request.header("Cookie").map(parse_cookies).unwrap_or_default(),
        }
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parse `name=value; other=value` pairs. Malformed pairs are skipped.
fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Scheme;

    #[test]
    fn test_from_request() {
        let request = Request::new("GET", "/chat", Scheme::Ws)
            .with_header("Host", "example.com")
            .with_header("Sec-WebSocket-Origin", "http://old.example.com")
            .with_header("Cookie", "session=abc123; theme = dark ;broken; =x");
        let addr: SocketAddr = "10.0.0.1:5555".parse().unwrap();
        let info = ConnectionInfo::from_request(7, addr, &request, Some("chat".into()));

        assert_eq!(info.id, 7);
        assert_eq!(info.client_addr.port(), 5555);
        assert_eq!(info.path, "/chat");
        assert_eq!(info.host.as_deref(), Some("example.com"));
        assert_eq!(info.origin.as_deref(), Some("http://old.example.com"));
        assert_eq!(info.sub_protocol.as_deref(), Some("chat"));
        assert!(info.header("cookie").is_some_and(|c| c.starts_with("session=")));
        assert_eq!(info.cookies.len(), 2);
        assert_eq!(info.cookies["session"], "abc123");
        assert_eq!(info.cookies["theme"], "dark");
    }

    #[test]
    fn test_origin_prefers_origin_header() {
        let request = Request::new("GET", "/", Scheme::Ws)
            .with_header("Sec-WebSocket-Origin", "b")
            .with_header("Origin", "a");
        let info = ConnectionInfo::from_request(1, "127.0.0.1:1".parse().unwrap(), &request, None);
        assert_eq!(info.origin.as_deref(), Some("a"));
        assert!(info.cookies.is_empty());
    }
}
