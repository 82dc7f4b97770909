//! The opening HTTP request and the parser that produces it.

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::select_variant;

/// Transport scheme a listener serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scheme {
    /// Plain `ws://`.
    #[default]
    Ws,
    /// TLS `wss://`.
    Wss,
}

impl Scheme {
    /// Parse a URL scheme name. Case-insensitive.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("ws") {
            Some(Scheme::Ws)
        } else if name.eq_ignore_ascii_case("wss") {
            Some(Scheme::Wss)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed opening handshake request.
///
/// Header names keep their original spelling and order; lookups ignore case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    path: String,
    scheme: Scheme,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>, scheme: Scheme) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            scheme,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the bytes that followed the header block.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// First value of the named header, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// All headers in the order received.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Bytes received after the blank line ending the header block.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Turns buffered handshake bytes into a [`Request`].
///
/// The connection calls `parse` with everything received so far each time
/// more bytes arrive, until it returns `Some`.
pub trait RequestParser: Send + Sync {
    /// Parse the accumulated bytes.
    ///
    /// Returns `Ok(None)` while the request is incomplete.
    ///
    /// # Errors
    ///
    /// Only for data that can never become a valid request.
    fn parse(&self, data: &[u8], scheme: Scheme) -> Result<Option<Request>>;
}

impl<F> RequestParser for F
where
    F: Fn(&[u8], Scheme) -> Result<Option<Request>> + Send + Sync,
{
    fn parse(&self, data: &[u8], scheme: Scheme) -> Result<Option<Request>> {
        self(data, scheme)
    }
}

/// The default HTTP/1.1 request parser.
///
/// Any method is accepted here; the negotiators insist on `GET`, so a
/// `HEAD` to the availability path still counts as a health check.
#[derive(Debug, Clone)]
pub struct HttpRequestParser {
    limits: Limits,
}

impl HttpRequestParser {
    /// Create a parser that rejects header blocks larger than
    /// `limits.max_handshake_size`.
    #[must_use]
    pub const fn new(limits: Limits) -> Self {
        Self { limits }
    }
}

impl Default for HttpRequestParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl RequestParser for HttpRequestParser {
    fn parse(&self, data: &[u8], scheme: Scheme) -> Result<Option<Request>> {
        let Some(end) = find_header_end(data) else {
            self.limits.check_handshake_size(data.len())?;
            return Ok(None);
        };
        self.limits.check_handshake_size(end)?;

        let text = std::str::from_utf8(&data[..end - 4])
            .map_err(|_| Error::InvalidHandshake("request head is not valid UTF-8".into()))?;
        let mut lines = text.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(path), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidHandshake(format!(
                "malformed request line: {request_line:?}"
            )));
        };
        if !version.starts_with("HTTP/") {
            return Err(Error::InvalidHandshake(format!(
                "expected an HTTP version, got {version}"
            )));
        }

        let mut request = Request::new(method, path, scheme);
        for line in lines {
            // lines without a colon carry no header
            if let Some((name, value)) = line.split_once(':') {
                request = request.with_header(name.trim(), value.trim());
            }
        }

        // only a draft-76 request carries body bytes the handshake needs
        let body = &data[end..];
        let needed = select_variant(&request).map_or(0, |variant| variant.handshake_body_len());
        if body.len() < needed {
            return Ok(None);
        }

        Ok(Some(request.with_body(body)))
    }
}

/// Offset just past the `\r\n\r\n` terminating the header block.
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}
