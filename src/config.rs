//! Configuration and limits for the WebSocket server.

use url::Url;

use crate::error::{Error, Result};
use crate::request::Scheme;

/// Port used when the location URL does not name one.
pub const DEFAULT_PORT: u16 = 8181;

/// Configuration limits for WebSocket connections.
///
/// These limits prevent resource exhaustion attacks and ensure
/// bounded memory usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum declared payload length of a single frame in bytes.
    ///
    /// Frames announcing more than this are rejected with close code 1009
    /// before any payload is buffered.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of a complete message in bytes.
    ///
    /// This applies to the total size after reassembling all fragments.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum size of handshake data in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,   // 16 MB
            max_message_size: 64 * 1024 * 1024, // 64 MB
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_handshake_size,
        }
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<()> {
        if size > self.max_message_size {
            Err(Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate a declared frame length against limits.
    ///
    /// Takes the raw 64-bit wire length so oversized declarations never
    /// get truncated on 32-bit targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<()> {
        if size > self.max_frame_size as u64 {
            Err(Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<()> {
        if size > self.max_handshake_size {
            Err(Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Per-connection settings shared by every connection a server accepts.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Resource limits.
    pub limits: Limits,

    /// Size of a single socket read (in bytes).
    ///
    /// Default: 4 KB (4096)
    pub read_buffer_size: usize,

    /// Scheme the listener serves; echoed into the draft-76 location header.
    pub scheme: Scheme,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            read_buffer_size: 4096,
            scheme: Scheme::Ws,
        }
    }
}

impl ConnectionConfig {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the scheme.
    #[must_use]
    pub const fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }
}

/// Listener configuration.
///
/// Built from a location URL such as `ws://0.0.0.0:8181` or
/// `wss://example.com:443/`.
#[derive(Clone)]
pub struct ServerConfig {
    /// The location the server was created with.
    pub location: String,

    /// Port to bind.
    pub port: u16,

    /// Bind to the loopback interface only.
    ///
    /// Default: false
    pub bind_loopback: bool,

    /// Listen backlog.
    ///
    /// Default: 100
    pub backlog: u32,

    /// Settings applied to each accepted connection.
    pub connection: ConnectionConfig,

    /// TLS settings used for `wss` locations.
    #[cfg(feature = "tls-rustls")]
    pub tls: Option<std::sync::Arc<tokio_rustls::rustls::ServerConfig>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("ServerConfig");
        s.field("location", &self.location)
            .field("port", &self.port)
            .field("bind_loopback", &self.bind_loopback)
            .field("backlog", &self.backlog)
            .field("connection", &self.connection);
        #[cfg(feature = "tls-rustls")]
        s.field("tls", &self.tls.is_some());
        s.finish()
    }
}

impl ServerConfig {
    /// Create a configuration from a location URL.
    ///
    /// The port comes from the URL, falling back to [`DEFAULT_PORT`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the location is not a `ws` or `wss` URL.
    pub fn from_location(location: &str) -> Result<Self> {
        let url = Url::parse(location)
            .map_err(|e| Error::Config(format!("invalid location {location}: {e}")))?;
        let scheme = Scheme::from_name(url.scheme()).ok_or_else(|| {
            Error::Config(format!("unsupported scheme '{}' in {location}", url.scheme()))
        })?;

        Ok(Self {
            location: location.to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            bind_loopback: false,
            backlog: 100,
            connection: ConnectionConfig::default().with_scheme(scheme),
            #[cfg(feature = "tls-rustls")]
            tls: None,
        })
    }

    /// Scheme served by this configuration.
    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.connection.scheme
    }

    /// Override the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Restrict the listener to the loopback interface.
    #[must_use]
    pub const fn with_bind_loopback(mut self, loopback: bool) -> Self {
        self.bind_loopback = loopback;
        self
    }

    /// Set the listen backlog.
    #[must_use]
    pub const fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Set custom limits for accepted connections.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.connection.limits = limits;
        self
    }

    /// Set the TLS server configuration used for `wss`.
    #[cfg(feature = "tls-rustls")]
    #[must_use]
    pub fn with_tls(mut self, tls: std::sync::Arc<tokio_rustls::rustls::ServerConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Returns `true` if accepted sockets are wrapped in TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        #[cfg(feature = "tls-rustls")]
        {
            self.scheme() == Scheme::Wss && self.tls.is_some()
        }
        #[cfg(not(feature = "tls-rustls"))]
        {
            false
        }
    }

    /// Check the configuration can be served.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a `wss` location without TLS settings.
    pub fn validate(&self) -> Result<()> {
        if self.scheme() == Scheme::Wss && !self.is_secure() {
            return Err(Error::Config(
                "scheme cannot be 'wss' without a certificate".into(),
            ));
        }
        Ok(())
    }
}
