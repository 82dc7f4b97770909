//! # wsgate - Server-side WebSocket protocol engine
//!
//! `wsgate` accepts raw byte streams, performs the opening handshake,
//! decodes client frames into application events and encodes outgoing
//! messages. Two protocol variants are served from the same listener:
//!
//! - **Hybi13** (RFC 6455, protocol versions 7, 8 and 13)
//! - **Draft76** (the legacy `Sec-WebSocket-Key1/Key2` handshake)
//!
//! ## Features
//!
//! - **Version negotiation** from the request headers alone
//! - **Strict validation** of masking, reserved bits, control frames and UTF-8
//! - **Ordered, non-blocking sends** from any task or callback
//! - **Resource limits** on frame, message and handshake sizes
//! - **TLS** for `wss://` listeners (feature `tls-rustls`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wsgate::{Connection, Handler, Server, ServerConfig};
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn on_message(&self, conn: &Connection, text: String) {
//!         conn.send_text(&text);
//!     }
//! }
//!
//! # async fn run() -> wsgate::Result<()> {
//! let config = ServerConfig::from_location("ws://0.0.0.0:8181")?;
//! let server = Server::start(config, Arc::new(Echo))?;
//! # server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod request;
pub mod server;

#[cfg(feature = "tls-rustls")]
pub mod tls;

pub use config::{ConnectionConfig, Limits, ServerConfig};
pub use connection::{Connection, ConnectionInfo, ConnectionState, Handler, PendingConnection};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{OpCode, ProtocolVariant, WS_GUID, compute_accept_key};
pub use request::{HttpRequestParser, Request, RequestParser, Scheme};
pub use server::Server;
