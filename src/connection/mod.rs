//! Server-side connection engine.
//!
//! A [`PendingConnection`] wraps an accepted stream. Starting it spawns a
//! read task, which parses the opening request, negotiates the protocol
//! variant and decodes frames, and a write task, which flushes queued frames
//! in order. The application observes the connection through a [`Handler`]
//! and drives it through the cloneable [`Connection`] handle.
//!
//! ## Connection Lifecycle
//!
//! 1. **AwaitingHandshake** - Buffering the opening request
//! 2. **Open** - Handshake response written, `on_open` fired
//! 3. **Closing** - Close frame queued
//! 4. **Closed** - Socket torn down, `on_close` fired
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wsgate::config::ConnectionConfig;
//! use wsgate::connection::{Connection, Handler, PendingConnection};
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn on_message(&self, conn: &Connection, text: String) {
//!         conn.send_text(&text);
//!     }
//! }
//!
//! # async fn serve(stream: tokio::net::TcpStream) -> std::io::Result<()> {
//! let addr = stream.peer_addr()?;
//! PendingConnection::new(stream, addr, Arc::new(Echo), ConnectionConfig::default())
//!     .start_receiving();
//! # Ok(())
//! # }
//! ```

mod handler;
mod info;
mod state;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::{Connection, PendingConnection};
pub use handler::Handler;
pub use info::ConnectionInfo;
pub use state::ConnectionState;
