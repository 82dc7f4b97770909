//! Application callbacks.

use crate::connection::Connection;
use crate::error::Error;

/// Lifecycle and message callbacks for connections.
///
/// Every method defaults to a no-op. Callbacks run on the connection's read
/// task (`on_close` may also run wherever the socket is closed from), so they
/// should return quickly. Sending from inside a callback never blocks.
///
/// A panic inside a callback is caught, reported through `on_error` as
/// [`Error::Application`], and closes the connection with code 1011.
pub trait Handler: Send + Sync + 'static {
    /// The handshake response has been written.
    fn on_open(&self, _conn: &Connection) {}

    /// The socket has been closed. Fires at most once.
    fn on_close(&self, _conn: &Connection) {}

    /// A complete text message arrived.
    fn on_message(&self, _conn: &Connection, _text: String) {}

    /// A complete binary message arrived.
    fn on_binary(&self, _conn: &Connection, _data: Vec<u8>) {}

    /// The connection failed. Teardown follows.
    fn on_error(&self, _conn: &Connection, _err: &Error) {}
}

/// Ignores every event.
impl Handler for () {}
