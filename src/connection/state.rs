//! Connection lifecycle states.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a connection.
///
/// States only move forward, in declaration order. Any state may jump
/// straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// Waiting for the opening request; no variant bound yet.
    #[default]
    AwaitingHandshake = 0,
    /// Handshake response written; data flows both ways.
    Open = 1,
    /// A close frame has been queued; waiting for it to be flushed.
    Closing = 2,
    /// The socket is closed.
    Closed = 3,
}

impl ConnectionState {
    /// Application data may only be sent while `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::AwaitingHandshake,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConnectionState::AwaitingHandshake => "AwaitingHandshake",
            ConnectionState::Open => "Open",
            ConnectionState::Closing => "Closing",
            ConnectionState::Closed => "Closed",
        })
    }
}

/// Lock-free cell enforcing forward-only transitions.
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` if it lies ahead of the current state.
    ///
    /// Returns `false`, leaving the state untouched, otherwise.
    pub(crate) fn advance(&self, next: ConnectionState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (raw < next as u8).then_some(next as u8)
            })
            .is_ok()
    }
}
