//! Shared helpers for the integration tests.
//!
//! A raw protocol client, a handler that records every callback, and a
//! loopback server.

#![allow(dead_code)]

mod client;
mod recorder;
mod server;

pub use client::{ACCEPT, KEY, TestClient, close_code, draft76_request, hybi13_request};
pub use recorder::{Event, Events, Recorder};
pub use server::TestServer;

use std::future::Future;
use std::time::Duration;

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Await `future`, failing the test if it takes longer than [`WAIT`].
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("timed out waiting")
}
