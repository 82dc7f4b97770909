//! WebSocket echo server accepting both RFC 6455 and draft-76 clients.
//!
//! Run with: cargo run --example echo_server
//! Stop with Ctrl-C.

use std::error::Error;
use std::sync::Arc;

use wsgate::{Connection, Handler, Server, ServerConfig};

const LOCATION: &str = "ws://0.0.0.0:8181";

struct Echo;

impl Handler for Echo {
    fn on_open(&self, conn: &Connection) {
        let variant = conn.variant().map(|v| v.name()).unwrap_or("?");
        println!("[{}] open ({variant}) from {}", conn.id(), conn.client_addr());
    }

    fn on_close(&self, conn: &Connection) {
        println!("[{}] closed", conn.id());
    }

    fn on_message(&self, conn: &Connection, text: String) {
        conn.send_text(&text);
    }

    fn on_binary(&self, conn: &Connection, data: Vec<u8>) {
        conn.send_binary(&data);
    }

    fn on_error(&self, conn: &Connection, err: &wsgate::Error) {
        eprintln!("[{}] error: {err}", conn.id());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::from_location(LOCATION)?;
    let server = Server::start(config, Arc::new(Echo))?;
    println!("WebSocket echo server listening on {}", server.local_addr());

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}
