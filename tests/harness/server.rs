//! A server bound to an ephemeral loopback port.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use wsgate::{Handler, Server, ServerConfig};

use super::TestClient;

pub struct TestServer {
    server: Server,
}

impl TestServer {
    pub fn spawn(handler: Arc<dyn Handler>) -> Self {
        let config = ServerConfig::from_location("ws://127.0.0.1:8181")
            .unwrap()
            .with_port(0)
            .with_bind_loopback(true);
        Self {
            server: Server::start(config, handler).unwrap(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub async fn connect(&self) -> TestClient<TcpStream> {
        TestClient::new(TcpStream::connect(self.addr()).await.unwrap())
    }

    pub async fn shutdown(self) {
        self.server.shutdown().await;
    }
}
