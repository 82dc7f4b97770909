//! TCP listener that turns accepted sockets into WebSocket connections.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{ConnectionConfig, ServerConfig};
use crate::connection::{Handler, PendingConnection};
use crate::error::Result;
#[cfg(feature = "tls-rustls")]
use crate::tls::TlsAcceptor;

/// A running WebSocket server.
///
/// Dropping the server stops its accept loop; connections that are already
/// open keep running until they close.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    location: String,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Server {
    /// Bind the configured port and start accepting connections.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration
    /// cannot be served and [`Error::Io`](crate::Error::Io) if no interface
    /// could be bound.
    pub fn start(config: ServerConfig, handler: Arc<dyn Handler>) -> Result<Self> {
        config.validate()?;

        let listener = bind(&config)?;
        let local_addr = listener.local_addr()?;
        info!(
            "server started at {} (actual port {})",
            config.location,
            local_addr.port()
        );

        let acceptor = Acceptor {
            connection: config.connection.clone(),
            handler,
            #[cfg(feature = "tls-rustls")]
            tls: config.tls.clone().filter(|_| config.is_secure()).map(TlsAcceptor::new),
        };
        let (shutdown, stopped) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, acceptor, stopped));

        Ok(Self {
            local_addr,
            location: config.location,
            shutdown,
            task: Some(task),
        })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Location URL the server was configured with.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!("accept loop for {} failed: {err}", self.location);
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Bind the listener, retrying on all interfaces if loopback fails.
fn bind(config: &ServerConfig) -> io::Result<TcpListener> {
    let any = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    if config.bind_loopback {
        let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
        match listen(loopback, config.backlog) {
            Ok(listener) => return Ok(listener),
            Err(err) => warn!("could not bind {loopback}: {err}, retrying on {any}"),
        }
    }
    listen(any, config.backlog)
}

fn listen(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

/// Everything a spawned connection needs from the server.
#[derive(Clone)]
struct Acceptor {
    connection: ConnectionConfig,
    handler: Arc<dyn Handler>,
    #[cfg(feature = "tls-rustls")]
    tls: Option<TlsAcceptor>,
}

impl Acceptor {
    fn serve<S>(&self, stream: S, client_addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        PendingConnection::new(
            stream,
            client_addr,
            Arc::clone(&self.handler),
            self.connection.clone(),
        )
        .start_receiving();
    }

    async fn accept(self, stream: tokio::net::TcpStream, client_addr: SocketAddr) {
        #[cfg(feature = "tls-rustls")]
        if let Some(tls) = &self.tls {
            debug!("[{client_addr}] authenticating secure connection");
            match tls.accept(stream).await {
                Ok(stream) => {
                    debug!("[{client_addr}] authentication succeeded");
                    self.serve(stream, client_addr);
                }
                Err(err) => warn!("[{client_addr}] failed to authenticate: {err}"),
            }
            return;
        }

        self.serve(stream, client_addr);
    }
}

async fn accept_loop(listener: TcpListener, acceptor: Acceptor, mut stopped: watch::Receiver<bool>) {
    loop {
        let accepted = tokio::select! {
            _ = stopped.changed() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, client_addr)) => {
                debug!("client connected from {client_addr}");
                if let Err(err) = stream.set_nodelay(true) {
                    debug!("[{client_addr}] could not set TCP_NODELAY: {err}");
                }
                tokio::spawn(acceptor.clone().accept(stream, client_addr));
            }
            Err(err) => error!("listener failed to accept: {err}"),
        }
    }

    match listener.local_addr() {
        Ok(addr) => info!("server on {addr} stopped"),
        Err(_) => info!("server stopped"),
    }
}
