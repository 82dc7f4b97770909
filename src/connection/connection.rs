use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::BytesMut;
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::ConnectionConfig;
use crate::connection::handler::Handler;
use crate::connection::info::ConnectionInfo;
use crate::connection::state::{ConnectionState, StateCell};
use crate::error::{Error, Result};
use crate::message::{CloseCode, Message};
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;
use crate::protocol::{Decoder, ProtocolVariant, negotiate_sub_protocol, select_variant};
use crate::request::{HttpRequestParser, Request, RequestParser};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// What the writer does once a frame has been flushed.
enum Then {
    Nothing,
    CloseSocket,
    Notify(oneshot::Sender<()>),
}

enum Outbound {
    Frame { bytes: Vec<u8>, then: Then },
    Shutdown,
}

struct Shared {
    id: u64,
    client_addr: SocketAddr,
    state: StateCell,
    variant: OnceLock<ProtocolVariant>,
    info: OnceLock<ConnectionInfo>,
    closed: AtomicBool,
    outbound: mpsc::UnboundedSender<Outbound>,
    close_signal: watch::Sender<bool>,
    handler: Arc<dyn Handler>,
}

/// Handle to a server-side WebSocket connection.
///
/// Cheap to clone; every clone drives the same socket. Sends are queued and
/// written in order by a dedicated writer task, so they are safe to call
/// from any task or callback and never block.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("client_addr", &self.shared.client_addr)
            .field("state", &self.state())
            .field("variant", &self.variant())
            .finish()
    }
}

impl Connection {
    /// Process-unique connection id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    #[must_use]
    pub fn client_addr(&self) -> SocketAddr {
        self.shared.client_addr
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Available once the handshake request has been accepted.
    #[must_use]
    pub fn info(&self) -> Option<&ConnectionInfo> {
        self.shared.info.get()
    }

    /// Protocol bound by the handshake.
    #[must_use]
    pub fn variant(&self) -> Option<ProtocolVariant> {
        self.shared.variant.get().copied()
    }

    /// `true` until a close has begun.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.is_closed() && self.state() < ConnectionState::Closing
    }

    /// Queue a text message. Ignored with a warning unless the connection is open.
    pub fn send_text(&self, text: &str) {
        self.send_frame("text", |variant| variant.frame_text(text));
    }

    /// Queue a binary message. Ignored with a warning unless the connection is open.
    ///
    /// Draft-76 connections cannot carry binary data; the message is dropped.
    pub fn send_binary(&self, data: &[u8]) {
        self.send_frame("binary", |variant| variant.frame_binary(data));
    }

    /// Queue a ping. Payloads over 125 bytes are rejected.
    pub fn send_ping(&self, data: &[u8]) {
        if data.len() > MAX_CONTROL_FRAME_PAYLOAD {
            warn!(
                "[{}] ping payload of {} bytes exceeds {MAX_CONTROL_FRAME_PAYLOAD}, ignoring",
                self.id(),
                data.len()
            );
            return;
        }
        self.send_frame("ping", |variant| variant.frame_ping(data));
    }

    /// Close normally (1000).
    pub fn close(&self) {
        self.close_with(CloseCode::Normal);
    }

    /// Begin the closing handshake with `code`.
    ///
    /// The socket is closed once the close frame has been flushed. Before a
    /// protocol has been negotiated the socket is closed immediately.
    /// Repeated calls have no further effect.
    pub fn close_with(&self, code: CloseCode) {
        let Some(variant) = self.variant() else {
            self.close_socket();
            return;
        };
        if !self.shared.state.advance(ConnectionState::Closing) {
            return;
        }

        debug!("[{}] closing with code {code}", self.id());
        let bytes = variant.frame_close(code);
        if bytes.is_empty() || !self.enqueue(bytes, Then::CloseSocket) {
            self.close_socket();
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn send_frame(&self, kind: &str, frame: impl FnOnce(ProtocolVariant) -> Vec<u8>) {
        let state = self.state();
        let variant = match self.variant() {
            Some(variant) if state.can_send() && !self.is_closed() => variant,
            _ => {
                warn!("[{}] {kind} data sent while {state}, ignoring", self.id());
                return;
            }
        };

        let bytes = frame(variant);
        if bytes.is_empty() {
            warn!("[{}] {variant} cannot carry {kind} frames, dropping", self.id());
            return;
        }
        self.enqueue(bytes, Then::Nothing);
    }

    /// Hand bytes to the writer. Returns `false` if the writer has gone.
    fn enqueue(&self, bytes: Vec<u8>, then: Then) -> bool {
        if self.shared.outbound.send(Outbound::Frame { bytes, then }).is_err() {
            debug!("[{}] writer already stopped, dropping frame", self.id());
            return false;
        }
        true
    }

    fn bind(&self, variant: ProtocolVariant, info: ConnectionInfo) {
        // only the read task binds, once
        let _ = self.shared.variant.set(variant);
        let _ = self.shared.info.set(info);
    }

    /// Tear the socket down. Runs once; later calls return immediately.
    fn close_socket(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.state.advance(ConnectionState::Closed);
        debug!("[{}] closing socket", self.id());

        self.shared.close_signal.send_replace(true);
        let _ = self.shared.outbound.send(Outbound::Shutdown);

        if let Err(err) = self.call(|handler, conn| handler.on_close(conn)) {
            error!("[{}] on_close failed: {err}", self.id());
        }
    }

    /// Run a handler callback, turning a panic into `Error::Application`.
    fn call<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(&dyn Handler, &Connection),
    {
        let handler = &*self.shared.handler;
        panic::catch_unwind(AssertUnwindSafe(|| callback(handler, self)))
            .map_err(|payload| Error::Application(panic_message(payload.as_ref())))
    }

    /// Report `err` and close the connection the way its kind demands.
    fn fail(&self, err: Error) {
        let id = self.id();
        match err {
            Error::ConnectionClosed => {
                debug!("[{id}] connection closed during teardown, ignoring");
                return;
            }
            Error::AvailabilityProbe => {
                debug!("[{id}] availability probe received, closing");
                self.close_socket();
                return;
            }
            _ => {}
        }

        if let Err(callback_err) = self.call(|handler, conn| handler.on_error(conn, &err)) {
            error!("[{id}] on_error failed: {callback_err}");
        }

        if err.is_handshake() {
            debug!("[{id}] handshake failed: {err}");
            self.close_socket();
        } else if err.is_protocol() {
            debug!("[{id}] protocol error: {err}");
            self.close_with(err.close_code());
        } else if err.is_transport() {
            debug!("[{id}] transport error: {err}");
            self.close_with(CloseCode::InternalError);
        } else {
            error!("[{id}] application error: {err}");
            self.close_with(CloseCode::InternalError);
        }
    }

    /// Deliver one decoded event.
    fn dispatch(&self, message: Message) -> Result<()> {
        match message {
            Message::Text(text) => self.call(|handler, conn| handler.on_message(conn, text)),
            Message::Binary(data) => self.call(|handler, conn| handler.on_binary(conn, data)),
            Message::Ping(payload) => {
                if let Some(variant) = self.variant().filter(|_| !self.is_closed()) {
                    self.enqueue(variant.frame_pong(&payload), Then::Nothing);
                }
                Ok(())
            }
            Message::Pong(_) => {
                debug!("[{}] pong received", self.id());
                Ok(())
            }
            Message::Close(frame) => {
                debug!("[{}] close received: {frame:?}", self.id());
                if self.state() == ConnectionState::Closing {
                    // reply to our own close
                    self.close_socket();
                } else {
                    self.close_with(frame.map_or(CloseCode::Normal, |f| f.code));
                }
                Ok(())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// An accepted stream whose read loop has not started.
///
/// Consumed by [`PendingConnection::start_receiving`], so the loop can only
/// be started once.
pub struct PendingConnection<S> {
    conn: Connection,
    stream: S,
    queue: mpsc::UnboundedReceiver<Outbound>,
    parser: Arc<dyn RequestParser>,
    config: ConnectionConfig,
}

impl<S> PendingConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap an accepted stream.
    #[must_use]
    pub fn new(
        stream: S,
        client_addr: SocketAddr,
        handler: Arc<dyn Handler>,
        config: ConnectionConfig,
    ) -> Self {
        let (outbound, queue) = mpsc::unbounded_channel();
        let (close_signal, _) = watch::channel(false);
        let shared = Shared {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            client_addr,
            state: StateCell::default(),
            variant: OnceLock::new(),
            info: OnceLock::new(),
            closed: AtomicBool::new(false),
            outbound,
            close_signal,
            handler,
        };

        Self {
            conn: Connection {
                shared: Arc::new(shared),
            },
            stream,
            queue,
            parser: Arc::new(HttpRequestParser::new(config.limits.clone())),
            config,
        }
    }

    /// Replace the default HTTP request parser.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn RequestParser>) -> Self {
        self.parser = parser;
        self
    }

    /// The handle the connection will be driven through.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Spawn the read and write tasks and return the connection handle.
    ///
    /// Must be called within a tokio runtime.
    pub fn start_receiving(self) -> Connection {
        let (read_half, write_half) = tokio::io::split(self.stream);
        tokio::spawn(write_loop(write_half, self.queue, self.conn.clone()));

        let reader = Reader {
            conn: self.conn.clone(),
            parser: self.parser,
            config: self.config,
            phase: Phase::Handshake(BytesMut::new()),
            peer_closed: false,
        };
        tokio::spawn(reader.run(read_half));

        self.conn
    }
}

async fn write_loop<W>(mut io: W, mut queue: mpsc::UnboundedReceiver<Outbound>, conn: Connection)
where
    W: AsyncWrite + Unpin,
{
    let id = conn.id();
    while let Some(Outbound::Frame { bytes, then }) = queue.recv().await {
        let written = match io.write_all(&bytes).await {
            Ok(()) => io.flush().await,
            Err(err) => Err(err),
        };

        if let Err(err) = written {
            match err.kind() {
                io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted => {
                    debug!("[{id}] failed to send, disconnecting: {err}");
                }
                _ => info!("[{id}] failed to send, disconnecting: {err}"),
            }
            conn.close_socket();
            break;
        }

        debug!("[{id}] sent {} bytes", bytes.len());
        match then {
            Then::Nothing => {}
            Then::CloseSocket => conn.close_socket(),
            Then::Notify(ack) => {
                let _ = ack.send(());
            }
        }
    }

    if let Err(err) = io.shutdown().await {
        debug!("[{id}] shutdown failed: {err}");
    }
}

enum Phase {
    /// Buffering the opening request.
    Handshake(BytesMut),
    /// Decoding frames for the bound variant.
    Frames(Decoder),
}

/// State owned exclusively by the read task.
struct Reader {
    conn: Connection,
    parser: Arc<dyn RequestParser>,
    config: ConnectionConfig,
    phase: Phase,
    peer_closed: bool,
}

impl Reader {
    async fn run<R>(mut self, mut io: R)
    where
        R: AsyncRead + Unpin,
    {
        let id = self.conn.id();
        let mut closed = self.conn.shared.close_signal.subscribe();
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];

        loop {
            let is_closed = *closed.borrow_and_update();
            if is_closed {
                break;
            }

            let read = tokio::select! {
                biased;
                _ = closed.changed() => break,
                read = io.read(&mut buf) => read,
            };

            match read {
                Ok(0) => {
                    debug!("[{id}] 0 bytes read, closing");
                    self.conn.close_socket();
                    break;
                }
                Ok(n) => {
                    debug!("[{id}] {n} bytes read");
                    if let Err(err) = self.receive(&buf[..n]).await {
                        self.conn.fail(err);
                        break;
                    }
                }
                Err(err) => {
                    self.conn.fail(err.into());
                    break;
                }
            }
        }
        debug!("[{id}] read loop stopped");
    }

    /// Route a chunk to the handshake or the frame decoder.
    async fn receive(&mut self, data: &[u8]) -> Result<()> {
        if self.peer_closed {
            debug!("[{}] discarding {} bytes after close", self.conn.id(), data.len());
            return Ok(());
        }

        match &mut self.phase {
            Phase::Frames(decoder) => decoder.extend(data),
            Phase::Handshake(pending) => {
                pending.extend_from_slice(data);
                let Some(request) = self.parser.parse(&pending[..], self.config.scheme)? else {
                    return Ok(());
                };
                let decoder = open(&self.conn, &self.config, &request).await?;
                self.phase = Phase::Frames(decoder);
            }
        }

        let Phase::Frames(decoder) = &mut self.phase else {
            return Ok(());
        };
        while let Some(message) = decoder.next_message()? {
            let is_close = matches!(message, Message::Close(_));
            self.conn.dispatch(message)?;
            if is_close {
                self.peer_closed = true;
                break;
            }
            if self.conn.is_closed() {
                break;
            }
        }
        Ok(())
    }
}

/// Negotiate the handshake for `request` and open the connection.
///
/// Returns the decoder primed with any bytes the client sent after its request.
async fn open(conn: &Connection, config: &ConnectionConfig, request: &Request) -> Result<Decoder> {
    let variant = select_variant(request)?;
    let sub_protocol = negotiate_sub_protocol(request);
    let response = variant.handshake(request, sub_protocol.as_deref())?;

    conn.bind(
        variant,
        ConnectionInfo::from_request(conn.id(), conn.client_addr(), request, sub_protocol),
    );

    let mut decoder = variant.decoder(&config.limits);
    decoder.extend(request.body().get(variant.handshake_body_len()..).unwrap_or_default());

    let (ack, written) = oneshot::channel();
    if !conn.enqueue(response, Then::Notify(ack)) {
        return Err(Error::ConnectionClosed);
    }
    written.await.map_err(|_| Error::ConnectionClosed)?;

    if conn.shared.state.advance(ConnectionState::Open) {
        debug!(
            "[{}] {variant} connection open for {}",
            conn.id(),
            request.path()
        );
        conn.call(|handler, conn| handler.on_open(conn))?;
    }
    Ok(decoder)
}
