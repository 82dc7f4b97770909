//! Minimal client speaking raw bytes to the server under test.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use wsgate::protocol::{Frame, FrameHeader, OpCode};

use super::within;

/// RFC 6455 sample key and the accept value derived from it.
pub const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
pub const ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

pub fn hybi13_request(path: &str, extra_headers: &[(&str, &str)]) -> String {
    let mut request = format!(
        "GET {path} HTTP/1.1\r\n\
Host: localhost\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: {KEY}\r\n\
Sec-WebSocket-Version: 13\r\n"
    );
    for (name, value) in extra_headers {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    request.push_str("\r\n");
    request
}

/// The hixie-76 sample request, challenge included.
pub fn draft76_request() -> Vec<u8> {
    let mut request = b"GET /demo HTTP/1.1\r\n\
Host: example.com\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\
Sec-WebSocket-Protocol: sample\r\n\
Upgrade: WebSocket\r\n\
Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5\r\n\
Origin: http://example.com\r\n\
\r\n"
        .to_vec();
    request.extend_from_slice(b"^n:ds[4U");
    request
}

/// Status code carried by a close frame, if any.
pub fn close_code(frame: &Frame) -> Option<u16> {
    assert_eq!(frame.opcode, OpCode::Close, "not a close frame: {frame:?}");
    match frame.payload() {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

pub struct TestClient<S> {
    stream: S,
    buffer: Vec<u8>,
}

impl<S> TestClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Send a hybi-13 request for `/chat` and return the response head.
    pub async fn handshake(&mut self) -> String {
        self.send_raw(hybi13_request("/chat", &[]).as_bytes()).await;
        self.read_head().await
    }

    /// Read up to and including the blank line ending an HTTP head.
    pub async fn read_head(&mut self) -> String {
        loop {
            if let Some(pos) = self.buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                let head: Vec<u8> = self.buffer.drain(..pos + 4).collect();
                return String::from_utf8(head).unwrap();
            }
            assert!(self.fill().await > 0, "connection closed before the response head");
        }
    }

    pub async fn read_bytes(&mut self, n: usize) -> Vec<u8> {
        while self.buffer.len() < n {
            assert!(self.fill().await > 0, "connection closed after {} bytes", self.buffer.len());
        }
        self.buffer.drain(..n).collect()
    }

    /// Everything the server sends until it closes the stream.
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        while self.fill().await > 0 {}
        std::mem::take(&mut self.buffer)
    }

    pub async fn send_frame(&mut self, frame: &Frame) {
        self.send_raw(&frame.to_bytes(Some(MASK))).await;
    }

    pub async fn send_text(&mut self, text: &str) {
        self.send_frame(&Frame::text(text)).await;
    }

    /// Next server frame, or `None` once the stream has ended.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        loop {
            if let Some(header) = FrameHeader::parse(&self.buffer).unwrap() {
                assert!(!header.is_masked(), "server frames must not be masked");
                let total = header.header_len + header.payload_len as usize;
                if self.buffer.len() >= total {
                    let payload = self.buffer[header.header_len..total].to_vec();
                    self.buffer.drain(..total);
                    return Some(Frame::new(header.fin, header.opcode, payload));
                }
            }
            if self.fill().await == 0 {
                return None;
            }
        }
    }

    pub async fn recv_text(&mut self) -> String {
        let frame = self.recv_frame().await.expect("stream ended");
        assert_eq!(frame.opcode, OpCode::Text, "unexpected frame: {frame:?}");
        String::from_utf8(frame.into_payload()).unwrap()
    }

    pub async fn recv_close(&mut self) -> Option<u16> {
        let frame = self.recv_frame().await.expect("stream ended before close");
        close_code(&frame)
    }

    async fn fill(&mut self) -> usize {
        let mut chunk = [0u8; 4096];
        // a reset counts as the end of the stream
        let n = within(self.stream.read(&mut chunk)).await.unwrap_or(0);
        self.buffer.extend_from_slice(&chunk[..n]);
        n
    }
}
