//! A handler that reports every callback over a channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use wsgate::{Connection, Error, Handler};

use super::within;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Close,
    Text(String),
    Binary(Vec<u8>),
    Error(String),
}

pub struct Recorder {
    events: mpsc::UnboundedSender<Event>,
    echo: bool,
    panic_on: Option<String>,
}

impl Recorder {
    pub fn new() -> (Self, Events) {
        let (events, rx) = mpsc::unbounded_channel();
        let recorder = Self {
            events,
            echo: false,
            panic_on: None,
        };
        (recorder, Events { rx })
    }

    /// Send every received message straight back.
    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Panic inside `on_message` when this text arrives.
    pub fn panic_on(mut self, text: &str) -> Self {
        self.panic_on = Some(text.to_string());
        self
    }

    pub fn into_handler(self) -> Arc<dyn Handler> {
        Arc::new(self)
    }

    fn record(&self, event: Event) {
        let _ = self.events.send(event);
    }
}

impl Handler for Recorder {
    fn on_open(&self, _conn: &Connection) {
        self.record(Event::Open);
    }

    fn on_close(&self, _conn: &Connection) {
        self.record(Event::Close);
    }

    fn on_message(&self, conn: &Connection, text: String) {
        if self.panic_on.as_deref() == Some(text.as_str()) {
            panic!("boom");
        }
        if self.echo {
            conn.send_text(&text);
        }
        self.record(Event::Text(text));
    }

    fn on_binary(&self, conn: &Connection, data: Vec<u8>) {
        if self.echo {
            conn.send_binary(&data);
        }
        self.record(Event::Binary(data));
    }

    fn on_error(&self, _conn: &Connection, err: &Error) {
        self.record(Event::Error(err.to_string()));
    }
}

pub struct Events {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Events {
    pub async fn next(&mut self) -> Event {
        within(self.rx.recv()).await.expect("recorder dropped")
    }

    pub async fn expect(&mut self, expected: Event) {
        assert_eq!(self.next().await, expected);
    }

    /// Next event, which must be an error; returns its message.
    pub async fn expect_error(&mut self) -> String {
        match self.next().await {
            Event::Error(message) => message,
            other => panic!("expected an error, got {other:?}"),
        }
    }

    /// Assert nothing else is reported for a short while.
    pub async fn expect_quiet(&mut self) {
        if let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(100), self.rx.recv()).await
        {
            panic!("unexpected event: {event:?}");
        }
    }
}
