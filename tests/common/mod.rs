#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stomp_ws_client::Result;
use stomp_ws_client::error::Error;
use stomp_ws_client::stomp::frame::{Frame, HEARTBEAT, decode};
use stomp_ws_client::stomp::{Client, Event};
use stomp_ws_client::ws::config::Config;
use stomp_ws_client::ws::{Transport, TransportHandle, TransportListener, WsError};

pub const ENDPOINT: &str = "ws://broker.test/ws";

/// Let spawned tasks observe the current (paused) clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock one second at a time so repeating timers fire on every period.
///
/// Timers only start counting once their task is first polled, so pending tasks settle first.
pub async fn advance_secs(secs: u64) {
    for _ in 0..secs {
        settle().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
}

/// Advance the paused clock by `millis` in one step.
pub async fn advance_millis(millis: u64) {
    settle().await;
    tokio::time::advance(Duration::from_millis(millis)).await;
    settle().await;
}

/// Transport that records everything and only calls back when a test says so.
#[derive(Clone, Default)]
pub struct MockTransport {
    connections: Arc<Mutex<Vec<Arc<MockConnection>>>>,
}

impl MockTransport {
    #[must_use]
    pub fn opened(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// The most recently opened connection.
    #[must_use]
    pub fn last(&self) -> Arc<MockConnection> {
        Arc::clone(self.connections.lock().unwrap().last().unwrap())
    }

    #[must_use]
    pub fn nth(&self, index: usize) -> Arc<MockConnection> {
        Arc::clone(&self.connections.lock().unwrap()[index])
    }
}

impl Transport for MockTransport {
    type Handle = MockHandle;

    fn open(&self, endpoint: &str, listener: Arc<dyn TransportListener>) -> Self::Handle {
        let connection = Arc::new(MockConnection {
            endpoint: endpoint.to_owned(),
            listener,
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(None),
            refuse_sends: AtomicBool::new(false),
        });
        self.connections
            .lock()
            .unwrap()
            .push(Arc::clone(&connection));

        MockHandle { connection }
    }
}

pub struct MockConnection {
    pub endpoint: String,
    listener: Arc<dyn TransportListener>,
    sent: Mutex<Vec<String>>,
    closed: Mutex<Option<(u16, String)>>,
    refuse_sends: AtomicBool,
}

impl MockConnection {
    pub fn open(&self) {
        self.listener.on_open();
    }

    pub fn deliver(&self, text: &str) {
        self.listener.on_message(text);
    }

    /// Open the connection and acknowledge the handshake.
    pub fn accept(&self) {
        self.open();
        self.deliver("CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0");
    }

    pub fn close_remote(&self, code: u16, reason: &str) {
        self.listener.on_closed(code, reason);
    }

    pub fn fail(&self, error: Error) {
        self.listener.on_failure(error);
    }

    pub fn refuse_sends(&self, refuse: bool) {
        self.refuse_sends.store(refuse, Ordering::SeqCst);
    }

    /// Every transport message sent, heartbeats included.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent frames, decoded, heartbeats skipped.
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.sent().iter().flat_map(|text| decode(text)).collect()
    }

    #[must_use]
    pub fn heartbeats(&self) -> usize {
        self.sent().iter().filter(|text| *text == HEARTBEAT).count()
    }

    /// Close code and reason if the client closed this connection.
    #[must_use]
    pub fn closed(&self) -> Option<(u16, String)> {
        self.closed.lock().unwrap().clone()
    }
}

pub struct MockHandle {
    connection: Arc<MockConnection>,
}

impl TransportHandle for MockHandle {
    fn send(&self, text: &str) -> Result<()> {
        if self.connection.refuse_sends.load(Ordering::SeqCst)
            || self.connection.closed().is_some()
        {
            return Err(WsError::ConnectionClosed.into());
        }
        self.connection.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        *self.connection.closed.lock().unwrap() = Some((code, reason.to_owned()));
    }
}

/// Events received by the listener, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn attach(&self, client: &Client<MockTransport>) {
        let events = Arc::clone(&self.events);
        client.set_listener(move |event| events.lock().unwrap().push(event));
    }

    /// One line per event: `connected`, `disconnected: <reason>`, `message: <destination> <body>`,
    /// `receipt: <id>` or `error: <display>`.
    #[must_use]
    pub fn summary(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| match event {
                Event::Connected => "connected".to_owned(),
                Event::Disconnected { reason } => {
                    format!("disconnected: {}", reason.as_deref().unwrap_or("-"))
                }
                Event::Message(message) => format!(
                    "message: {} {}",
                    message.destination.as_deref().unwrap_or("-"),
                    message.body
                ),
                Event::Receipt { receipt_id } => format!("receipt: {receipt_id}"),
                Event::Error(error) => format!("error: {error}"),
            })
            .collect()
    }

    #[must_use]
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn reset(&self) {
        self.events.lock().unwrap().clear();
    }
}

/// Config with heartbeats and liveness checks disabled, so tests opt into the timers they exercise.
#[must_use]
pub fn quiet_config() -> Config {
    Config::builder()
        .heartbeat_interval(Duration::ZERO)
        .server_timeout(Duration::ZERO)
        .build()
}

#[must_use]
pub fn client_with(config: Config) -> (Client<MockTransport>, MockTransport, Recorder) {
    let transport = MockTransport::default();
    let client = Client::with_transport(ENDPOINT, config, transport.clone()).unwrap();
    let recorder = Recorder::default();
    recorder.attach(&client);
    (client, transport, recorder)
}
