use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use backoff::backoff::Backoff as _;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::event::{Dispatcher, Event, Message, UNKNOWN_RECEIPT};
use super::frame::{Command, Frame, HEARTBEAT, Headers, NUL, decode};
use super::heartbeat::{self, CONNECT_TIMEOUT_REASON, GOING_AWAY, Monitor, SERVER_TIMEOUT_REASON};
use super::queue::OutboundQueue;
use super::reconnect::ReconnectPolicy;
use super::scheduler::Scheduler;
use super::subscription::{Subscription, SubscriptionRegistry, generate_id, unsubscribe_frame};
use crate::Result;
use crate::error::{Error, ServerError};
use crate::ws::config::Config;
#[cfg(feature = "ws")]
use crate::ws::connection::WsTransport;
use crate::ws::traits::{Transport, TransportHandle, TransportListener};

/// STOMP version offered in `CONNECT`.
pub const ACCEPT_VERSION: &str = "1.2";

/// Disconnect reason reported by [`Client::disconnect`].
pub const MANUAL_DISCONNECT_REASON: &str = "manual disconnect";

const NORMAL_CLOSURE: u16 = 1000;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Transport opening or handshake in flight
    Connecting,
    /// The server acknowledged the handshake
    Connected,
}

impl ConnectionState {
    /// Check if the session is currently usable.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// STOMP client over a message-oriented transport.
///
/// The client keeps a logical session alive across transport drops: it reconnects with
/// exponential backoff, replays every subscription after each handshake, emits heartbeats,
/// force-closes connections whose server went silent, and buffers `SEND` frames issued while
/// disconnected.
///
/// All runtime failures are reported through the listener registered with
/// [`Client::set_listener`]; the session methods themselves never fail.
///
/// Cloning is cheap and every clone drives the same session. Must be created from within a
/// Tokio runtime.
///
/// # Example
///
/// ```rust, no_run
/// use stomp_ws_client::stomp::{Client, Event};
/// use stomp_ws_client::ws::config::Config;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new("wss://example.com/ws", Config::default())?;
///
///     client.set_listener(|event| match event {
///         Event::Message(message) => println!("{:?}: {}", message.destination, message.body),
///         other => println!("{other:?}"),
///     });
///
///     client.subscribe("/topic/chat");
///     client.connect();
///     client.send("/app/chat", r#"{"text":"hello"}"#, None);
///
///     tokio::signal::ctrl_c().await?;
///     client.disconnect();
///     Ok(())
/// }
/// ```
pub struct Client<T: Transport> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(feature = "ws")]
impl Client<WsTransport> {
    /// Create a client for a `ws://` or `wss://` endpoint. No connection is made until
    /// [`Client::connect`].
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        let url = Url::parse(endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "endpoint scheme must be ws or wss, got {}",
                url.scheme()
            )));
        }

        Self::with_transport(endpoint, config, WsTransport::new())
    }
}

impl<T: Transport> Client<T> {
    /// Create a client that opens its connections through `transport`.
    pub fn with_transport(endpoint: &str, config: Config, transport: T) -> Result<Self> {
        Url::parse(endpoint)?;

        let session = Session {
            state: ConnectionState::Disconnected,
            handle: None,
            generation: 0,
            manual_disconnect: false,
            connect_headers: Headers::new(),
            last_activity: Instant::now(),
            registry: SubscriptionRegistry::new(),
            queue: OutboundQueue::new(config.max_queued_frames),
            policy: ReconnectPolicy::new(config.reconnect.clone()),
            monitor: Monitor::default(),
            reconnect_task: None,
        };

        Ok(Self {
            inner: Arc::new(ClientInner {
                endpoint: endpoint.to_owned(),
                config,
                transport,
                session: Mutex::new(session),
                dispatcher: Dispatcher::default(),
                scheduler: Scheduler::new(),
            }),
        })
    }

    /// Register the event listener, replacing any previous one.
    pub fn set_listener<F>(&self, listener: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.inner.dispatcher.set(Arc::new(listener));
    }

    /// Remove the event listener. Events are dropped until a new one is set.
    pub fn clear_listener(&self) {
        self.inner.dispatcher.clear();
    }

    /// Open the transport and start the handshake with the default `CONNECT` headers.
    pub fn connect(&self) {
        self.connect_with_headers(Headers::new());
    }

    /// Open the transport and start the handshake.
    ///
    /// `headers` are sent in `CONNECT`; `accept-version`, `host` and `heart-beat` are added
    /// only when absent. Calling this while connecting or connected restarts the attempt. The
    /// same headers are used for every automatic reconnect.
    pub fn connect_with_headers(&self, headers: Headers) {
        let mut session = self.inner.session();
        session.manual_disconnect = false;
        session.cancel_reconnect();
        session.connect_headers = headers;

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.inner.endpoint, "Connecting");

        self.inner.open(&mut session);
    }

    /// Tear the session down and suppress reconnection until the next [`Client::connect`].
    ///
    /// A `DISCONNECT` frame is sent on a best-effort basis. `Disconnected("manual disconnect")`
    /// is emitted before this returns, whatever the transport does.
    pub fn disconnect(&self) {
        let mut session = self.inner.session();
        session.manual_disconnect = true;
        session.cancel_reconnect();
        session.monitor.stop();

        if let Some(handle) = session.handle.take() {
            if let Err(e) = handle.send(&Frame::new(Command::Disconnect).encode()) {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %e, "DISCONNECT not delivered, transport already gone");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
            handle.close(NORMAL_CLOSURE, MANUAL_DISCONNECT_REASON);
        }
        session.invalidate();
        session.state = ConnectionState::Disconnected;
        drop(session);

        #[cfg(feature = "tracing")]
        tracing::debug!("Disconnected on request");

        self.inner.dispatcher.emit(Event::Disconnected {
            reason: Some(MANUAL_DISCONNECT_REASON.to_owned()),
        });
    }

    /// Subscribe to `destination` under a generated id, returned.
    pub fn subscribe(&self, destination: &str) -> String {
        self.subscribe_with_headers(destination, None, Headers::new())
    }

    /// Subscribe to `destination` under an explicit id. Re-using an id replaces the previous
    /// subscription.
    pub fn subscribe_with_id(&self, destination: &str, id: &str) -> String {
        self.subscribe_with_headers(destination, Some(id), Headers::new())
    }

    /// Subscribe with extra `SUBSCRIBE` headers.
    ///
    /// The subscription is recorded whatever the state; `SUBSCRIBE` goes out now only when
    /// connected, otherwise with the replay after the next handshake.
    pub fn subscribe_with_headers(
        &self,
        destination: &str,
        id: Option<&str>,
        headers: Headers,
    ) -> String {
        let id = id.map_or_else(generate_id, ToOwned::to_owned);
        let subscription = Subscription::new(id.clone(), destination.to_owned(), headers);
        let frame = subscription.subscribe_frame().encode();

        let mut session = self.inner.session();
        session.registry.add(subscription);

        #[cfg(feature = "tracing")]
        tracing::debug!(%id, destination, state = ?session.state, "Subscribing");

        if session.state.is_connected() {
            session.transmit(&frame);
        }
        id
    }

    /// Remove the subscription `id`, returning it if it was registered. `UNSUBSCRIBE` goes out
    /// only when connected.
    pub fn unsubscribe(&self, id: &str) -> Option<Subscription> {
        let mut session = self.inner.session();
        let removed = session.registry.remove(id);

        if removed.is_some() && session.state.is_connected() {
            session.transmit(&unsubscribe_frame(id).encode());
        }
        removed
    }

    /// Remove every subscription, returning what was registered.
    pub fn unsubscribe_all(&self) -> Vec<Subscription> {
        let mut session = self.inner.session();
        let removed = session.registry.clear();

        if session.state.is_connected() {
            for subscription in &removed {
                session.transmit(&subscription.unsubscribe_frame().encode());
            }
        }
        removed
    }

    /// Send `body` to `destination`, requesting a receipt when `receipt` is given.
    ///
    /// Transmitted immediately when connected, otherwise queued and flushed in order after the
    /// next handshake.
    pub fn send(&self, destination: &str, body: &str, receipt: Option<&str>) {
        if body.contains(NUL) {
            self.inner.dispatcher.emit(Event::Error(Error::validation(
                "message body must not contain NUL",
            )));
            return;
        }

        let mut frame = Frame::new(Command::Send).header("destination", destination);
        if let Some(receipt) = receipt {
            frame = frame.header("receipt", receipt);
        }
        let frame = frame
            .header("content-type", self.inner.config.content_type.as_str())
            .header("content-length", body.len().to_string())
            .with_body(body);

        self.inner.send_or_enqueue(frame.encode());
    }

    /// Serialize `payload` as JSON and [`send`](Self::send) it.
    pub fn send_json<P: Serialize>(
        &self,
        destination: &str,
        payload: &P,
        receipt: Option<&str>,
    ) -> Result<()> {
        let body = serde_json::to_string(payload)?;
        self.send(destination, &body, receipt);
        Ok(())
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.session().state
    }

    /// Registered subscriptions, in replay order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.session().registry.snapshot()
    }

    /// Number of frames waiting for a connection.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.session().queue.len()
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

struct ClientInner<T: Transport> {
    /// Endpoint handed to the transport on every open
    endpoint: String,
    config: Config,
    transport: T,
    /// Every piece of mutable session state, behind one lock
    session: Mutex<Session<T::Handle>>,
    dispatcher: Dispatcher,
    /// Lane for heartbeats, liveness checks, drains and reconnect attempts
    scheduler: Scheduler,
}

struct Session<H> {
    state: ConnectionState,
    handle: Option<H>,
    /// Identifies the current transport connection; callbacks carrying another value are stale
    generation: u64,
    manual_disconnect: bool,
    connect_headers: Headers,
    /// Last inbound transport activity, frame or heartbeat
    last_activity: Instant,
    registry: SubscriptionRegistry,
    queue: OutboundQueue,
    policy: ReconnectPolicy,
    monitor: Monitor,
    reconnect_task: Option<CancellationToken>,
}

impl<H: TransportHandle> Session<H> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && !self.manual_disconnect
    }

    /// Detach every callback of the current connection.
    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn cancel_reconnect(&mut self) {
        if let Some(token) = self.reconnect_task.take() {
            token.cancel();
        }
    }

    /// Best-effort transmission on the current handle.
    fn transmit(&self, text: &str) {
        let Some(handle) = &self.handle else {
            return;
        };
        if let Err(e) = handle.send(text) {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %e, "Unable to transmit frame");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }
    }
}

impl<T: Transport> ClientInner<T> {
    fn session(&self) -> MutexGuard<'_, Session<T::Handle>> {
        // Every field stays individually valid, recover from poisoning
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current connection, if any, with a fresh transport open.
    fn open(self: &Arc<Self>, session: &mut Session<T::Handle>) {
        session.monitor.stop();
        if let Some(previous) = session.handle.take() {
            previous.close(NORMAL_CLOSURE, "reconnecting");
        }
        session.invalidate();
        session.state = ConnectionState::Connecting;

        let listener = Arc::new(SessionListener {
            inner: Arc::downgrade(self),
            generation: session.generation,
        });
        session.handle = Some(self.transport.open(&self.endpoint, listener));
    }

    fn connect_frame(&self, caller: &Headers) -> Frame {
        let mut headers = caller.clone();
        headers.insert_if_absent("accept-version", ACCEPT_VERSION);
        headers.insert_if_absent("host", self.config.host.as_str());
        headers.insert_if_absent("heart-beat", self.config.heart_beat_header());
        Frame::new(Command::Connect).with_headers(headers)
    }

    fn handle_open(self: &Arc<Self>, generation: u64) {
        let mut session = self.session();
        if !session.is_current(generation) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(generation, "Transport open, sending CONNECT");

        session.last_activity = Instant::now();
        let frame = self.connect_frame(&session.connect_headers);
        session.transmit(&frame.encode());
        self.start_monitor(&mut session, generation);
        drop(session);

        self.request_drain();
    }

    fn start_monitor(self: &Arc<Self>, session: &mut Session<T::Handle>, generation: u64) {
        let weak = Arc::downgrade(self);
        let heartbeat = move || {
            if let Some(inner) = weak.upgrade() {
                inner.send_heartbeat();
            }
        };

        let weak = Arc::downgrade(self);
        let liveness = move || {
            if let Some(inner) = weak.upgrade() {
                inner.check_liveness();
            }
        };

        session
            .monitor
            .start(&self.scheduler, &self.config, heartbeat, liveness);

        if let Some(timeout) = self.config.connect_timeout {
            let weak = Arc::downgrade(self);
            let token = self.scheduler.schedule(timeout, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.check_handshake(generation);
                }
            });
            session.monitor.watch_handshake(token);
        }
    }

    fn handle_message(self: &Arc<Self>, generation: u64, text: &str) {
        {
            let mut session = self.session();
            if !session.is_current(generation) {
                return;
            }
            session.last_activity = Instant::now();
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(text = %text.replace(NUL, "\\0"), "Received transport message");

        for frame in decode(text) {
            self.handle_frame(generation, frame);
        }
    }

    fn handle_frame(self: &Arc<Self>, generation: u64, frame: Frame) {
        match frame.command {
            Command::Connected => {
                let mut session = self.session();
                if !session.is_current(generation) {
                    return;
                }
                session.policy.reset();
                session.state = ConnectionState::Connected;
                session.monitor.handshake_done();

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    subscriptions = session.registry.len(),
                    queued = session.queue.len(),
                    "Session connected, replaying subscriptions"
                );

                for subscription in session.registry.iter() {
                    session.transmit(&subscription.subscribe_frame().encode());
                }
                drop(session);

                self.dispatcher.emit(Event::Connected);
                self.request_drain();
            }
            Command::Message => {
                let destination = frame.headers.get("destination").map(ToOwned::to_owned);
                let body = frame.body.unwrap_or_default();
                self.dispatcher
                    .emit(Event::Message(Message::new(destination, body, frame.headers)));
            }
            Command::Receipt => {
                let receipt_id = frame
                    .headers
                    .get("receipt-id")
                    .unwrap_or(UNKNOWN_RECEIPT)
                    .to_owned();
                self.dispatcher.emit(Event::Receipt { receipt_id });
            }
            Command::Error => {
                #[cfg(feature = "tracing")]
                tracing::warn!(body = ?frame.body, "Server sent ERROR");

                let error = ServerError {
                    message: frame.body.unwrap_or_else(|| "STOMP ERROR".to_owned()),
                    headers: frame.headers,
                };
                self.dispatcher.emit(Event::Error(error.into()));
            }
            _ => {
                #[cfg(feature = "tracing")]
                tracing::trace!(command = %frame.command, "Ignoring client-bound command");
            }
        }
    }

    fn handle_closed(self: &Arc<Self>, generation: u64, code: u16, reason: &str) {
        let mut session = self.session();
        if !session.is_current(generation) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(code, reason, "Transport closed");

        session.handle = None;
        self.connection_lost(&mut session);
        drop(session);

        self.dispatcher.emit(Event::Disconnected {
            reason: Some(format!("closed: {code} {reason}")),
        });
    }

    fn handle_failure(self: &Arc<Self>, generation: u64, error: Error) {
        let mut session = self.session();
        if !session.is_current(generation) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(error = %error, "Transport failed");

        session.handle = None;
        self.connection_lost(&mut session);
        drop(session);

        self.dispatcher.emit(Event::Error(error));
    }

    /// Leave `Connected`/`Connecting` after the current connection died or was abandoned.
    fn connection_lost(self: &Arc<Self>, session: &mut Session<T::Handle>) {
        session.monitor.stop();
        session.invalidate();
        session.state = ConnectionState::Disconnected;
        self.schedule_reconnect(session);
    }

    /// Close the current connection ourselves and treat it as lost.
    fn force_close(self: &Arc<Self>, session: &mut Session<T::Handle>, reason: &str) {
        if let Some(handle) = session.handle.take() {
            handle.close(GOING_AWAY, reason);
        }
        self.connection_lost(session);
    }

    fn schedule_reconnect(self: &Arc<Self>, session: &mut Session<T::Handle>) {
        if session.manual_disconnect {
            return;
        }
        let Some(delay) = session.policy.next_backoff() else {
            #[cfg(feature = "tracing")]
            tracing::debug!("Reconnect disabled, staying disconnected");
            return;
        };

        #[cfg(feature = "tracing")]
        tracing::info!(attempt = session.policy.attempt(), ?delay, "Scheduling reconnect");

        let weak = Arc::downgrade(self);
        let token = self.scheduler.schedule(delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.reconnect_now();
            }
        });

        session.cancel_reconnect();
        session.reconnect_task = Some(token);
    }

    fn reconnect_now(self: &Arc<Self>) {
        let mut session = self.session();
        // Re-checked at fire time, a disconnect during the backoff window wins
        if session.manual_disconnect || session.state != ConnectionState::Disconnected {
            return;
        }
        session.reconnect_task = None;

        #[cfg(feature = "tracing")]
        tracing::info!(attempt = session.policy.attempt(), "Reconnecting");

        self.open(&mut session);
    }

    fn send_heartbeat(&self) {
        let session = self.session();
        if session.state.is_connected() {
            session.transmit(HEARTBEAT);
        }
    }

    fn check_liveness(self: &Arc<Self>) {
        let mut session = self.session();
        if !session.state.is_connected()
            || !heartbeat::is_stale(
                session.last_activity,
                Instant::now(),
                self.config.server_timeout,
            )
        {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            silence = ?session.last_activity.elapsed(),
            timeout = ?self.config.server_timeout,
            "No server activity, closing connection"
        );

        self.force_close(&mut session, SERVER_TIMEOUT_REASON);
        drop(session);

        self.dispatcher.emit(Event::Disconnected {
            reason: Some(SERVER_TIMEOUT_REASON.to_owned()),
        });
    }

    fn check_handshake(self: &Arc<Self>, generation: u64) {
        let mut session = self.session();
        if !session.is_current(generation) || session.state != ConnectionState::Connecting {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(timeout = ?self.config.connect_timeout, "Handshake not acknowledged");

        self.force_close(&mut session, CONNECT_TIMEOUT_REASON);
        drop(session);

        self.dispatcher.emit(Event::Disconnected {
            reason: Some(CONNECT_TIMEOUT_REASON.to_owned()),
        });
    }

    /// Transmit now when connected and nothing is waiting, otherwise append to the queue.
    fn send_or_enqueue(self: &Arc<Self>, encoded: String) {
        let mut session = self.session();

        if session.state.is_connected()
            && session.queue.is_empty()
            && let Some(handle) = &session.handle
        {
            match handle.send(&encoded) {
                Ok(()) => return,
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "Send failed, queueing frame");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &e;
                }
            }
        }

        let rejected = session.queue.enqueue(encoded).is_err();
        let connected = session.state.is_connected();
        drop(session);

        if rejected {
            #[cfg(feature = "tracing")]
            tracing::warn!("Outbound queue full, dropping frame");

            self.dispatcher
                .emit(Event::Error(Error::validation("outbound queue is full")));
        } else if connected {
            self.request_drain();
        }
    }

    fn request_drain(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.scheduler.execute(move || {
            if let Some(inner) = weak.upgrade() {
                inner.drain_queue();
            }
        });
    }

    /// Flush queued frames in order while connected.
    fn drain_queue(&self) {
        let mut guard = self.session();
        let session = &mut *guard;
        if !session.state.is_connected() {
            return;
        }
        let Some(handle) = session.handle.as_ref() else {
            return;
        };

        let sent = session
            .queue
            .drain_in_order(|frame| handle.send(&frame).map_err(|_e| frame));

        if sent > 0 {
            #[cfg(feature = "tracing")]
            tracing::debug!(sent, remaining = session.queue.len(), "Drained outbound queue");
        }
    }
}

/// Routes transport callbacks of one connection back to the client.
struct SessionListener<T: Transport> {
    inner: Weak<ClientInner<T>>,
    generation: u64,
}

impl<T: Transport> TransportListener for SessionListener<T> {
    fn on_open(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_open(self.generation);
        }
    }

    fn on_message(&self, text: &str) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_message(self.generation, text);
        }
    }

    fn on_closed(&self, code: u16, reason: &str) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_closed(self.generation, code, reason);
        }
    }

    fn on_failure(&self, error: Error) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_failure(self.generation, error);
        }
    }
}
