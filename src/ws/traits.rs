//! Core traits for the message transport consumed by the STOMP client.
//!
//! The client never opens sockets itself. It asks a [`Transport`] to open a connection and
//! receives notifications through a [`TransportListener`]; outbound text goes through the
//! returned [`TransportHandle`].

use std::sync::Arc;

use crate::Result;
use crate::error::Error;

/// Opens message-oriented, bidirectional text connections.
///
/// # Contract
///
/// Listener callbacks must be delivered asynchronously, never from inside [`Transport::open`],
/// [`TransportHandle::send`] or [`TransportHandle::close`]. Exactly one of
/// [`TransportListener::on_closed`] or [`TransportListener::on_failure`] ends a connection that
/// was not closed locally.
pub trait Transport: Send + Sync + 'static {
    /// Handle to one open (or opening) connection.
    type Handle: TransportHandle;

    /// Start opening a connection to `endpoint`, reporting progress to `listener`.
    fn open(&self, endpoint: &str, listener: Arc<dyn TransportListener>) -> Self::Handle;
}

/// Outbound side of a single connection.
pub trait TransportHandle: Send + Sync + 'static {
    /// Queue `text` for transmission as one transport message.
    ///
    /// Errors mean the connection can no longer carry frames.
    fn send(&self, text: &str) -> Result<()>;

    /// Close the connection with a WebSocket-style close code and reason.
    fn close(&self, code: u16, reason: &str);
}

/// Inbound notifications of a single connection.
pub trait TransportListener: Send + Sync + 'static {
    /// The connection is open and ready to carry frames.
    fn on_open(&self);

    /// A text message arrived.
    fn on_message(&self, text: &str);

    /// The remote end closed the connection.
    fn on_closed(&self, code: u16, reason: &str);

    /// The connection failed, either while opening or afterwards.
    fn on_failure(&self, error: Error);
}
