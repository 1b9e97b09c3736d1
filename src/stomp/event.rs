use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;

use super::frame::Headers;
use crate::Result;
use crate::error::Error;

/// Sentinel receipt id reported when a `RECEIPT` frame lacks the `receipt-id` header.
pub const UNKNOWN_RECEIPT: &str = "unknown";

/// Session events delivered to the registered listener.
#[expect(
    clippy::exhaustive_enums,
    reason = "Listeners are expected to handle every session event"
)]
#[derive(Debug)]
pub enum Event {
    /// The server acknowledged the handshake
    Connected,
    /// The session is no longer connected
    Disconnected {
        /// Why, when known (`manual disconnect`, `server timeout`, `closed: <code> <reason>`)
        reason: Option<String>,
    },
    /// A transport failure, a server `ERROR` frame, or a rejected request
    Error(Error),
    /// A `MESSAGE` frame from a subscription
    Message(Message),
    /// The server acknowledged a frame sent with a `receipt` header
    Receipt {
        /// The `receipt-id` header, or [`UNKNOWN_RECEIPT`]
        receipt_id: String,
    },
}

/// Payload of a `MESSAGE` frame.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The `destination` header, if the server sent one
    pub destination: Option<String>,
    /// Frame body, empty when absent
    pub body: String,
    /// Every header of the frame
    pub headers: Headers,
}

impl Message {
    #[must_use]
    pub fn new(destination: Option<String>, body: String, headers: Headers) -> Self {
        Self {
            destination,
            body,
            headers,
        }
    }

    /// The `subscription` header, identifying which subscription produced this message.
    #[must_use]
    pub fn subscription(&self) -> Option<&str> {
        self.headers.get("subscription")
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Callback receiving session events.
pub type Listener = Arc<dyn Fn(Event) + Send + Sync + 'static>;

/// Single-slot event dispatcher. Registering a listener replaces the previous one.
///
/// Events are delivered synchronously on the calling task. The slot lock is released before
/// the listener runs, so a listener may call back into the client.
#[derive(Default)]
pub(crate) struct Dispatcher {
    slot: RwLock<Option<Listener>>,
}

impl Dispatcher {
    pub(crate) fn set(&self, listener: Listener) {
        // Option<Listener> has no inconsistent intermediate state, recover from poisoning
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    pub(crate) fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn emit(&self, event: Event) {
        let listener = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match listener {
            Some(listener) => listener(event),
            None => {
                #[cfg(feature = "tracing")]
                tracing::trace!(?event, "No listener registered, dropping event");
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("Dispatcher")
            .field("registered", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde::Deserialize;

    use super::*;

    #[test]
    fn last_listener_wins() {
        let dispatcher = Dispatcher::default();
        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&first);
        dispatcher.set(Arc::new(move |_: Event| *counter.lock().unwrap() += 1));
        dispatcher.emit(Event::Connected);

        let counter = Arc::clone(&second);
        dispatcher.set(Arc::new(move |_: Event| *counter.lock().unwrap() += 1));
        dispatcher.emit(Event::Connected);

        assert_eq!(*first.lock().unwrap(), 1);
        assert_eq!(*second.lock().unwrap(), 1);
    }

    #[test]
    fn emit_without_listener_is_silent() {
        let dispatcher = Dispatcher::default();
        dispatcher.emit(Event::Disconnected { reason: None });

        dispatcher.set(Arc::new(|_: Event| panic!("cleared listener must not run")));
        dispatcher.clear();
        dispatcher.emit(Event::Connected);
    }

    #[test]
    fn message_json_should_succeed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Chat {
            sender: String,
            text: String,
        }

        let message = Message::new(
            Some("/topic/chat".to_owned()),
            r#"{"sender":"ana","text":"hi"}"#.to_owned(),
            Headers::from([("subscription", "sub-1")]),
        );

        let chat: Chat = message.json().unwrap();
        assert_eq!(
            chat,
            Chat {
                sender: "ana".to_owned(),
                text: "hi".to_owned()
            }
        );
        assert_eq!(message.subscription(), Some("sub-1"));
    }
}
