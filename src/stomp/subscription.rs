#![expect(
    clippy::module_name_repetitions,
    reason = "Subscription types deliberately include the module name for clarity"
)]

use tokio::time::Instant;
use uuid::Uuid;

use super::frame::{Command, Frame, Headers};

/// `ack` mode requested for every subscription.
const ACK_MODE: &str = "auto";

/// Information about a registered subscription.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Unique subscription id, echoed by the server in the `subscription` header of `MESSAGE`
    pub id: String,
    /// Destination the subscription targets
    pub destination: String,
    /// Header snapshot used to rebuild `SUBSCRIBE` on every handshake
    pub headers: Headers,
    /// When the subscription was registered
    pub created_at: Instant,
}

impl Subscription {
    /// Build a subscription. `id`, `destination` and `ack` come first in the header snapshot,
    /// followed by `extra` (which cannot override them).
    #[must_use]
    pub fn new(id: String, destination: String, extra: Headers) -> Self {
        let mut headers = Headers::from([
            ("id", id.as_str()),
            ("destination", destination.as_str()),
            ("ack", ACK_MODE),
        ]);
        for (key, value) in extra {
            headers.insert_if_absent(key, value);
        }

        Self {
            id,
            destination,
            headers,
            created_at: Instant::now(),
        }
    }

    /// `SUBSCRIBE` frame for this subscription.
    #[must_use]
    pub fn subscribe_frame(&self) -> Frame {
        Frame::new(Command::Subscribe).with_headers(self.headers.clone())
    }

    /// `UNSUBSCRIBE` frame for this subscription.
    #[must_use]
    pub fn unsubscribe_frame(&self) -> Frame {
        unsubscribe_frame(&self.id)
    }
}

pub(crate) fn unsubscribe_frame(id: &str) -> Frame {
    Frame::new(Command::Unsubscribe).header("id", id)
}

/// Generate a fresh subscription id.
#[must_use]
pub fn generate_id() -> String {
    format!("sub-{}", Uuid::new_v4().simple())
}

/// Subscriptions that must exist on the server, kept in registration order.
///
/// The registry outlives individual transport connections: it is replayed after every
/// successful handshake.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Subscription>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscription`. Re-using an id replaces the previous entry in its original
    /// position.
    pub fn add(&mut self, subscription: Subscription) {
        match self.entries.iter_mut().find(|s| s.id == subscription.id) {
            Some(existing) => *existing = subscription,
            None => self.entries.push(subscription),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Subscription> {
        let index = self.entries.iter().position(|s| s.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Remove everything, returning what was registered.
    pub fn clear(&mut self) -> Vec<Subscription> {
        std::mem::take(&mut self.entries)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.entries.iter().find(|s| s.id == id)
    }

    /// Registered subscriptions in replay order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
