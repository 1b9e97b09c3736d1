//! STOMP 1.2 session layer.
//!
//! This module implements a resilient STOMP client on top of any [`Transport`](crate::ws::Transport).
//!
//! # Overview
//!
//! - [`Client`]: the connection manager. Owns the session state and exposes
//!   connect/disconnect/subscribe/unsubscribe/send
//! - [`frame`]: text frame codec ([`Frame`], [`Headers`], [`Command`])
//! - [`subscription`]: the registry replayed after every handshake
//! - [`queue`]: `SEND` frames buffered while disconnected
//! - [`reconnect`]: exponential backoff between attempts
//! - [`event`]: events delivered to the registered listener
//!
//! ## Session lifecycle
//!
//! | From | Trigger | To |
//! |------|---------|----|
//! | `Disconnected` | [`Client::connect`] or reconnect timer | `Connecting` |
//! | `Connecting` | `CONNECTED` frame | `Connected` |
//! | `Connecting`/`Connected` | close, failure, liveness or handshake timeout | `Disconnected` |
//! | any | [`Client::disconnect`] | `Disconnected` (no reconnect) |
//!
//! Outside a manual disconnect, every transition to `Disconnected` schedules a reconnect attempt
//! when reconnection is enabled. The backoff restarts from its initial delay after each
//! successful handshake.

pub mod client;
pub mod event;
pub mod frame;
pub(crate) mod heartbeat;
pub mod queue;
pub mod reconnect;
pub(crate) mod scheduler;
pub mod subscription;

pub use client::{ACCEPT_VERSION, Client, ConnectionState, MANUAL_DISCONNECT_REASON};
pub use event::{Event, Listener, Message, UNKNOWN_RECEIPT};
pub use frame::{Command, Frame, Headers};
pub use heartbeat::{CONNECT_TIMEOUT_REASON, SERVER_TIMEOUT_REASON};
pub use subscription::Subscription;
