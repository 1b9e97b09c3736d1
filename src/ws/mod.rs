//! Transport infrastructure.
//!
//! The STOMP core talks to the network only through the traits in [`traits`], so any
//! message-oriented text transport can carry it. With the `ws` feature this module also ships
//! [`WsTransport`], a WebSocket implementation built on `tokio-tungstenite`.
//!
//! # Architecture
//!
//! - [`Transport`]: opens connections and hands out a [`TransportHandle`] per connection
//! - [`TransportListener`]: receives open/message/close/failure notifications
//! - [`config::Config`]: session configuration (heartbeats, liveness, reconnection)

pub mod config;
#[cfg(feature = "ws")]
pub mod connection;
pub mod error;
pub mod traits;

#[cfg(feature = "ws")]
pub use connection::{WsHandle, WsTransport};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
