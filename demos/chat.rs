//! Minimal chat client against a STOMP-over-WebSocket broker.
//!
//! Subscribes to a topic, sends one greeting (queued until the handshake completes), prints
//! every event, and disconnects on Ctrl-C. Kill the broker while it runs to watch the client
//! reconnect and resubscribe.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=debug cargo run --example chat --features tracing -- ws://localhost:15674/ws
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stomp_ws_client::stomp::{Client, Event, Headers};
use stomp_ws_client::ws::config::{Config, ReconnectConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TOPIC: &str = "/topic/chat";

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    sender: String,
    text: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:15674/ws".to_owned());

    let config = Config::builder()
        .heartbeat_interval(Duration::from_secs(10))
        .server_timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .reconnect(
            ReconnectConfig::builder()
                .initial_backoff(Duration::from_millis(500))
                .max_backoff(Duration::from_secs(15))
                .build(),
        )
        .build();
    let client = Client::new(&endpoint, config)?;

    client.set_listener(|event| match event {
        Event::Connected => info!("connected"),
        Event::Disconnected { reason } => warn!(?reason, "disconnected"),
        Event::Message(message) => match message.json::<ChatMessage>() {
            Ok(chat) => info!(sender = %chat.sender, text = %chat.text, "chat"),
            Err(e) => warn!(error = %e, body = %message.body, "unreadable message"),
        },
        Event::Receipt { receipt_id } => info!(%receipt_id, "receipt"),
        Event::Error(e) => warn!(error = %e, "error"),
    });

    let id = client.subscribe(TOPIC);
    info!(%id, destination = TOPIC, "subscribed");

    client.connect_with_headers(Headers::from([("login", "guest"), ("passcode", "guest")]));

    client.send_json(
        TOPIC,
        &ChatMessage {
            sender: "demo".to_owned(),
            text: "hello".to_owned(),
        },
        Some("greeting"),
    )?;
    info!(queued = client.queued(), state = ?client.state(), "greeting sent");

    tokio::signal::ctrl_c().await?;
    client.disconnect();

    Ok(())
}
