use std::sync::Arc;

use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use super::error::WsError;
use super::traits::{Transport, TransportHandle, TransportListener};
use crate::Result;

/// Close code reported when the server closes without a close frame payload.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Commands accepted by the connection task.
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// [`Transport`] backed by `tokio-tungstenite`.
///
/// Every [`Transport::open`] spawns one background task that owns the socket. Inbound text and
/// binary (decoded as UTF-8) messages are forwarded to the listener from that task; outbound
/// traffic is fed to it over an unbounded channel, so [`TransportHandle::send`] never blocks.
///
/// Must be used from within a Tokio runtime.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Drive one connection until it closes, fails, or every handle is dropped.
    async fn connection_task(
        endpoint: String,
        mut sender_rx: mpsc::UnboundedReceiver<Outbound>,
        listener: Arc<dyn TransportListener>,
    ) {
        let ws_stream = match connect_async(endpoint.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%endpoint, error = %e, "Unable to connect");
                listener.on_failure(e.into());
                return;
            }
        };

        listener.on_open();

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            listener.on_message(text.as_str());
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            listener.on_message(&String::from_utf8_lossy(&bytes));
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame.map_or_else(
                                || (NO_STATUS_RECEIVED, String::new()),
                                |f| (u16::from(f.code), f.reason.as_str().to_owned()),
                            );
                            listener.on_closed(code, &reason);
                            return;
                        }
                        Some(Ok(_)) => {
                            // Ping/pong are answered by tungstenite itself.
                        }
                        Some(Err(e)) => {
                            listener.on_failure(e.into());
                            return;
                        }
                        None => {
                            listener.on_failure(WsError::ConnectionClosed.into());
                            return;
                        }
                    }
                }

                outbound = sender_rx.recv() => {
                    match outbound {
                        Some(Outbound::Text(text)) => {
                            if let Err(e) = write.send(Message::Text(text.into())).await {
                                listener.on_failure(e.into());
                                return;
                            }
                        }
                        Some(Outbound::Close { code, reason }) => {
                            let frame = CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            };
                            _ = write.send(Message::Close(Some(frame))).await;
                            _ = write.close().await;
                            return;
                        }
                        None => {
                            // Every handle is gone
                            _ = write.close().await;
                            return;
                        }
                    }
                }
            }
        }
    }
}

impl Transport for WsTransport {
    type Handle = WsHandle;

    fn open(&self, endpoint: &str, listener: Arc<dyn TransportListener>) -> Self::Handle {
        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let endpoint = endpoint.to_owned();

        tokio::spawn(async move {
            Self::connection_task(endpoint, sender_rx, listener).await;
        });

        WsHandle { sender_tx }
    }
}

/// Handle to a connection opened by [`WsTransport`].
#[derive(Debug, Clone)]
pub struct WsHandle {
    sender_tx: mpsc::UnboundedSender<Outbound>,
}

impl TransportHandle for WsHandle {
    fn send(&self, text: &str) -> Result<()> {
        self.sender_tx
            .send(Outbound::Text(text.to_owned()))
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        _ = self.sender_tx.send(Outbound::Close {
            code,
            reason: reason.to_owned(),
        });
    }
}
