//! Transport connectors
//!
//! The agent only sees a [`Transport`]: a pair of text-frame channels. A
//! [`Connector`] opens one. [`WsConnector`] does it over a WebSocket, with a
//! bridge task pumping frames between the socket and the channels; the
//! inbound channel closes as soon as the socket ends or fails.

use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::PresenceError;

const FRAME_BUFFER: usize = 32;

/// An open connection, as seen by the agent
pub struct Transport {
    /// Text frames to send to the server
    pub outbound: mpsc::Sender<String>,
    /// Text frames received from the server; `None` once the connection ends
    pub inbound: mpsc::Receiver<String>,
}

/// Opens transports to the notification server
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'static, Result<Transport, PresenceError>>;
}

/// WebSocket connector (`ws://host:port/ws`)
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WsConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Transport, PresenceError>> {
        let url = self.url.clone();

        async move {
            let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| PresenceError::Connect(e.to_string()))?;
            let (mut sink, mut source) = stream.split();

            let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(FRAME_BUFFER);
            let (inbound_tx, inbound_rx) = mpsc::channel::<String>(FRAME_BUFFER);

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        frame = outbound_rx.recv() => {
                            let Some(text) = frame else {
                                let _ = sink.send(Message::Close(None)).await;
                                break;
                            };
                            if sink.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        message = source.next() => {
                            match message {
                                Some(Ok(Message::Text(text))) => {
                                    if inbound_tx.send(text).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => break,
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    debug!("WebSocket read error: {}", e);
                                    break;
                                }
                            }
                        }
                    }
                }
                debug!("WebSocket bridge finished");
            });

            Ok(Transport {
                outbound: outbound_tx,
                inbound: inbound_rx,
            })
        }
        .boxed()
    }
}
