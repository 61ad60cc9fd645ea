//! Delta transport - best-effort, fire-and-forget, in order
//!
//! The transport serializes deltas into wire frames and pushes them over a
//! single shared outbound channel that an external collaborator keeps open to
//! the target process. This component does not open, retry, or multiplex that
//! channel; it only guarantees frames leave in the order `send` is called and
//! that a dead channel is reported synchronously to the caller.

pub mod wire;

use crate::core::error::{Result, TransportError};
use crate::system::metrics::Metrics;
use crate::types::ModuleDelta;
use async_trait::async_trait;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

pub use wire::PatchMessage;

/// One already-open ordered outbound stream to the target process.
#[async_trait]
pub trait PatchChannel: Send {
    /// Push one frame. Failure must surface here, synchronously to the
    /// caller, never be swallowed.
    async fn send(&mut self, frame: Vec<u8>) -> std::result::Result<(), TransportError>;
}

/// WebSocket-backed channel for hosts that hand over a connected socket.
pub struct WebSocketChannel {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketChannel {
    /// Wrap an already-connected socket
    pub fn new(socket: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self { socket }
    }

    /// Connect to a channel endpoint.
    ///
    /// Offered as a convenience for drivers; the producer core itself never
    /// initiates connections.
    pub async fn connect(endpoint: &str) -> std::result::Result<Self, TransportError> {
        let (socket, _) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self::new(socket))
    }
}

#[async_trait]
impl PatchChannel for WebSocketChannel {
    async fn send(&mut self, frame: Vec<u8>) -> std::result::Result<(), TransportError> {
        self.socket
            .send(Message::Binary(frame))
            .await
            .map_err(|e| match e {
                tokio_tungstenite::tungstenite::Error::ConnectionClosed
                | tokio_tungstenite::tungstenite::Error::AlreadyClosed => {
                    TransportError::ChannelClosed
                }
                other => TransportError::Send(other.to_string()),
            })
    }
}

/// Serializes deltas and pushes them over the channel in call order.
pub struct PatchSender<Ch> {
    channel: Ch,
}

impl<Ch: PatchChannel> PatchSender<Ch> {
    /// Create a sender over an already-open channel
    pub fn new(channel: Ch) -> Self {
        Self { channel }
    }

    /// Serialize and send one delta.
    ///
    /// Ordering follows call order because the channel is a single ordered
    /// stream; no acknowledgement is expected or awaited.
    pub async fn send(&mut self, delta: &ModuleDelta) -> Result<()> {
        let frame = wire::encode(delta)?;
        let frame_len = frame.len();

        match self.channel.send(frame).await {
            Ok(()) => {
                let metrics = Metrics::global();
                metrics.transport.messages_sent.inc();
                metrics.transport.bytes_sent.inc_by(frame_len as u64);
                debug!(
                    module = %delta.module_name,
                    digest = %delta.digest(),
                    bytes = frame_len,
                    "patch message sent"
                );
                Ok(())
            }
            Err(e) => {
                Metrics::global().transport.send_failures.inc();
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Channel that records frames, or fails on demand
    struct RecordingChannel {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        fail_with: Option<fn() -> TransportError>,
    }

    #[async_trait]
    impl PatchChannel for RecordingChannel {
        async fn send(&mut self, frame: Vec<u8>) -> std::result::Result<(), TransportError> {
            if let Some(make_error) = self.fail_with {
                return Err(make_error());
            }
            self.frames.lock().push(frame);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_encodes_and_pushes_in_call_order() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let mut sender = PatchSender::new(RecordingChannel {
            frames: Arc::clone(&frames),
            fail_with: None,
        });

        let first = ModuleDelta::new("app.bin", vec![1], vec![2], vec![3]);
        let second = ModuleDelta::new("app.bin", vec![4], vec![5], vec![6]);
        sender.send(&first).await.unwrap();
        sender.send(&second).await.unwrap();

        let frames = frames.lock();
        assert_eq!(frames.len(), 2);
        assert_eq!(wire::decode(&frames[0]).unwrap().into_delta(), first);
        assert_eq!(wire::decode(&frames[1]).unwrap().into_delta(), second);
    }

    #[tokio::test]
    async fn test_send_surfaces_channel_failure_synchronously() {
        let mut sender = PatchSender::new(RecordingChannel {
            frames: Arc::new(Mutex::new(Vec::new())),
            fail_with: Some(|| TransportError::ChannelClosed),
        });

        let delta = ModuleDelta::new("app.bin", vec![1], vec![2], vec![3]);
        let result = sender.send(&delta).await;

        match result {
            Err(Error::Transport(TransportError::ChannelClosed)) => {}
            other => panic!("expected ChannelClosed, got {:?}", other),
        }
    }
}
