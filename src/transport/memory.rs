//! Channel-backed transport.
//!
//! [`pair`] returns the transport handed to the WS client and the
//! [`MemoryPeer`] that plays the server: it observes outbound frames and
//! injects inbound ones.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{FrameReader, FrameWriter, Transport};
use crate::error::TransportError;

/// Client side of an in-memory connection.
pub struct MemoryTransport {
    inbound_rx: mpsc::UnboundedReceiver<String>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

/// Server side of an in-memory connection.
pub struct MemoryPeer {
    inbound_tx: Option<mpsc::UnboundedSender<String>>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
}

/// Create a connected transport/peer pair.
pub fn pair() -> (MemoryTransport, MemoryPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            inbound_rx,
            outbound_tx,
        },
        MemoryPeer {
            inbound_tx: Some(inbound_tx),
            outbound_rx,
        },
    )
}

impl MemoryPeer {
    /// Push an inbound frame to the client. Returns false once closed.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        match &self.inbound_tx {
            Some(tx) => tx.send(frame.into()).is_ok(),
            None => false,
        }
    }

    /// End the inbound stream; the client reads EOF.
    pub fn close(&mut self) {
        self.inbound_tx.take();
    }

    /// Next frame the client wrote. `None` once the client side is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound_rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.outbound_rx.try_recv().ok()
    }
}

struct MemoryReader {
    rx: mpsc::UnboundedReceiver<String>,
}

struct MemoryWriter {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn read(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn write(&mut self, frame: String) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed {
            code: None,
            reason: "peer dropped".into(),
        })
    }
}

impl Transport for MemoryTransport {
    fn split(self) -> (Box<dyn FrameReader>, Box<dyn FrameWriter>) {
        (
            Box::new(MemoryReader {
                rx: self.inbound_rx,
            }),
            Box::new(MemoryWriter {
                tx: self.outbound_tx,
            }),
        )
    }
}
