//! Byte-level transports under the WS client.
//!
//! A transport is split into a [`FrameReader`] and a [`FrameWriter`] half so
//! the WS client's dispatch task can read and write concurrently. Every
//! implementation speaks the same text framing (see `crate::ws`), which is
//! what lets a replayed capture stand in for the live socket.
//!
//! - `native` → `tokio-tungstenite` socket with the broker handshake
//! - `memory` → channel pair, for tests and embedding
//! - `replay` → deterministic replay of a recorded capture, plus the recorder

pub mod memory;
pub mod replay;

#[cfg(feature = "native")]
pub mod native;

use async_trait::async_trait;

use crate::error::TransportError;

/// Receiving half of a transport.
#[async_trait]
pub trait FrameReader: Send {
    /// Next inbound text frame. `Ok(None)` is end of stream.
    async fn read(&mut self) -> Result<Option<String>, TransportError>;
}

/// Sending half of a transport.
#[async_trait]
pub trait FrameWriter: Send {
    async fn write(&mut self, frame: String) -> Result<(), TransportError>;

    /// Release the connection. Default: nothing to release.
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A connected transport that can be split into halves.
pub trait Transport {
    fn split(self) -> (Box<dyn FrameReader>, Box<dyn FrameWriter>);
}

/// Transport assembled from already-split halves.
pub struct Halves {
    pub reader: Box<dyn FrameReader>,
    pub writer: Box<dyn FrameWriter>,
}

impl Transport for Halves {
    fn split(self) -> (Box<dyn FrameReader>, Box<dyn FrameWriter>) {
        (self.reader, self.writer)
    }
}
