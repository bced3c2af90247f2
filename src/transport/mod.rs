//! Transport layer for Firebird connections
//!
//! Handles the raw byte exchange with the server. Framing and value encoding
//! live above this layer in [`crate::wire`].

mod stream;
mod tcp;

pub use stream::StreamTransport;
pub use tcp::TcpTransport;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Trait for transport implementations
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Send raw bytes to the server and flush them
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive exactly `n` bytes
    async fn read_exact(&mut self, n: usize) -> Result<Bytes>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;

    /// Host name of the peer, when known
    fn peer_host(&self) -> Option<&str> {
        None
    }
}

/// Map a read failure onto the driver's error type
pub(crate) fn map_read_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        Error::Io(e)
    }
}
