//! Transport over any async byte stream

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};

use super::{map_read_error, Transport};
use crate::error::{Error, Result};

/// Transport wrapping an arbitrary `AsyncRead + AsyncWrite` stream
///
/// Used for TCP sockets as well as in-process pipes.
pub struct StreamTransport<S> {
    stream: Option<BufStream<S>>,
    peer_host: Option<String>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(BufStream::new(stream)),
            peer_host: None,
        }
    }

    /// Record the host name of the peer
    pub fn with_peer_host(mut self, host: impl Into<String>) -> Self {
        self.peer_host = Some(host.into());
        self
    }

    fn stream_mut(&mut self) -> Result<&mut BufStream<S>> {
        self.stream.as_mut().ok_or(Error::ConnectionClosed)
    }
}

#[async_trait::async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream_mut()?;
        stream.write_all(data).await.map_err(Error::Io)?;
        stream.flush().await.map_err(Error::Io)?;
        Ok(())
    }

    async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        let stream = self.stream_mut()?;
        let mut buf = vec![0u8; n];
        stream.read_exact(&mut buf).await.map_err(map_read_error)?;
        Ok(Bytes::from(buf))
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.map_err(Error::Io)?;
        }
        Ok(())
    }

    fn peer_host(&self) -> Option<&str> {
        self.peer_host.as_deref()
    }
}
