//! TCP transport implementation

use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{StreamTransport, Transport};
use crate::config::{Config, DEFAULT_CONNECT_TIMEOUT};
use crate::error::{Error, Result};

/// TCP transport for Firebird connections
pub struct TcpTransport {
    /// The connected stream
    inner: Option<StreamTransport<TcpStream>>,
    /// Connection timeout
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a new TCP transport (not yet connected)
    pub fn new() -> Self {
        Self {
            inner: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connect to `host:port`
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        let addr = format!("{}:{}", host, port);
        let stream = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::ConnectionTimeout(self.connect_timeout))?
            .map_err(Error::Io)?;

        stream.set_nodelay(true).map_err(Error::Io)?;

        tracing::debug!(addr = %addr, "TCP connection established");
        self.inner = Some(StreamTransport::new(stream).with_peer_host(host));
        Ok(())
    }

    /// Connect using a Config
    pub async fn connect_with_config(&mut self, config: &Config) -> Result<()> {
        self.connect_timeout = config.connect_timeout;
        self.connect(&config.host, config.port).await
    }

    fn inner_mut(&mut self) -> Result<&mut StreamTransport<TcpStream>> {
        self.inner.as_mut().ok_or(Error::ConnectionClosed)
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.inner_mut()?.send(data).await
    }

    async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        self.inner_mut()?.read_exact(n).await
    }

    fn is_connected(&self) -> bool {
        self.inner.as_ref().is_some_and(|t| t.is_connected())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut inner) = self.inner.take() {
            inner.close().await?;
        }
        Ok(())
    }

    fn peer_host(&self) -> Option<&str> {
        self.inner.as_ref().and_then(|t| t.peer_host())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_transport_new() {
        let transport = TcpTransport::new();
        assert!(!transport.is_connected());
        assert_eq!(transport.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_tcp_transport_timeout() {
        let transport = TcpTransport::new().connect_timeout(Duration::from_secs(3));
        assert_eq!(transport.connect_timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_send_when_not_connected() {
        let mut transport = TcpTransport::new();
        assert!(matches!(
            transport.send(&[0]).await,
            Err(Error::ConnectionClosed)
        ));
    }
}
