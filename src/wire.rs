//! XDR framing over a transport
//!
//! [`Wire`] owns the transport of one connection. It sends fully encoded
//! requests, reads operation codes (skipping `op_dummy` keep-alives) and
//! turns `op_response` status vectors into errors or warnings.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::buffer::XdrRead;
use crate::charset::Charset;
use crate::constants::{isc, op};
use crate::error::{Error, IscStatus, Result};
use crate::messages::response::{read_response_body, GenericResponse, Response};
use crate::transport::Transport;

/// Callback receiving server warnings
pub type WarningHandler = Arc<dyn Fn(&IscStatus) + Send + Sync>;

/// Framed connection to the server
pub(crate) struct Wire {
    transport: Box<dyn Transport>,
    pending_op: Option<i32>,
    charset: Charset,
    warning_handler: Option<WarningHandler>,
}

impl Wire {
    pub(crate) fn new(transport: Box<dyn Transport>, charset: Charset) -> Self {
        Self {
            transport,
            pending_op: None,
            charset,
            warning_handler: None,
        }
    }

    pub(crate) fn charset(&self) -> Charset {
        self.charset
    }

    pub(crate) fn set_warning_handler(&mut self, handler: Option<WarningHandler>) {
        self.warning_handler = handler;
    }

    pub(crate) fn warning_handler(&self) -> Option<WarningHandler> {
        self.warning_handler.clone()
    }

    pub(crate) fn peer_host(&self) -> Option<&str> {
        self.transport.peer_host()
    }

    /// Send one encoded request
    pub(crate) async fn send(&mut self, request: Bytes) -> Result<()> {
        if request.len() >= 4 {
            let operation = i32::from_be_bytes([request[0], request[1], request[2], request[3]]);
            tracing::trace!(operation, len = request.len(), "sending request");
        }
        self.transport.send(&request).await
    }

    /// Read the next operation code
    pub(crate) async fn read_operation(&mut self) -> Result<i32> {
        if let Some(operation) = self.pending_op.take() {
            return Ok(operation);
        }
        loop {
            let operation = self.read_int().await?;
            if operation != op::DUMMY {
                tracing::trace!(operation, "received operation");
                return Ok(operation);
            }
        }
    }

    /// Push back an operation code so the next read returns it
    pub(crate) fn push_operation(&mut self, operation: i32) {
        self.pending_op = Some(operation);
    }

    /// Read and decode the next response
    pub(crate) async fn read_response(&mut self) -> Result<Response> {
        let operation = self.read_operation().await?;
        self.read_response_for(operation).await
    }

    /// Decode a response whose operation code was already read
    pub(crate) async fn read_response_for(&mut self, operation: i32) -> Result<Response> {
        let charset = self.charset;
        let (response, status) = read_response_body(self, operation, charset).await?;
        self.process_status(status)?;
        Ok(response)
    }

    /// Read a response that must be an `op_response`
    pub(crate) async fn read_generic_response(&mut self) -> Result<GenericResponse> {
        match self.read_response().await? {
            Response::Generic(response) => Ok(response),
            other => Err(Error::UnexpectedOperation {
                expected: op::RESPONSE,
                actual: other.operation(),
            }),
        }
    }

    /// Raise errors and route warnings from a decoded status vector
    pub(crate) fn process_status(&self, status: IscStatus) -> Result<()> {
        if status.is_empty() {
            return Ok(());
        }
        if status.error_code() == Some(isc::NOTHING_TO_CANCEL) {
            tracing::warn!("ignoring redundant cancel request");
            return Ok(());
        }
        if !status.is_warning() {
            return Err(Error::Isc(status));
        }
        match &self.warning_handler {
            Some(handler) => handler(&status),
            None => tracing::warn!(
                code = ?status.error_code(),
                "server warning: {}",
                status.message()
            ),
        }
        Ok(())
    }

    pub(crate) async fn close(&mut self) -> Result<()> {
        self.pending_op = None;
        self.transport.close().await
    }
}

#[async_trait::async_trait]
impl XdrRead for Wire {
    async fn read_raw(&mut self, n: usize) -> Result<Bytes> {
        self.transport.read_exact(n).await
    }
}

impl fmt::Debug for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wire")
            .field("connected", &self.transport.is_connected())
            .field("pending_op", &self.pending_op)
            .field("charset", &self.charset)
            .finish()
    }
}
