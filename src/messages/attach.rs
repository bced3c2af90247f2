//! Attach message for opening or creating a database or service

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::op;
use crate::error::Result;

/// Attach request (`op_attach`, `op_create` or `op_service_attach`)
#[derive(Debug)]
pub struct AttachMessage {
    /// Operation code
    operation: i32,
    /// Database path or service name
    path: String,
    /// Parameter buffer (DPB or SPB)
    parameters: Bytes,
}

impl AttachMessage {
    /// Attach to an existing database
    pub fn attach(path: impl Into<String>, dpb: Bytes) -> Self {
        Self::with_operation(op::ATTACH, path, dpb)
    }

    /// Create a new database
    pub fn create(path: impl Into<String>, dpb: Bytes) -> Self {
        Self::with_operation(op::CREATE, path, dpb)
    }

    /// Attach to the service manager
    pub fn service(name: impl Into<String>, spb: Bytes) -> Self {
        Self::with_operation(op::SERVICE_ATTACH, name, spb)
    }

    fn with_operation(operation: i32, path: impl Into<String>, parameters: Bytes) -> Self {
        Self {
            operation,
            path: path.into(),
            parameters,
        }
    }

    /// Build the attach request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(32 + self.path.len() + self.parameters.len());
        buf.write_i32(self.operation)?;
        buf.write_i32(0)?; // database object id
        buf.write_str(&self.path)?;
        buf.write_buffer(&self.parameters)?;
        Ok(buf.freeze())
    }

    /// Get the operation code
    pub fn operation(&self) -> i32 {
        self.operation
    }
}
