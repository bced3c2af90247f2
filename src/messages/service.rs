//! Service manager requests

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::op;
use crate::error::Result;

/// Start a service action (`op_service_start`)
#[derive(Debug)]
pub struct ServiceStartMessage {
    handle: i32,
    spb: Bytes,
}

impl ServiceStartMessage {
    /// Start the action encoded in `spb`
    pub fn new(handle: i32, spb: Bytes) -> Self {
        Self { handle, spb }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(16 + self.spb.len());
        buf.write_i32(op::SERVICE_START)?;
        buf.write_i32(self.handle)?;
        buf.write_i32(0)?; // incarnation
        buf.write_buffer(&self.spb)?;
        Ok(buf.freeze())
    }
}

/// Query a service (`op_service_info`)
#[derive(Debug)]
pub struct ServiceInfoMessage {
    handle: i32,
    items: Bytes,
    request: Bytes,
    buffer_length: i32,
}

impl ServiceInfoMessage {
    /// Create a query; `items` qualify the request, `request` names what to return
    pub fn new(handle: i32, items: &[u8], request: &[u8], buffer_length: i32) -> Self {
        Self {
            handle,
            items: Bytes::copy_from_slice(items),
            request: Bytes::copy_from_slice(request),
            buffer_length,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(24 + self.items.len() + self.request.len());
        buf.write_i32(op::SERVICE_INFO)?;
        buf.write_i32(self.handle)?;
        buf.write_i32(0)?; // incarnation
        buf.write_buffer(&self.items)?;
        buf.write_buffer(&self.request)?;
        buf.write_i32(self.buffer_length)?;
        Ok(buf.freeze())
    }
}
