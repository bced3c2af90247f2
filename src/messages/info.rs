//! Information requests
//!
//! Database, transaction, statement and blob information share one layout:
//! the object handle, an incarnation word, the requested items and the size
//! of the reply buffer the server may fill.

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::op;
use crate::error::Result;

/// Information request (`op_info_*`)
#[derive(Debug)]
pub struct InfoMessage {
    operation: i32,
    handle: i32,
    items: Bytes,
    buffer_length: i32,
}

impl InfoMessage {
    /// Query database information
    pub fn database(handle: i32, items: &[u8], buffer_length: i32) -> Self {
        Self::new(op::INFO_DATABASE, handle, items, buffer_length)
    }

    /// Query statement information
    pub fn sql(handle: i32, items: &[u8], buffer_length: i32) -> Self {
        Self::new(op::INFO_SQL, handle, items, buffer_length)
    }

    /// Query transaction information
    pub fn transaction(handle: i32, items: &[u8], buffer_length: i32) -> Self {
        Self::new(op::INFO_TRANSACTION, handle, items, buffer_length)
    }

    /// Query blob information
    pub fn blob(handle: i32, items: &[u8], buffer_length: i32) -> Self {
        Self::new(op::INFO_BLOB, handle, items, buffer_length)
    }

    fn new(operation: i32, handle: i32, items: &[u8], buffer_length: i32) -> Self {
        Self {
            operation,
            handle,
            items: Bytes::copy_from_slice(items),
            buffer_length,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(20 + self.items.len());
        buf.write_i32(self.operation)?;
        buf.write_i32(self.handle)?;
        buf.write_i32(0)?; // incarnation
        buf.write_buffer(&self.items)?;
        buf.write_i32(self.buffer_length)?;
        Ok(buf.freeze())
    }
}
