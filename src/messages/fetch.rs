//! Fetch message for retrieving rows from an open cursor

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::op;
use crate::error::Result;

/// Fetch request (`op_fetch`)
#[derive(Debug)]
pub struct FetchMessage {
    /// Statement handle
    stmt_handle: i32,
    /// Output row layout
    blr: Bytes,
    /// Number of rows to fetch
    fetch_size: i32,
}

impl FetchMessage {
    /// Create a new fetch message
    pub fn new(stmt_handle: i32, blr: Bytes, fetch_size: i32) -> Self {
        Self {
            stmt_handle,
            blr,
            fetch_size,
        }
    }

    /// Build the fetch request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(20 + self.blr.len());
        buf.write_i32(op::FETCH)?;
        buf.write_i32(self.stmt_handle)?;
        buf.write_buffer(&self.blr)?;
        buf.write_i32(0)?; // message number
        buf.write_i32(self.fetch_size)?;
        Ok(buf.freeze())
    }

    /// Get the number of rows to fetch
    pub fn fetch_size(&self) -> i32 {
        self.fetch_size
    }
}
