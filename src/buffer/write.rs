//! Write buffer for encoding XDR data
//!
//! Every request is assembled in a [`WriteBuffer`] and handed to the
//! transport in one piece.

use bytes::{BufMut, Bytes, BytesMut};

use super::xdr_padding;
use crate::error::{Error, Result};

/// A buffer for writing protocol data
#[derive(Debug)]
pub struct WriteBuffer {
    /// The underlying byte buffer
    data: BytesMut,
    /// Maximum capacity (for packet size limits)
    max_capacity: Option<usize>,
}

impl WriteBuffer {
    /// Create a new WriteBuffer with default capacity
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(8192),
            max_capacity: None,
        }
    }

    /// Create a new WriteBuffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            max_capacity: None,
        }
    }

    /// Create a new WriteBuffer with a maximum capacity limit
    pub fn with_max_capacity(capacity: usize, max_capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            max_capacity: Some(max_capacity),
        }
    }

    /// Get the current length of data in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Get the buffer contents as a byte slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Freeze the buffer into immutable Bytes
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    #[inline]
    fn ensure_capacity(&self, n: usize) -> Result<()> {
        if let Some(max) = self.max_capacity {
            if self.data.len() + n > max {
                return Err(Error::BufferOverflow {
                    needed: n,
                    available: max.saturating_sub(self.data.len()),
                });
            }
        }
        Ok(())
    }

    fn write_pad(&mut self, len: usize) -> Result<()> {
        self.write_zeros(xdr_padding(len))
    }

    // =========================================================================
    // Raw byte writes
    // =========================================================================

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.ensure_capacity(1)?;
        self.data.put_u8(value);
        Ok(())
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_capacity(bytes.len())?;
        self.data.put_slice(bytes);
        Ok(())
    }

    /// Write zeros
    pub fn write_zeros(&mut self, n: usize) -> Result<()> {
        self.ensure_capacity(n)?;
        self.data.put_bytes(0, n);
        Ok(())
    }

    // =========================================================================
    // XDR writes
    // =========================================================================

    /// Write a 32-bit big-endian integer
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.ensure_capacity(4)?;
        self.data.put_i32(value);
        Ok(())
    }

    /// Write a 16-bit value; XDR widens it to a full 32-bit word
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_i32(value as i32)
    }

    /// Write a 64-bit big-endian integer
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.ensure_capacity(8)?;
        self.data.put_i64(value);
        Ok(())
    }

    /// Write a single precision float
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_i32(value.to_bits() as i32)
    }

    /// Write a double precision float
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_i64(value.to_bits() as i64)
    }

    /// Write a length-prefixed opaque buffer padded to four bytes
    pub fn write_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_i32(bytes.len() as i32)?;
        self.write_bytes(bytes)?;
        self.write_pad(bytes.len())
    }

    /// Write a string as an opaque buffer
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_buffer(value.as_bytes())
    }

    /// Write `bytes` as a fixed-width opaque field
    ///
    /// The value is padded with spaces up to `len` and then with zeros to the
    /// next multiple of four. Values longer than `len` are cut.
    pub fn write_opaque(&mut self, bytes: &[u8], len: usize) -> Result<()> {
        let take = bytes.len().min(len);
        self.write_bytes(&bytes[..take])?;
        self.ensure_capacity(len - take)?;
        self.data.put_bytes(b' ', len - take);
        self.write_pad(len)
    }

    /// Write a blob segment
    ///
    /// Layout: total length twice, a 2-byte little-endian segment length, the
    /// segment bytes and the XDR padding of the whole run.
    pub fn write_blob_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        let len = bytes.len();
        if len > u16::MAX as usize - 2 {
            return Err(Error::DataConversion(format!(
                "blob segment of {} bytes is too large",
                len
            )));
        }
        let total = (len + 2) as i32;
        self.write_i32(total)?;
        self.write_i32(total)?;
        self.write_bytes(&(len as u16).to_le_bytes())?;
        self.write_bytes(bytes)?;
        self.write_pad(len + 2)
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}
