//! Read buffer for decoding XDR data
//!
//! Provides methods for reading values out of an in-memory byte buffer, both
//! the XDR encoding used on the wire and the little-endian layout of
//! information buffers.

use bytes::Bytes;

use super::{vax_integer, vax_integer64, xdr_padding, XdrRead};
use crate::error::{Error, Result};

/// A buffer for reading protocol data
#[derive(Debug)]
pub struct ReadBuffer {
    /// The underlying byte data
    data: Bytes,
    /// Current read position
    pos: usize,
}

impl ReadBuffer {
    /// Create a new ReadBuffer from bytes
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a new ReadBuffer from a byte slice
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            pos: 0,
        }
    }

    /// Create a new ReadBuffer from a Vec
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
            pos: 0,
        }
    }

    /// Get the current position in the buffer
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the total length of the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of bytes remaining to be read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if there are at least `n` bytes remaining
    #[inline]
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Skip `n` bytes in the buffer
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure_remaining(n)?;
        self.pos += n;
        Ok(())
    }

    /// Peek at the next byte without consuming it
    pub fn peek_u8(&self) -> Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.data[self.pos])
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    #[inline]
    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::BufferUnderflow {
                needed: n,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Raw reads
    // =========================================================================

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Read `n` bytes without copying
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        self.ensure_remaining(n)?;
        let value = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(value)
    }

    // =========================================================================
    // XDR reads
    // =========================================================================

    /// Read a 32-bit big-endian integer
    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a 64-bit big-endian integer
    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&b);
        Ok(i64::from_be_bytes(arr))
    }

    /// Read `len` bytes and skip the XDR padding after them
    pub fn read_padded(&mut self, len: usize) -> Result<Bytes> {
        let value = self.read_bytes(len)?;
        self.skip(xdr_padding(len))?;
        Ok(value)
    }

    /// Read a length-prefixed XDR buffer
    pub fn read_xdr_buffer(&mut self) -> Result<Bytes> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(Error::Protocol(format!("negative buffer length {}", len)));
        }
        self.read_padded(len as usize)
    }

    // =========================================================================
    // Little-endian reads (information buffers)
    // =========================================================================

    /// Read a 16-bit little-endian length
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian integer occupying `len` bytes
    pub fn read_vax_i32(&mut self, len: usize) -> Result<i32> {
        let b = self.read_bytes(len)?;
        Ok(vax_integer(&b))
    }

    /// Read a little-endian integer occupying `len` bytes
    pub fn read_vax_i64(&mut self, len: usize) -> Result<i64> {
        let b = self.read_bytes(len)?;
        Ok(vax_integer64(&b))
    }

    /// Read a 2-byte length followed by a little-endian integer of that length
    pub fn read_clumplet_int(&mut self) -> Result<i32> {
        let len = self.read_u16_le()? as usize;
        self.read_vax_i32(len)
    }

    /// Read a 2-byte length followed by that many bytes
    pub fn read_clumplet_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_u16_le()? as usize;
        self.read_bytes(len)
    }
}

#[async_trait::async_trait]
impl XdrRead for ReadBuffer {
    async fn read_raw(&mut self, n: usize) -> Result<Bytes> {
        ReadBuffer::read_bytes(self, n)
    }
}

impl From<Bytes> for ReadBuffer {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for ReadBuffer {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}
