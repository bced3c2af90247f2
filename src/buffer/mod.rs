//! Buffer utilities for the XDR wire encoding
//!
//! Firebird encodes every wire value with XDR: big-endian 32/64-bit integers
//! and opaque byte runs padded to a multiple of four. Information and
//! parameter buffers carried inside those opaque runs use little-endian
//! ("VAX") integers instead.

mod read;
mod write;

pub use read::ReadBuffer;
pub use write::WriteBuffer;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Number of zero bytes needed to pad `len` to a multiple of four
#[inline]
pub fn xdr_padding(len: usize) -> usize {
    (4 - (len & 3)) & 3
}

/// Decode a little-endian integer of up to four bytes
pub fn vax_integer(bytes: &[u8]) -> i32 {
    let mut value: i32 = 0;
    for (shift, b) in bytes.iter().take(4).enumerate() {
        value |= (*b as i32) << (shift * 8);
    }
    value
}

/// Decode a little-endian integer of up to eight bytes
pub fn vax_integer64(bytes: &[u8]) -> i64 {
    let mut value: i64 = 0;
    for (shift, b) in bytes.iter().take(8).enumerate() {
        value |= (*b as i64) << (shift * 8);
    }
    value
}

/// Source of XDR encoded values
///
/// Implemented by the network connection and by [`ReadBuffer`], so row and
/// array decoding is written once for both.
#[async_trait::async_trait]
pub trait XdrRead: Send {
    /// Read exactly `n` raw bytes
    async fn read_raw(&mut self, n: usize) -> Result<Bytes>;

    /// Read a 32-bit big-endian integer
    async fn read_int(&mut self) -> Result<i32> {
        let b = self.read_raw(4).await?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a 64-bit big-endian integer
    async fn read_long(&mut self) -> Result<i64> {
        let b = self.read_raw(8).await?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&b[..8]);
        Ok(i64::from_be_bytes(arr))
    }

    /// Read a single precision float
    async fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_int().await? as u32))
    }

    /// Read a double precision float
    async fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_long().await? as u64))
    }

    /// Read `len` bytes followed by their XDR padding
    async fn read_opaque(&mut self, len: usize) -> Result<Bytes> {
        let data = self.read_raw(len).await?;
        let pad = xdr_padding(len);
        if pad > 0 {
            self.read_raw(pad).await?;
        }
        Ok(data)
    }

    /// Read a length-prefixed opaque buffer
    async fn read_buffer(&mut self) -> Result<Bytes> {
        let len = self.read_int().await?;
        if len < 0 {
            return Err(Error::Protocol(format!("negative buffer length {}", len)));
        }
        self.read_opaque(len as usize).await
    }
}
