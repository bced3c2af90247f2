//! Array slice requests

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::op;
use crate::error::Result;

/// Read an array slice (`op_get_slice`)
#[derive(Debug)]
pub struct GetSliceMessage<'a> {
    tx_handle: i32,
    array_id: i64,
    slice_length: i32,
    sdl: &'a [u8],
}

impl<'a> GetSliceMessage<'a> {
    /// Create a slice read for the array `array_id`
    pub fn new(tx_handle: i32, array_id: i64, slice_length: i32, sdl: &'a [u8]) -> Self {
        Self {
            tx_handle,
            array_id,
            slice_length,
            sdl,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(32 + self.sdl.len());
        buf.write_i32(op::GET_SLICE)?;
        buf.write_i32(self.tx_handle)?;
        buf.write_i64(self.array_id)?;
        buf.write_i32(self.slice_length)?;
        buf.write_buffer(self.sdl)?;
        buf.write_buffer(&[])?; // slice parameters
        buf.write_i32(0)?;
        Ok(buf.freeze())
    }
}

/// Write a whole array (`op_put_slice`)
///
/// `slice` holds the XDR encoded elements. The server answers with the id
/// of the newly stored array.
#[derive(Debug)]
pub struct PutSliceMessage<'a> {
    tx_handle: i32,
    slice_length: i32,
    sdl: &'a [u8],
    slice: &'a [u8],
}

impl<'a> PutSliceMessage<'a> {
    /// Create a slice write
    pub fn new(tx_handle: i32, slice_length: i32, sdl: &'a [u8], slice: &'a [u8]) -> Self {
        Self {
            tx_handle,
            slice_length,
            sdl,
            slice,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(36 + self.sdl.len() + self.slice.len());
        buf.write_i32(op::PUT_SLICE)?;
        buf.write_i32(self.tx_handle)?;
        buf.write_i64(0)?;
        buf.write_i32(self.slice_length)?;
        buf.write_buffer(self.sdl)?;
        buf.write_buffer(&[])?;
        buf.write_i32(self.slice_length)?;
        buf.write_bytes(self.slice)?;
        Ok(buf.freeze())
    }
}
