//! Blob stream requests

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::{op, MAX_SEGMENT_SIZE};
use crate::error::Result;

/// Create or open a blob (`op_create_blob[2]` / `op_open_blob[2]`)
#[derive(Debug)]
pub struct BlobMessage {
    create: bool,
    tx_handle: i32,
    blob_id: i64,
    bpb: Option<Bytes>,
}

impl BlobMessage {
    /// Create a new blob in the transaction
    pub fn create(tx_handle: i32) -> Self {
        Self {
            create: true,
            tx_handle,
            blob_id: 0,
            bpb: None,
        }
    }

    /// Open an existing blob
    pub fn open(tx_handle: i32, blob_id: i64) -> Self {
        Self {
            create: false,
            tx_handle,
            blob_id,
            bpb: None,
        }
    }

    /// Pass a blob parameter buffer, switching to the `*_blob2` operation
    pub fn with_bpb(mut self, bpb: Bytes) -> Self {
        self.bpb = Some(bpb);
        self
    }

    /// Operation code this request uses
    pub fn operation(&self) -> i32 {
        match (self.create, self.bpb.is_some()) {
            (true, false) => op::CREATE_BLOB,
            (true, true) => op::CREATE_BLOB2,
            (false, false) => op::OPEN_BLOB,
            (false, true) => op::OPEN_BLOB2,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(24);
        buf.write_i32(self.operation())?;
        if let Some(bpb) = &self.bpb {
            buf.write_buffer(bpb)?;
        }
        buf.write_i32(self.tx_handle)?;
        buf.write_i64(self.blob_id)?;
        Ok(buf.freeze())
    }
}

/// Read the next segments of an open blob (`op_get_segment`)
#[derive(Debug, Clone, Copy)]
pub struct GetSegmentMessage {
    blob_handle: i32,
    length: i32,
}

impl GetSegmentMessage {
    /// Ask for up to `size` bytes of segment data
    pub fn new(blob_handle: i32, size: usize) -> Self {
        let length = (size + 2).min(MAX_SEGMENT_SIZE) as i32;
        Self {
            blob_handle,
            length,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(16);
        buf.write_i32(op::GET_SEGMENT)?;
        buf.write_i32(self.blob_handle)?;
        buf.write_i32(self.length)?;
        buf.write_i32(0)?; // data segment
        Ok(buf.freeze())
    }
}

/// Write one segment (`op_batch_segments`)
#[derive(Debug)]
pub struct PutSegmentMessage<'a> {
    blob_handle: i32,
    data: &'a [u8],
}

impl<'a> PutSegmentMessage<'a> {
    /// Create a segment write
    pub fn new(blob_handle: i32, data: &'a [u8]) -> Self {
        Self { blob_handle, data }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(20 + self.data.len());
        buf.write_i32(op::BATCH_SEGMENTS)?;
        buf.write_i32(self.blob_handle)?;
        buf.write_blob_buffer(self.data)?;
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_blob_request() {
        let req = BlobMessage::open(7, 0x0102).build_request().unwrap();
        assert_eq!(
            &req[..],
            &[0, 0, 0, 35, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 1, 2]
        );
    }

    #[test]
    fn test_create_blob_with_bpb() {
        let msg = BlobMessage::create(7).with_bpb(Bytes::from_static(&[1, 3, 1, 1]));
        assert_eq!(msg.operation(), op::CREATE_BLOB2);
        let req = msg.build_request().unwrap();
        assert_eq!(&req[0..4], &[0, 0, 0, 57]);
        assert_eq!(&req[4..12], &[0, 0, 0, 4, 1, 3, 1, 1]);
        assert_eq!(&req[12..16], &[0, 0, 0, 7]);
        assert_eq!(req.len(), 24);
    }

    #[test]
    fn test_get_segment_caps_length() {
        let req = GetSegmentMessage::new(3, 100).build_request().unwrap();
        assert_eq!(&req[8..12], &[0, 0, 0, 102]);

        let req = GetSegmentMessage::new(3, 1 << 20).build_request().unwrap();
        assert_eq!(&req[8..12], &32767_i32.to_be_bytes());
    }

    #[test]
    fn test_put_segment_request() {
        let req = PutSegmentMessage::new(3, b"abc").build_request().unwrap();
        assert_eq!(
            &req[..],
            &[
                0, 0, 0, 44, // op_batch_segments
                0, 0, 0, 3, // handle
                0, 0, 0, 5, 0, 0, 0, 5, // lengths
                3, 0, b'a', b'b', b'c', 0, 0, 0,
            ]
        );
    }
}
