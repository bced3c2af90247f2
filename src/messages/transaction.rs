//! Transaction start and two-phase prepare requests

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::op;
use crate::error::Result;

/// Start a transaction (`op_transaction`)
#[derive(Debug)]
pub struct TransactionMessage {
    db_handle: i32,
    tpb: Bytes,
}

impl TransactionMessage {
    /// Create a start request with the given transaction parameter buffer
    pub fn new(db_handle: i32, tpb: Bytes) -> Self {
        Self { db_handle, tpb }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(12 + self.tpb.len());
        buf.write_i32(op::TRANSACTION)?;
        buf.write_i32(self.db_handle)?;
        buf.write_buffer(&self.tpb)?;
        Ok(buf.freeze())
    }
}

/// Two-phase prepare with a message for the recovery tool (`op_prepare2`)
#[derive(Debug)]
pub struct Prepare2Message {
    tx_handle: i32,
    message: Bytes,
}

impl Prepare2Message {
    /// Create a prepare request
    pub fn new(tx_handle: i32, message: Bytes) -> Self {
        Self { tx_handle, message }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(12 + self.message.len());
        buf.write_i32(op::PREPARE2)?;
        buf.write_i32(self.tx_handle)?;
        buf.write_buffer(&self.message)?;
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_request() {
        let req = TransactionMessage::new(1, Bytes::from_static(&[3, 2, 6, 9]))
            .build_request()
            .unwrap();
        assert_eq!(
            &req[..],
            &[0, 0, 0, 29, 0, 0, 0, 1, 0, 0, 0, 4, 3, 2, 6, 9]
        );
    }

    #[test]
    fn test_prepare2_request() {
        let req = Prepare2Message::new(5, Bytes::from_static(b"xid"))
            .build_request()
            .unwrap();
        assert_eq!(
            &req[..],
            &[0, 0, 0, 51, 0, 0, 0, 5, 0, 0, 0, 3, b'x', b'i', b'd', 0]
        );
    }
}
