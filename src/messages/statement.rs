//! Statement prepare and free requests

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::op;
use crate::error::Result;

/// Prepare a statement and describe it in the same round trip
/// (`op_prepare_statement`)
#[derive(Debug)]
pub struct PrepareMessage {
    tx_handle: i32,
    stmt_handle: i32,
    dialect: i16,
    sql: Bytes,
    items: Bytes,
    buffer_length: i32,
}

impl PrepareMessage {
    /// Create a prepare request; `sql` must already be charset encoded
    pub fn new(
        tx_handle: i32,
        stmt_handle: i32,
        dialect: i16,
        sql: Bytes,
        items: &[u8],
        buffer_length: i32,
    ) -> Self {
        Self {
            tx_handle,
            stmt_handle,
            dialect,
            sql,
            items: Bytes::copy_from_slice(items),
            buffer_length,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(32 + self.sql.len() + self.items.len());
        buf.write_i32(op::PREPARE_STATEMENT)?;
        buf.write_i32(self.tx_handle)?;
        buf.write_i32(self.stmt_handle)?;
        buf.write_i32(self.dialect as i32)?;
        buf.write_buffer(&self.sql)?;
        buf.write_buffer(&self.items)?;
        buf.write_i32(self.buffer_length)?;
        Ok(buf.freeze())
    }
}

/// Close a cursor or drop a statement (`op_free_statement`)
#[derive(Debug, Clone, Copy)]
pub struct FreeMessage {
    stmt_handle: i32,
    option: i32,
}

impl FreeMessage {
    /// Create a free request with a `DSQL_*` option
    pub fn new(stmt_handle: i32, option: i32) -> Self {
        Self {
            stmt_handle,
            option,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(12);
        buf.write_i32(op::FREE_STATEMENT)?;
        buf.write_i32(self.stmt_handle)?;
        buf.write_i32(self.option)?;
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::dsql;

    #[test]
    fn test_prepare_request() {
        let msg = PrepareMessage::new(1, 2, 3, Bytes::from_static(b"SELECT 1"), &[4, 5], 32768);
        let req = msg.build_request().unwrap();
        assert_eq!(&req[0..4], &[0, 0, 0, 68]);
        assert_eq!(&req[4..8], &[0, 0, 0, 1]);
        assert_eq!(&req[8..12], &[0, 0, 0, 2]);
        assert_eq!(&req[12..16], &[0, 0, 0, 3]);
        assert_eq!(&req[16..20], &[0, 0, 0, 8]);
        assert_eq!(&req[20..28], b"SELECT 1");
        assert_eq!(&req[28..36], &[0, 0, 0, 2, 4, 5, 0, 0]);
        assert_eq!(&req[36..40], &[0, 0, 0x80, 0]);
    }

    #[test]
    fn test_free_request() {
        let req = FreeMessage::new(9, dsql::DROP).build_request().unwrap();
        assert_eq!(&req[..], &[0, 0, 0, 67, 0, 0, 0, 9, 0, 0, 0, 2]);
    }
}
