//! Requests that carry nothing but an operation code and an object handle
//!
//! Detach, commit, rollback, blob close and similar requests all share this
//! two-word layout.

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::error::Result;

/// Operation applied to a server object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMessage {
    operation: i32,
    handle: Option<i32>,
}

impl ObjectMessage {
    /// Operation on the object with the given handle
    pub fn new(operation: i32, handle: i32) -> Self {
        Self {
            operation,
            handle: Some(handle),
        }
    }

    /// Operation without an object (`op_disconnect`, `op_ping`)
    pub fn bare(operation: i32) -> Self {
        Self {
            operation,
            handle: None,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(8);
        buf.write_i32(self.operation)?;
        if let Some(handle) = self.handle {
            buf.write_i32(handle)?;
        }
        Ok(buf.freeze())
    }

    /// Get the operation code
    pub fn operation(&self) -> i32 {
        self.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::op;

    #[test]
    fn test_with_handle() {
        let req = ObjectMessage::new(op::COMMIT, 7).build_request().unwrap();
        assert_eq!(&req[..], &[0, 0, 0, 30, 0, 0, 0, 7]);
    }

    #[test]
    fn test_bare() {
        let req = ObjectMessage::bare(op::DISCONNECT).build_request().unwrap();
        assert_eq!(&req[..], &[0, 0, 0, 6]);
    }
}
