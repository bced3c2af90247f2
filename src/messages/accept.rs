//! Accept message parsing
//!
//! The server answers `op_connect` with `op_accept` naming the protocol
//! version, architecture and packet type it chose.

use crate::buffer::XdrRead;
use crate::constants::protocol;
use crate::error::Result;

/// Negotiated protocol parameters (`op_accept`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptMessage {
    /// Chosen protocol version
    pub version: i32,
    /// Chosen architecture
    pub architecture: i32,
    /// Chosen packet type
    pub accept_type: i32,
}

impl AcceptMessage {
    /// Read the accept body; the operation code was already consumed
    pub async fn read<R>(reader: &mut R) -> Result<Self>
    where
        R: XdrRead + ?Sized,
    {
        let version = reader.read_int().await?;
        let architecture = reader.read_int().await?;
        let accept_type = reader.read_int().await?;

        Ok(Self {
            version: normalize_version(version),
            architecture,
            accept_type: accept_type & protocol::PTYPE_MASK,
        })
    }

    /// Protocol version without the Firebird flag
    pub fn protocol_number(&self) -> i32 {
        self.version & protocol::FB_PROTOCOL_MASK
    }
}

/// Servers sign-extend flagged versions; fold them back into 16 bits
fn normalize_version(version: i32) -> i32 {
    if version < 0 {
        (version & protocol::FB_PROTOCOL_MASK) | protocol::FB_PROTOCOL_FLAG
    } else {
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ReadBuffer;

    #[tokio::test]
    async fn test_read_accept() {
        let mut r = ReadBuffer::from_slice(&[0, 0, 0, 10, 0, 0, 0, 1, 0, 0, 0, 3]);
        let accept = AcceptMessage::read(&mut r).await.unwrap();
        assert_eq!(accept.version, 10);
        assert_eq!(accept.architecture, 1);
        assert_eq!(accept.accept_type, 3);
        assert_eq!(accept.protocol_number(), 10);
    }

    #[test]
    fn test_negative_version() {
        let wire = 0xFFFF_800Cu32 as i32;
        assert_eq!(normalize_version(wire), protocol::PROTOCOL_VERSION12);
        assert_eq!(normalize_version(protocol::PROTOCOL_VERSION11), protocol::PROTOCOL_VERSION11);
    }
}
