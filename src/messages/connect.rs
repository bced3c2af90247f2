//! Connect message for protocol negotiation
//!
//! The first request on every connection. The client lists the protocol
//! versions it speaks and the server picks one in its `op_accept` reply.

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::{op, protocol};
use crate::error::Result;
use crate::params::ParameterBuffer;

/// One protocol version offered to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolOffer {
    /// Protocol version number (with the Firebird flag where applicable)
    pub version: i32,
    /// Highest packet type supported
    pub max_type: i32,
    /// Preference weight; the server picks the highest
    pub weight: i32,
}

/// Protocol versions this driver supports
pub const SUPPORTED_PROTOCOLS: [ProtocolOffer; 3] = [
    ProtocolOffer {
        version: protocol::PROTOCOL_VERSION10,
        max_type: protocol::PTYPE_BATCH_SEND,
        weight: 1,
    },
    ProtocolOffer {
        version: protocol::PROTOCOL_VERSION11,
        max_type: protocol::PTYPE_BATCH_SEND,
        weight: 2,
    },
    ProtocolOffer {
        version: protocol::PROTOCOL_VERSION12,
        max_type: protocol::PTYPE_BATCH_SEND,
        weight: 3,
    },
];

/// Connect request (`op_connect`)
#[derive(Debug)]
pub struct ConnectMessage {
    /// Database path or service name
    path: String,
    /// Operating system user
    os_user: String,
    /// Client host name
    host: String,
    /// Offered protocols
    protocols: Vec<ProtocolOffer>,
}

impl ConnectMessage {
    /// Create a connect message offering all supported protocols
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            os_user: local_user(),
            host: local_host(),
            protocols: SUPPORTED_PROTOCOLS.to_vec(),
        }
    }

    /// Override the user and host reported to the server
    pub fn with_identity(mut self, os_user: impl Into<String>, host: impl Into<String>) -> Self {
        self.os_user = os_user.into();
        self.host = host.into();
        self
    }

    /// Build the user identification block
    fn user_identification(&self) -> Result<Bytes> {
        let mut pb = ParameterBuffer::new();
        pb.append_string(protocol::CNCT_USER, &self.os_user)?;
        pb.append_string(protocol::CNCT_HOST, &self.host)?;
        pb.append_bytes(protocol::CNCT_USER_VERIFICATION, &[])?;
        Ok(pb.into_bytes())
    }

    /// Build the connect request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::new();

        buf.write_i32(op::CONNECT)?;
        buf.write_i32(op::ATTACH)?;
        buf.write_i32(protocol::CONNECT_VERSION2)?;
        buf.write_i32(protocol::ARCH_GENERIC)?;
        buf.write_str(&self.path)?;
        buf.write_i32(self.protocols.len() as i32)?;
        buf.write_buffer(&self.user_identification()?)?;

        for offer in &self.protocols {
            buf.write_i32(offer.version)?;
            buf.write_i32(protocol::ARCH_GENERIC)?;
            buf.write_i32(protocol::PTYPE_RPC)?;
            buf.write_i32(offer.max_type)?;
            buf.write_i32(offer.weight)?;
        }

        Ok(buf.freeze())
    }

    /// Get the requested path
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn local_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}

fn local_host() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_header() {
        let msg = ConnectMessage::new("db").with_identity("u", "h");
        let req = msg.build_request().unwrap();

        assert_eq!(&req[0..4], &[0, 0, 0, 1]); // op_connect
        assert_eq!(&req[4..8], &[0, 0, 0, 19]); // op_attach
        assert_eq!(&req[8..12], &[0, 0, 0, 2]); // CONNECT_VERSION2
        assert_eq!(&req[12..16], &[0, 0, 0, 1]); // arch_generic
        assert_eq!(&req[16..20], &[0, 0, 0, 2]); // path length
        assert_eq!(&req[20..22], b"db");
        assert_eq!(&req[24..28], &[0, 0, 0, 3]); // protocol count
    }

    #[test]
    fn test_user_identification() {
        let msg = ConnectMessage::new("db").with_identity("bob", "box");
        let uid = msg.user_identification().unwrap();
        assert_eq!(
            &uid[..],
            &[1, 3, b'b', b'o', b'b', 4, 3, b'b', b'o', b'x', 6, 0]
        );
    }

    #[test]
    fn test_protocol_offers_trail_request() {
        let msg = ConnectMessage::new("db").with_identity("u", "h");
        let req = msg.build_request().unwrap();
        let tail = &req[req.len() - 20..];
        let words: Vec<i32> = tail
            .chunks(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(
            words,
            vec![protocol::PROTOCOL_VERSION12, 1, 2, 3, 3]
        );
    }
}
