//! Tagged parameter buffers (DPB, TPB, SPB, BPB, EPB)
//!
//! Every parameter buffer starts with a version byte followed by tagged
//! items. Items come in a few shapes: a bare tag, a tag followed by a
//! one-byte length and the value, or (in service requests) a tag followed by
//! a two-byte length.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Builder for tagged parameter buffers
#[derive(Debug, Clone, Default)]
pub struct ParameterBuffer {
    data: Vec<u8>,
}

impl ParameterBuffer {
    /// Create an empty buffer without a version byte
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create a buffer starting with the given version byte
    pub fn with_version(version: u8) -> Self {
        Self {
            data: vec![version],
        }
    }

    /// Append a bare tag
    pub fn append_tag(&mut self, tag: u8) -> &mut Self {
        self.data.push(tag);
        self
    }

    /// Append a tag followed by one raw byte (no length)
    pub fn append_tag_byte(&mut self, tag: u8, value: u8) -> &mut Self {
        self.data.push(tag);
        self.data.push(value);
        self
    }

    /// Append a tag with a one-byte length and a single-byte value
    pub fn append_u8(&mut self, tag: u8, value: u8) -> &mut Self {
        self.data.extend_from_slice(&[tag, 1, value]);
        self
    }

    /// Append a tag with a one-byte length and a 4-byte little-endian value
    pub fn append_i32(&mut self, tag: u8, value: i32) -> &mut Self {
        self.data.extend_from_slice(&[tag, 4]);
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append a tag with a one-byte length and the given bytes
    pub fn append_bytes(&mut self, tag: u8, value: &[u8]) -> Result<&mut Self> {
        let len = u8::try_from(value.len()).map_err(|_| {
            Error::DataConversion(format!(
                "parameter item {} is {} bytes, the limit is 255",
                tag,
                value.len()
            ))
        })?;
        self.data.push(tag);
        self.data.push(len);
        self.data.extend_from_slice(value);
        Ok(self)
    }

    /// Append a tag with a one-byte length and the string bytes
    pub fn append_string(&mut self, tag: u8, value: &str) -> Result<&mut Self> {
        self.append_bytes(tag, value.as_bytes())
    }

    /// Append a tag with a two-byte little-endian length and the bytes
    pub fn append_bytes_le16(&mut self, tag: u8, value: &[u8]) -> Result<&mut Self> {
        let len = u16::try_from(value.len()).map_err(|_| {
            Error::DataConversion(format!("parameter item {} is too long", tag))
        })?;
        self.data.push(tag);
        self.data.extend_from_slice(&len.to_le_bytes());
        self.data.extend_from_slice(value);
        Ok(self)
    }

    /// Append a tag with a two-byte length and the string bytes
    pub fn append_string_le16(&mut self, tag: u8, value: &str) -> Result<&mut Self> {
        self.append_bytes_le16(tag, value.as_bytes())
    }

    /// Append a tag followed by a 4-byte little-endian value (no length)
    pub fn append_tag_i32(&mut self, tag: u8, value: i32) -> &mut Self {
        self.data.push(tag);
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append raw bytes
    pub fn append_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Current length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// View the encoded bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Finish the buffer
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_and_tags() {
        let mut pb = ParameterBuffer::with_version(3);
        pb.append_tag(2).append_tag(6);
        assert_eq!(pb.as_slice(), &[3, 2, 6]);
    }

    #[test]
    fn test_string_item() {
        let mut pb = ParameterBuffer::with_version(1);
        pb.append_string(28, "SYSDBA").unwrap();
        assert_eq!(pb.as_slice(), &[1, 28, 6, b'S', b'Y', b'S', b'D', b'B', b'A']);
    }

    #[test]
    fn test_int_item_little_endian() {
        let mut pb = ParameterBuffer::new();
        pb.append_i32(63, 3);
        assert_eq!(pb.as_slice(), &[63, 4, 3, 0, 0, 0]);
    }

    #[test]
    fn test_le16_item() {
        let mut pb = ParameterBuffer::new();
        pb.append_string_le16(106, "db").unwrap();
        assert_eq!(pb.as_slice(), &[106, 2, 0, b'd', b'b']);
    }

    #[test]
    fn test_tag_i32_without_length() {
        let mut pb = ParameterBuffer::new();
        pb.append_tag_i32(108, 0x1000);
        assert_eq!(pb.as_slice(), &[108, 0x00, 0x10, 0, 0]);
    }

    #[test]
    fn test_item_too_long() {
        let mut pb = ParameterBuffer::new();
        let long = "x".repeat(256);
        assert!(pb.append_string(1, &long).is_err());
    }
}
