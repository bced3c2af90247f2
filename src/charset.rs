//! Character set handling
//!
//! Text columns carry their character set id in the low byte of the field
//! sub type. Strings are converted between Rust `str` and the database
//! encoding here.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Character sets understood by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// No declared encoding; bytes are passed through
    None,
    /// Binary data
    Octets,
    /// 7-bit ASCII
    Ascii,
    /// UNICODE_FSS, a UTF-8 variant limited to three bytes per character
    UnicodeFss,
    /// UTF-8
    #[default]
    Utf8,
    /// ISO 8859-1 (Latin-1)
    Iso8859_1,
}

impl Charset {
    /// Firebird character set id
    pub fn id(self) -> i32 {
        match self {
            Charset::None => 0,
            Charset::Octets => 1,
            Charset::Ascii => 2,
            Charset::UnicodeFss => 3,
            Charset::Utf8 => 4,
            Charset::Iso8859_1 => 21,
        }
    }

    /// Look up a character set by id
    pub fn from_id(id: i32) -> Option<Charset> {
        Some(match id {
            0 => Charset::None,
            1 => Charset::Octets,
            2 => Charset::Ascii,
            3 => Charset::UnicodeFss,
            4 => Charset::Utf8,
            21 => Charset::Iso8859_1,
            _ => return None,
        })
    }

    /// Name as used in the `lc_ctype` connection parameter
    pub fn name(self) -> &'static str {
        match self {
            Charset::None => "NONE",
            Charset::Octets => "OCTETS",
            Charset::Ascii => "ASCII",
            Charset::UnicodeFss => "UNICODE_FSS",
            Charset::Utf8 => "UTF8",
            Charset::Iso8859_1 => "ISO8859_1",
        }
    }

    /// Maximum bytes a single character occupies
    pub fn bytes_per_char(self) -> usize {
        match self {
            Charset::UnicodeFss => 3,
            Charset::Utf8 => 4,
            _ => 1,
        }
    }

    /// Whether values in this character set are binary
    pub fn is_octets(self) -> bool {
        self == Charset::Octets
    }

    /// Whether no encoding is declared
    pub fn is_none(self) -> bool {
        self == Charset::None
    }

    /// Encode a string into database bytes
    pub fn encode(self, s: &str) -> Result<Vec<u8>> {
        match self {
            Charset::Iso8859_1 => s
                .chars()
                .map(|c| {
                    u8::try_from(c as u32).map_err(|_| {
                        Error::DataConversion(format!("character {:?} is not valid ISO8859_1", c))
                    })
                })
                .collect(),
            Charset::Ascii => {
                if let Some(c) = s.chars().find(|c| !c.is_ascii()) {
                    return Err(Error::DataConversion(format!(
                        "character {:?} is not valid ASCII",
                        c
                    )));
                }
                Ok(s.as_bytes().to_vec())
            }
            _ => Ok(s.as_bytes().to_vec()),
        }
    }

    /// Decode database bytes into a string
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Charset::Iso8859_1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Charset::None | Charset::Octets => Ok(String::from_utf8_lossy(bytes).into_owned()),
            _ => String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::DataConversion(format!("invalid {} data: {}", self.name(), e))),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Charset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Charset::None,
            "OCTETS" | "BINARY" => Charset::Octets,
            "ASCII" => Charset::Ascii,
            "UNICODE_FSS" => Charset::UnicodeFss,
            "UTF8" | "UTF-8" => Charset::Utf8,
            "ISO8859_1" | "LATIN1" => Charset::Iso8859_1,
            other => {
                return Err(Error::FeatureNotSupported(format!(
                    "character set {}",
                    other
                )))
            }
        })
    }
}
