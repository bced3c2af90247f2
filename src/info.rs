//! Database information replies
//!
//! `op_info_database` answers with a clumplet buffer: an item tag, a 2-byte
//! little-endian length and the item value, repeated until `isc_info_end`.
//! Some items (user names, versions) may occur more than once.

use bytes::Bytes;
use chrono::NaiveDateTime;

use crate::buffer::{vax_integer, ReadBuffer};
use crate::charset::Charset;
use crate::constants::{db_info, info};
use crate::error::{Error, Result};
use crate::types::decode_timestamp;

/// Decoded value of one information item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoValue {
    /// Counter or size
    Int(i64),
    /// Flag
    Bool(bool),
    /// Text such as a user name or an implementation code
    Text(String),
    /// Version strings
    Versions(Vec<String>),
    /// Point in time
    Timestamp(NaiveDateTime),
    /// Item the driver does not interpret
    Raw(Bytes),
}

impl InfoValue {
    /// Integer value, if this is an integer item
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            InfoValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is a text item
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InfoValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One item of a database information reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoItem {
    /// `db_info::*` tag
    pub item: u8,
    /// Decoded value
    pub value: InfoValue,
}

/// Parse an `op_info_database` reply in the order the server sent it
///
/// A truncated reply yields the items decoded so far.
pub fn parse_database_info(buffer: &[u8], charset: Charset) -> Result<Vec<InfoItem>> {
    let mut r = ReadBuffer::from_slice(buffer);
    let mut items = Vec::new();

    while r.remaining() > 0 {
        let item = r.read_u8()?;
        match item {
            info::END | info::TRUNCATED => break,
            info::ERROR => {
                return Err(Error::Protocol("database information request failed".into()))
            }
            _ => {}
        }

        let data = r.read_clumplet_bytes()?;
        let value = decode_item(item, &data, charset)?;
        items.push(InfoItem { item, value });
    }

    Ok(items)
}

fn decode_item(item: u8, data: &[u8], charset: Charset) -> Result<InfoValue> {
    let byte = |i: usize| -> Result<u8> {
        data.get(i)
            .copied()
            .ok_or(Error::BufferUnderflow {
                needed: i + 1,
                available: data.len(),
            })
    };

    Ok(match item {
        db_info::ALLOCATION
        | db_info::ODS_VERSION
        | db_info::ODS_MINOR_VERSION
        | db_info::PAGE_SIZE
        | db_info::CURRENT_MEMORY
        | db_info::MAX_MEMORY
        | db_info::NUM_BUFFERS
        | db_info::SWEEP_INTERVAL
        | db_info::FETCHES
        | db_info::MARKS
        | db_info::READS
        | db_info::WRITES
        | db_info::BACKOUT_COUNT
        | db_info::DELETE_COUNT
        | db_info::EXPUNGE_COUNT
        | db_info::INSERT_COUNT
        | db_info::PURGE_COUNT
        | db_info::READ_IDX_COUNT
        | db_info::READ_SEQ_COUNT
        | db_info::UPDATE_COUNT
        | db_info::DB_SIZE_IN_PAGES
        | db_info::OLDEST_TRANSACTION
        | db_info::OLDEST_ACTIVE
        | db_info::OLDEST_SNAPSHOT
        | db_info::NEXT_TRANSACTION
        | db_info::ACTIVE_TRANSACTIONS
        | db_info::ACTIVE_TRAN_COUNT
        | db_info::ATTACHMENT_ID
        | db_info::DB_SQL_DIALECT
        | db_info::ATT_CHARSET
        | db_info::DB_FILE_SIZE
        | db_info::LIMBO
        | db_info::SET_PAGE_BUFFERS => InfoValue::Int(vax_integer(data) as i64),

        db_info::NO_RESERVE | db_info::FORCED_WRITES | db_info::DB_READ_ONLY => {
            InfoValue::Bool(byte(0)? == 1)
        }

        db_info::USER_NAMES => {
            let len = byte(0)? as usize;
            InfoValue::Text(charset.decode(slice(data, 1, len)?)?)
        }

        db_info::BASE_LEVEL => InfoValue::Text(format!("{}.{}", byte(0)?, byte(1)?)),

        db_info::IMPLEMENTATION => {
            InfoValue::Text(format!("{}.{}.{}", byte(0)?, byte(1)?, byte(2)?))
        }

        db_info::DB_ID => {
            // count, file name, site name
            let file_len = byte(1)? as usize;
            let file = charset.decode(slice(data, 2, file_len)?)?;
            let site_pos = 2 + file_len;
            let site_len = byte(site_pos)? as usize;
            let site = charset.decode(slice(data, site_pos + 1, site_len)?)?;
            InfoValue::Text(format!("{}:{}", site, file))
        }

        db_info::ISC_VERSION | db_info::FIREBIRD_VERSION => {
            let count = byte(0)? as usize;
            let mut pos = 1;
            let mut versions = Vec::with_capacity(count);
            for _ in 0..count {
                let len = byte(pos)? as usize;
                versions.push(charset.decode(slice(data, pos + 1, len)?)?);
                pos += 1 + len;
            }
            InfoValue::Versions(versions)
        }

        db_info::DB_CLASS => match vax_integer(data) {
            db_info::CLASS_CLASSIC => InfoValue::Text("CLASSIC SERVER".into()),
            db_info::CLASS_SUPER => InfoValue::Text("SUPER SERVER".into()),
            other => InfoValue::Int(other as i64),
        },

        db_info::CREATION_DATE => {
            let date = vax_integer(slice(data, 0, 4)?);
            let time = vax_integer(slice(data, 4, 4)?);
            InfoValue::Timestamp(decode_timestamp(date, time)?)
        }

        _ => InfoValue::Raw(Bytes::copy_from_slice(data)),
    })
}

fn slice(data: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    data.get(start..start + len).ok_or(Error::BufferUnderflow {
        needed: start + len,
        available: data.len(),
    })
}
