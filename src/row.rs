//! Row data handling for Firebird query results
//!
//! This module provides types and functions for:
//! - Representing column values in a type-safe manner
//! - Decoding row data from the XDR wire format, one value and one null
//!   indicator per column
//! - Encoding parameter values against a statement's input descriptor

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::buffer::{WriteBuffer, XdrRead};
use crate::charset::Charset;
use crate::constants::{isc, sql_type};
use crate::descriptor::{Descriptor, Field};
use crate::error::{Error, Result};
use crate::types::{
    decode_date, decode_decimal, decode_time, decode_timestamp, encode_date, encode_decimal,
    encode_time, encode_timestamp, narrow_i16, narrow_i32,
};

/// Represents a value from a Firebird column or a statement parameter.
///
/// Raw wire data is decoded once into the variant matching the column type.
/// Accessors such as [`Value::as_i64`] or [`Value::as_decimal`] convert
/// between compatible representations on demand.
///
/// # Example
///
/// ```rust,no_run
/// use firebird_rs::Value;
///
/// fn describe(value: &Value) {
///     match value {
///         Value::Null => println!("NULL"),
///         Value::String(s) => println!("String: {}", s),
///         Value::Integer(i) => println!("Integer: {}", i),
///         other => println!("Other: {}", other),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// CHAR or VARCHAR text
    String(String),
    /// CHAR or VARCHAR in the OCTETS character set
    Bytes(Vec<u8>),
    /// SMALLINT
    SmallInt(i16),
    /// INTEGER
    Integer(i32),
    /// BIGINT
    BigInt(i64),
    /// FLOAT
    Float(f32),
    /// DOUBLE PRECISION
    Double(f64),
    /// NUMERIC or DECIMAL
    Decimal(Decimal),
    /// DATE
    Date(NaiveDate),
    /// TIME
    Time(NaiveTime),
    /// TIMESTAMP
    Timestamp(NaiveDateTime),
    /// BOOLEAN
    Boolean(bool),
    /// Blob id; read the contents with [`crate::Blob`]
    Blob(i64),
    /// Array id; read the contents with [`crate::ArrayHandle`]
    Array(i64),
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a 32-bit integer
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|v| i32::try_from(v).ok())
    }

    /// Try to get as an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(*v as i64),
            Value::Integer(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            Value::Decimal(d) => d.trunc().to_i64(),
            Value::Float(f) => Some(*f as i64),
            Value::Double(f) => Some(*f as i64),
            Value::Boolean(b) => Some(*b as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get as a float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f as f64),
            Value::Double(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            Value::String(s) => s.trim().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Try to get as an exact decimal
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::SmallInt(v) => Some(Decimal::from(*v)),
            Value::Integer(v) => Some(Decimal::from(*v)),
            Value::BigInt(v) => Some(Decimal::from(*v)),
            Value::Float(f) => Decimal::try_from(*f).ok(),
            Value::Double(f) => Decimal::try_from(*f).ok(),
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// Try to get as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Try to get as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::SmallInt(_) | Value::Integer(_) | Value::BigInt(_) => {
                self.as_i64().map(|v| v != 0)
            }
            _ => None,
        }
    }

    /// Try to get as a date
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            Value::String(s) => NaiveDate::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// Try to get as a time of day
    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Value::Time(t) => Some(*t),
            Value::Timestamp(ts) => Some(ts.time()),
            Value::String(s) => NaiveTime::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// Try to get as a timestamp
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::String(s) => NaiveDateTime::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// Try to get a blob or array id
    pub fn as_blob_id(&self) -> Option<i64> {
        match self {
            Value::Blob(id) | Value::Array(id) | Value::BigInt(id) => Some(*id),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::SmallInt(_) => "smallint",
            Value::Integer(_) => "integer",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::Boolean(_) => "boolean",
            Value::Blob(_) => "blob id",
            Value::Array(_) => "array id",
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    i16 => SmallInt,
    i32 => Integer,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    Decimal => Decimal,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    bool => Boolean,
    String => String,
    Vec<u8> => Bytes,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::Timestamp(ts) => write!(f, "{}", ts),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Blob(id) => write!(f, "<BLOB {:#x}>", id),
            Value::Array(id) => write!(f, "<ARRAY {:#x}>", id),
        }
    }
}

/// A row of data from a query result.
///
/// Rows contain values that can be accessed by column index (0-based) or by
/// column name or alias.
///
/// # Example
///
/// ```rust,no_run
/// use firebird_rs::{Database, Config};
///
/// # async fn example(db: Database) -> firebird_rs::Result<()> {
/// let tx = db.begin_transaction(Default::default()).await?;
/// let mut stmt = db.create_statement(&tx);
/// stmt.prepare("SELECT id, name FROM employees").await?;
/// stmt.execute(&[]).await?;
///
/// while let Some(row) = stmt.fetch().await? {
///     let id = row.get(0).and_then(|v| v.as_i64());
///     let name = row.get_by_name("name").and_then(|v| v.as_str());
///     println!("{:?}: {:?}", id, name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values
    values: Vec<Value>,
    /// Column names (optional, for named access)
    column_names: Option<Arc<Vec<String>>>,
}

impl Row {
    /// Create a new row with values
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            column_names: None,
        }
    }

    /// Create a new row with values and shared column names
    pub fn with_names(values: Vec<Value>, names: Arc<Vec<String>>) -> Self {
        Self {
            values,
            column_names: Some(names),
        }
    }

    /// Get the number of columns in this row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let names = self.column_names.as_ref()?;
        let index = names.iter().position(|n| n.eq_ignore_ascii_case(name))?;
        self.values.get(index)
    }

    /// Get all values as a slice
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row and return the values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Try to get a string value by index
    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    /// Try to get an integer value by index
    pub fn get_i64(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Value::as_i64)
    }

    /// Check if a column value is NULL
    pub fn is_null(&self, index: usize) -> bool {
        self.get(index).map(Value::is_null).unwrap_or(true)
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Read one value of `field`'s type, without its null indicator
pub async fn read_value<R>(reader: &mut R, field: &Field, charset: Charset) -> Result<Value>
where
    R: XdrRead + ?Sized,
{
    let exact = field.scale < 0 || field.sub_type == 1 || field.sub_type == 2;

    Ok(match field.base_type() {
        sql_type::TEXT => {
            let bytes = reader.read_opaque(field.length.max(0) as usize).await?;
            text_value(field, &bytes, charset, true)?
        }
        sql_type::VARYING => {
            let bytes = reader.read_buffer().await?;
            text_value(field, &bytes, charset, false)?
        }
        sql_type::SHORT => {
            let v = reader.read_int().await?;
            if exact {
                Value::Decimal(decode_decimal(v as i64, field.scale)?)
            } else {
                Value::SmallInt(v as i16)
            }
        }
        sql_type::LONG => {
            let v = reader.read_int().await?;
            if exact {
                Value::Decimal(decode_decimal(v as i64, field.scale)?)
            } else {
                Value::Integer(v)
            }
        }
        sql_type::INT64 => {
            let v = reader.read_long().await?;
            if exact {
                Value::Decimal(decode_decimal(v, field.scale)?)
            } else {
                Value::BigInt(v)
            }
        }
        sql_type::FLOAT => Value::Float(reader.read_float().await?),
        sql_type::DOUBLE | sql_type::D_FLOAT => Value::Double(reader.read_double().await?),
        sql_type::DATE => Value::Date(decode_date(reader.read_int().await?)?),
        sql_type::TIME => Value::Time(decode_time(reader.read_int().await?)?),
        sql_type::TIMESTAMP => {
            let date = reader.read_int().await?;
            let time = reader.read_int().await?;
            Value::Timestamp(decode_timestamp(date, time)?)
        }
        sql_type::BLOB | sql_type::QUAD => Value::Blob(reader.read_long().await?),
        sql_type::ARRAY => Value::Array(reader.read_long().await?),
        sql_type::BOOLEAN => {
            let b = reader.read_opaque(1).await?;
            Value::Boolean(b[0] != 0)
        }
        sql_type::NULL => Value::Null,
        other => return Err(Error::InvalidDataType(other)),
    })
}

fn text_value(field: &Field, bytes: &[u8], charset: Charset, fixed: bool) -> Result<Value> {
    let cs = field.charset(charset);
    if cs.is_octets() {
        return Ok(Value::Bytes(bytes.to_vec()));
    }
    let mut s = cs.decode(bytes)?;
    // Multi-byte CHAR values are padded to the byte length, not the char count
    if fixed && field.length.max(0) as usize % field.bytes_per_char() == 0 {
        let limit = field.char_count();
        if let Some((idx, _)) = s.char_indices().nth(limit) {
            s.truncate(idx);
        }
    }
    Ok(Value::String(s))
}

/// Read one row: for each field its value followed by an int32 null
/// indicator (-1 means NULL)
pub async fn read_row_values<R>(
    reader: &mut R,
    descriptor: &Descriptor,
    charset: Charset,
) -> Result<Vec<Value>>
where
    R: XdrRead + ?Sized,
{
    let mut values = Vec::with_capacity(descriptor.count());
    for field in descriptor.fields() {
        let value = read_value(reader, field, charset).await?;
        let indicator = reader.read_int().await?;
        values.push(match indicator {
            -1 => Value::Null,
            0 => value,
            other => {
                return Err(Error::Protocol(format!(
                    "invalid null indicator {} for column {}",
                    other,
                    field.display_name()
                )))
            }
        });
    }
    Ok(values)
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode parameter values as the message described by `descriptor`
///
/// Every value is converted and checked before anything is returned, so a
/// data error never leaves a partial request on the wire.
pub fn encode_parameters(
    descriptor: &Descriptor,
    params: &[Value],
    charset: Charset,
) -> Result<Bytes> {
    if params.len() != descriptor.count() {
        return Err(Error::DataConversion(format!(
            "statement expects {} parameters, {} given",
            descriptor.count(),
            params.len()
        )));
    }

    let mut buf = WriteBuffer::new();
    for (field, value) in descriptor.fields().iter().zip(params) {
        if value.is_null() {
            write_null(&mut buf, field)?;
            buf.write_i32(-1)?;
        } else {
            write_value(&mut buf, field, value, charset)?;
            buf.write_i32(0)?;
        }
    }
    Ok(buf.freeze())
}

fn write_null(buf: &mut WriteBuffer, field: &Field) -> Result<()> {
    match field.base_type() {
        sql_type::TEXT => buf.write_opaque(&[], field.length.max(0) as usize),
        sql_type::VARYING => buf.write_buffer(&[]),
        sql_type::SHORT | sql_type::LONG | sql_type::FLOAT | sql_type::DATE | sql_type::TIME => {
            buf.write_i32(0)
        }
        sql_type::INT64
        | sql_type::DOUBLE
        | sql_type::D_FLOAT
        | sql_type::BLOB
        | sql_type::QUAD
        | sql_type::ARRAY => buf.write_i64(0),
        sql_type::TIMESTAMP => {
            buf.write_i32(0)?;
            buf.write_i32(0)
        }
        sql_type::BOOLEAN => buf.write_opaque(&[0], 1),
        sql_type::NULL => Ok(()),
        other => Err(Error::InvalidDataType(other)),
    }
}

/// Write one non-null value in the layout of `field`
pub fn write_value(
    buf: &mut WriteBuffer,
    field: &Field,
    value: &Value,
    charset: Charset,
) -> Result<()> {
    let mismatch = || {
        Error::DataConversion(format!(
            "cannot convert {} to column type {}",
            value.type_name(),
            field.base_type()
        ))
    };
    let exact = field.scale < 0 || field.sub_type == 1 || field.sub_type == 2;

    match field.base_type() {
        sql_type::TEXT => {
            let bytes = text_bytes(field, value, charset)?;
            buf.write_opaque(&bytes, field.length.max(0) as usize)
        }
        sql_type::VARYING => {
            let bytes = text_bytes(field, value, charset)?;
            buf.write_buffer(&bytes)
        }
        sql_type::SHORT => {
            let v = if exact {
                encode_decimal(&value.as_decimal().ok_or_else(mismatch)?, field.scale)?
            } else {
                value.as_i64().ok_or_else(mismatch)?
            };
            buf.write_i16(narrow_i16(v)?)
        }
        sql_type::LONG => {
            let v = if exact {
                encode_decimal(&value.as_decimal().ok_or_else(mismatch)?, field.scale)?
            } else {
                value.as_i64().ok_or_else(mismatch)?
            };
            buf.write_i32(narrow_i32(v)?)
        }
        sql_type::INT64 => {
            let v = if exact {
                encode_decimal(&value.as_decimal().ok_or_else(mismatch)?, field.scale)?
            } else {
                value.as_i64().ok_or_else(mismatch)?
            };
            buf.write_i64(v)
        }
        sql_type::FLOAT => buf.write_f32(value.as_f64().ok_or_else(mismatch)? as f32),
        sql_type::DOUBLE | sql_type::D_FLOAT => buf.write_f64(value.as_f64().ok_or_else(mismatch)?),
        sql_type::DATE => buf.write_i32(encode_date(value.as_date().ok_or_else(mismatch)?)),
        sql_type::TIME => buf.write_i32(encode_time(value.as_time().ok_or_else(mismatch)?)),
        sql_type::TIMESTAMP => {
            let (date, time) = encode_timestamp(value.as_timestamp().ok_or_else(mismatch)?);
            buf.write_i32(date)?;
            buf.write_i32(time)
        }
        sql_type::BLOB | sql_type::QUAD | sql_type::ARRAY => {
            buf.write_i64(value.as_blob_id().ok_or_else(mismatch)?)
        }
        sql_type::BOOLEAN => {
            let b = value.as_bool().ok_or_else(mismatch)?;
            buf.write_opaque(&[b as u8], 1)
        }
        sql_type::NULL => Ok(()),
        other => Err(Error::InvalidDataType(other)),
    }
}

fn text_bytes(field: &Field, value: &Value, charset: Charset) -> Result<Vec<u8>> {
    let cs = field.charset(charset);
    let bytes = match value {
        Value::Bytes(b) => b.clone(),
        Value::String(s) => {
            if s.chars().count() > field.char_count() {
                return Err(truncation());
            }
            cs.encode(s)?
        }
        other => cs.encode(&other.to_string())?,
    };
    if bytes.len() > field.length.max(0) as usize {
        return Err(truncation());
    }
    Ok(bytes)
}

fn truncation() -> Error {
    Error::isc_codes(&[isc::ARITH_EXCEPT, isc::STRING_TRUNCATION])
}
