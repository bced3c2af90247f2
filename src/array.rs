//! Array column access
//!
//! Arrays are read and written as whole slices. The slice layout is
//! described to the server in SDL (slice description language), generated
//! from an [`ArrayDesc`] that is looked up from the system tables.

use bytes::Bytes;

use crate::buffer::{ReadBuffer, WriteBuffer, XdrRead};
use crate::charset::Charset;
use crate::constants::{blr, isc, op, sdl, sql_type};
use crate::database::{Database, SharedSession};
use crate::descriptor::Field;
use crate::error::{Error, Result};
use crate::messages::{GetSliceMessage, PutSliceMessage};
use crate::row::{read_value, write_value, Value};
use crate::statement::{FreeOption, Statement};
use crate::transaction::Transaction;

/// `ArrayDesc::flags` bit marking column-major element order
pub const ARRAY_DESC_COLUMN_MAJOR: i32 = 1;

const ARRAY_DESC_SQL: &str = "SELECT Y.RDB$FIELD_TYPE, Y.RDB$FIELD_SCALE, Y.RDB$FIELD_LENGTH, \
     Y.RDB$DIMENSIONS, X.RDB$FIELD_SOURCE \
     FROM RDB$RELATION_FIELDS X, RDB$FIELDS Y \
     WHERE X.RDB$FIELD_SOURCE = Y.RDB$FIELD_NAME \
     AND X.RDB$RELATION_NAME = ? AND X.RDB$FIELD_NAME = ?";

const ARRAY_BOUNDS_SQL: &str = "SELECT X.RDB$LOWER_BOUND, X.RDB$UPPER_BOUND \
     FROM RDB$FIELD_DIMENSIONS X \
     WHERE X.RDB$FIELD_NAME = ? \
     ORDER BY X.RDB$DIMENSION";

/// Bounds of one array dimension, both inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayBound {
    /// Lower bound
    pub lower: i32,
    /// Upper bound
    pub upper: i32,
}

impl ArrayBound {
    /// Create a bound
    pub fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    /// Number of elements along this dimension
    pub fn len(&self) -> usize {
        (self.upper as i64 - self.lower as i64 + 1).max(0) as usize
    }

    /// Whether the dimension holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape and element type of an array column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDesc {
    /// Element type as a BLR code
    pub blr_type: u8,
    /// Element scale
    pub scale: i32,
    /// Element length in bytes
    pub length: i32,
    /// Layout flags, see [`ARRAY_DESC_COLUMN_MAJOR`]
    pub flags: i32,
    /// Table name
    pub relation: String,
    /// Column name
    pub field: String,
    /// One bound per dimension
    pub bounds: Vec<ArrayBound>,
}

impl ArrayDesc {
    /// Number of dimensions
    pub fn dimensions(&self) -> usize {
        self.bounds.len()
    }

    /// Number of elements in the whole array
    pub fn element_count(&self) -> usize {
        self.bounds.iter().map(ArrayBound::len).product()
    }

    /// Slice length the server expects for the whole array
    pub fn slice_length(&self) -> Result<i32> {
        let elements = self.element_count();
        let mut length = elements * self.length.max(0) as usize;
        if matches!(self.blr_type, blr::VARYING | blr::VARYING2) {
            length += elements * 2;
        }
        i32::try_from(length).map_err(|_| {
            Error::DataConversion(format!("array slice of {} bytes is too large", length))
        })
    }

    /// Field describing one element, used to decode and encode values
    pub fn element_field(&self) -> Result<Field> {
        let sql_type = match self.blr_type {
            blr::TEXT | blr::TEXT2 | blr::CSTRING | blr::CSTRING2 => sql_type::TEXT,
            blr::VARYING | blr::VARYING2 => sql_type::VARYING,
            blr::SHORT => sql_type::SHORT,
            blr::LONG => sql_type::LONG,
            blr::INT64 => sql_type::INT64,
            blr::QUAD => sql_type::QUAD,
            blr::FLOAT => sql_type::FLOAT,
            blr::DOUBLE => sql_type::DOUBLE,
            blr::D_FLOAT => sql_type::D_FLOAT,
            blr::SQL_DATE => sql_type::DATE,
            blr::SQL_TIME => sql_type::TIME,
            blr::TIMESTAMP => sql_type::TIMESTAMP,
            blr::BOOL => sql_type::BOOLEAN,
            other => return Err(Error::InvalidDataType(other as i32)),
        };
        Ok(Field::new(sql_type, 0, self.scale, self.length))
    }

    /// Generate the SDL describing a full slice of this array
    pub fn to_sdl(&self) -> Result<Bytes> {
        let dimensions = self.dimensions();
        if dimensions > sdl::MAX_DIMENSIONS {
            return Err(Error::isc(isc::INVALID_DIMENSION));
        }

        let mut out = vec![sdl::VERSION1, sdl::STRUCT, 1, self.blr_type];
        match self.blr_type {
            blr::SHORT | blr::LONG | blr::INT64 | blr::QUAD => out.push(self.scale as i8 as u8),
            blr::TEXT | blr::CSTRING | blr::VARYING => {
                out.extend_from_slice(&(self.length as i16).to_le_bytes())
            }
            _ => {}
        }
        push_name(&mut out, sdl::RELATION, &self.relation)?;
        push_name(&mut out, sdl::FIELD, &self.field)?;

        let order: Vec<usize> = if self.flags & ARRAY_DESC_COLUMN_MAJOR != 0 {
            (0..dimensions).rev().collect()
        } else {
            (0..dimensions).collect()
        };
        for n in order {
            let bound = self.bounds[n];
            if bound.lower == 1 {
                out.extend_from_slice(&[sdl::DO1, n as u8]);
            } else {
                out.extend_from_slice(&[sdl::DO2, n as u8]);
                push_literal(&mut out, bound.lower);
            }
            push_literal(&mut out, bound.upper);
        }

        out.extend_from_slice(&[sdl::ELEMENT, 1, sdl::SCALAR, 0, dimensions as u8]);
        for n in 0..dimensions {
            out.extend_from_slice(&[sdl::VARIABLE, n as u8]);
        }
        out.push(sdl::EOC);
        Ok(Bytes::from(out))
    }
}

fn push_name(out: &mut Vec<u8>, tag: u8, name: &str) -> Result<()> {
    let len = u8::try_from(name.len())
        .map_err(|_| Error::DataConversion(format!("name too long for SDL: {}", name)))?;
    out.push(tag);
    out.push(len);
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

fn push_literal(out: &mut Vec<u8>, value: i32) {
    if (-128..=127).contains(&value) {
        out.extend_from_slice(&[sdl::TINY_INTEGER, value as i8 as u8]);
    } else if (-32768..=32767).contains(&value) {
        out.push(sdl::SHORT_INTEGER);
        out.extend_from_slice(&(value as i16).to_le_bytes());
    } else {
        out.push(sdl::LONG_INTEGER);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// The contents of an array: its bounds and the elements in storage order
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySlice {
    /// One bound per dimension
    pub bounds: Vec<ArrayBound>,
    /// Elements, last dimension varying fastest
    pub values: Vec<Value>,
}

/// Reads and writes one array column
///
/// # Example
///
/// ```rust,no_run
/// use firebird_rs::{ArrayBound, ArraySlice, Database, TransactionOptions, Value};
///
/// # async fn example(db: Database) -> firebird_rs::Result<()> {
/// let tx = db.begin_transaction(TransactionOptions::default()).await?;
/// let array = db.array(&tx, "SAMPLES", "READINGS").await?;
///
/// let id = array
///     .put_slice(&tx, &ArraySlice {
///         bounds: vec![ArrayBound::new(1, 3)],
///         values: vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
///     })
///     .await?;
/// let slice = array.get_slice(&tx, id).await?;
/// assert_eq!(slice.values.len(), 3);
/// # Ok(())
/// # }
/// ```
pub struct ArrayHandle {
    session: SharedSession,
    desc: ArrayDesc,
    charset: Charset,
}

impl ArrayHandle {
    pub(crate) async fn lookup(
        db: &Database,
        transaction: &Transaction,
        relation: &str,
        field: &str,
    ) -> Result<Self> {
        let mut stmt = db.create_statement(transaction);
        let result = lookup_desc(&mut stmt, relation, field).await;
        if let Err(e) = stmt.free(FreeOption::Drop).await {
            tracing::warn!(error = %e, "freeing array lookup statement failed");
        }
        let desc = result?;
        tracing::debug!(
            relation,
            field,
            blr_type = desc.blr_type,
            dimensions = desc.dimensions(),
            "array descriptor loaded"
        );

        Ok(Self {
            session: db.shared_session(),
            desc,
            charset: db.config().charset,
        })
    }

    /// Create a handle from a known descriptor
    pub fn with_desc(db: &Database, desc: ArrayDesc) -> Self {
        Self {
            session: db.shared_session(),
            desc,
            charset: db.config().charset,
        }
    }

    /// Descriptor of the array column
    pub fn desc(&self) -> &ArrayDesc {
        &self.desc
    }

    /// Read the whole array `id`
    pub async fn get_slice(&self, transaction: &Transaction, id: i64) -> Result<ArraySlice> {
        let tx_handle = transaction_handle(transaction)?;
        let sdl = self.desc.to_sdl()?;
        let request =
            GetSliceMessage::new(tx_handle, id, self.desc.slice_length()?, &sdl).build_request()?;

        let mut session = self.session.lock().await;
        session.wire.send(request).await?;

        let operation = session.wire.read_operation().await?;
        if operation != op::SLICE {
            // Not a slice: decode it as an ordinary reply to surface the server error
            session.wire.push_operation(operation);
            session.wire.read_response().await?;
            return Err(Error::UnexpectedOperation {
                expected: op::SLICE,
                actual: operation,
            });
        }

        // The first length word repeats the second
        session.wire.read_int().await?;
        let mut length = session.wire.read_int().await?.max(0) as i64;
        let element_length = self.desc.length.max(1) as i64;

        let data = match self.desc.blr_type {
            blr::TEXT | blr::TEXT2 | blr::CSTRING | blr::CSTRING2 => {
                let elements = length / element_length;
                length += elements * ((4 - element_length) & 3);
                session.wire.read_opaque(length as usize).await?
            }
            blr::VARYING | blr::VARYING2 => {
                let elements = length / element_length;
                let mut buf = WriteBuffer::new();
                for _ in 0..elements {
                    let element = session.wire.read_buffer().await?;
                    buf.write_buffer(&element)?;
                }
                buf.freeze()
            }
            blr::SHORT => session.wire.read_opaque((length * element_length) as usize).await?,
            _ => session.wire.read_opaque(length as usize).await?,
        };
        drop(session);

        let values = decode_slice(&self.desc, &data, self.charset).await?;
        Ok(ArraySlice {
            bounds: self.desc.bounds.clone(),
            values,
        })
    }

    /// Write `slice` as a new array and return its id
    pub async fn put_slice(&self, transaction: &Transaction, slice: &ArraySlice) -> Result<i64> {
        let tx_handle = transaction_handle(transaction)?;
        if slice.bounds.len() != self.desc.dimensions() {
            return Err(Error::DataConversion(format!(
                "array has {} dimensions, slice has {}",
                self.desc.dimensions(),
                slice.bounds.len()
            )));
        }

        let mut desc = self.desc.clone();
        desc.bounds = slice.bounds.clone();
        if slice.values.len() != desc.element_count() {
            return Err(Error::DataConversion(format!(
                "slice bounds hold {} elements, {} given",
                desc.element_count(),
                slice.values.len()
            )));
        }

        let sdl = desc.to_sdl()?;
        let data = encode_slice(&desc, &slice.values, self.charset)?;
        let request =
            PutSliceMessage::new(tx_handle, desc.slice_length()?, &sdl, &data).build_request()?;

        let mut session = self.session.lock().await;
        let response = session.exchange(request).await?;
        tracing::trace!(id = response.blob_id, "array slice written");
        Ok(response.blob_id)
    }
}

impl std::fmt::Debug for ArrayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayHandle").field("desc", &self.desc).finish()
    }
}

async fn lookup_desc(stmt: &mut Statement, relation: &str, field: &str) -> Result<ArrayDesc> {
    let not_found =
        || Error::InvalidState(format!("array column {}.{} not found", relation, field));
    let int = |value: Option<&Value>| value.and_then(Value::as_i64).ok_or_else(not_found);

    stmt.prepare(ARRAY_DESC_SQL).await?;
    stmt.execute(&[Value::from(relation), Value::from(field)]).await?;
    let row = stmt.fetch().await?.ok_or_else(not_found)?;

    let blr_type = u8::try_from(int(row.get(0))?).map_err(|_| not_found())?;
    let scale = int(row.get(1))? as i32;
    let length = int(row.get(2))? as i32;
    let dimensions = int(row.get(3))?.max(0) as usize;
    let source = row
        .get(4)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(not_found)?;

    stmt.prepare(ARRAY_BOUNDS_SQL).await?;
    stmt.execute(&[Value::from(source)]).await?;
    let mut bounds = Vec::with_capacity(dimensions);
    while let Some(row) = stmt.fetch().await? {
        bounds.push(ArrayBound::new(int(row.get(0))? as i32, int(row.get(1))? as i32));
    }
    if bounds.len() != dimensions {
        return Err(Error::Protocol(format!(
            "array {}.{} declares {} dimensions, found bounds for {}",
            relation,
            field,
            dimensions,
            bounds.len()
        )));
    }

    Ok(ArrayDesc {
        blr_type,
        scale,
        length,
        flags: 0,
        relation: relation.to_string(),
        field: field.to_string(),
        bounds,
    })
}

fn transaction_handle(transaction: &Transaction) -> Result<i32> {
    transaction
        .handle()
        .ok_or_else(|| Error::InvalidState("transaction is not active".into()))
}

fn word4(w: &[u8]) -> [u8; 4] {
    [w[0], w[1], w[2], w[3]]
}

fn word8(w: &[u8]) -> [u8; 8] {
    [w[0], w[1], w[2], w[3], w[4], w[5], w[6], w[7]]
}

/// Decode the elements of a received slice
///
/// Unscaled integer and floating point elements are decoded word by word
/// straight from the buffer; everything else goes through the row decoder.
pub async fn decode_slice(desc: &ArrayDesc, data: &[u8], charset: Charset) -> Result<Vec<Value>> {
    let field = desc.element_field()?;

    if field.scale == 0 {
        let values: Option<Vec<Value>> = match field.base_type() {
            sql_type::SHORT => Some(
                data.chunks_exact(4)
                    .map(|w| Value::SmallInt(i32::from_be_bytes(word4(w)) as i16))
                    .collect(),
            ),
            sql_type::LONG => Some(
                data.chunks_exact(4)
                    .map(|w| Value::Integer(i32::from_be_bytes(word4(w))))
                    .collect(),
            ),
            sql_type::INT64 => Some(
                data.chunks_exact(8)
                    .map(|w| Value::BigInt(i64::from_be_bytes(word8(w))))
                    .collect(),
            ),
            sql_type::FLOAT => Some(
                data.chunks_exact(4)
                    .map(|w| Value::Float(f32::from_bits(u32::from_be_bytes(word4(w)))))
                    .collect(),
            ),
            sql_type::DOUBLE | sql_type::D_FLOAT => Some(
                data.chunks_exact(8)
                    .map(|w| Value::Double(f64::from_bits(u64::from_be_bytes(word8(w)))))
                    .collect(),
            ),
            _ => None,
        };
        if let Some(values) = values {
            return Ok(values);
        }
    }

    let mut r = ReadBuffer::from_slice(data);
    let mut values = Vec::with_capacity(desc.element_count());
    while r.remaining() > 0 {
        values.push(read_value(&mut r, &field, charset).await?);
    }
    Ok(values)
}

/// Encode elements in the slice layout of `desc`
pub fn encode_slice(desc: &ArrayDesc, values: &[Value], charset: Charset) -> Result<Bytes> {
    let field = desc.element_field()?;
    let mut buf = WriteBuffer::new();
    for value in values {
        if value.is_null() {
            return Err(Error::UnexpectedNull);
        }
        write_value(&mut buf, &field, value, charset)?;
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn int_desc(bounds: Vec<ArrayBound>) -> ArrayDesc {
        ArrayDesc {
            blr_type: blr::LONG,
            scale: 0,
            length: 4,
            flags: 0,
            relation: "T".into(),
            field: "A".into(),
            bounds,
        }
    }

    #[test]
    fn test_sdl_one_dimension() {
        let sdl = int_desc(vec![ArrayBound::new(1, 10)]).to_sdl().unwrap();
        assert_eq!(
            &sdl[..],
            &[
                sdl::VERSION1,
                sdl::STRUCT,
                1,
                blr::LONG,
                0,
                sdl::RELATION,
                1,
                b'T',
                sdl::FIELD,
                1,
                b'A',
                sdl::DO1,
                0,
                sdl::TINY_INTEGER,
                10,
                sdl::ELEMENT,
                1,
                sdl::SCALAR,
                0,
                1,
                sdl::VARIABLE,
                0,
                sdl::EOC
            ]
        );
    }

    #[test]
    fn test_sdl_literals_and_lower_bounds() {
        let sdl = int_desc(vec![ArrayBound::new(0, 300), ArrayBound::new(-5, 100000)])
            .to_sdl()
            .unwrap();
        let dims = &sdl[11..];
        assert_eq!(
            &dims[..16],
            &[
                sdl::DO2,
                0,
                sdl::TINY_INTEGER,
                0,
                sdl::SHORT_INTEGER,
                44,
                1,
                sdl::DO2,
                1,
                sdl::TINY_INTEGER,
                0xFB,
                sdl::LONG_INTEGER,
                0xA0,
                0x86,
                0x01,
                0
            ]
        );
    }

    #[test]
    fn test_sdl_column_major_reverses_dimensions() {
        let mut desc = int_desc(vec![ArrayBound::new(1, 2), ArrayBound::new(1, 3)]);
        desc.flags = ARRAY_DESC_COLUMN_MAJOR;
        let sdl = desc.to_sdl().unwrap();
        assert_eq!(&sdl[11..15], &[sdl::DO1, 1, sdl::TINY_INTEGER, 3]);
    }

    #[test]
    fn test_sdl_text_carries_length() {
        let mut desc = int_desc(vec![ArrayBound::new(1, 2)]);
        desc.blr_type = blr::VARYING;
        desc.length = 300;
        let sdl = desc.to_sdl().unwrap();
        assert_eq!(&sdl[3..6], &[blr::VARYING, 44, 1]);
    }

    #[test]
    fn test_too_many_dimensions() {
        let desc = int_desc(vec![ArrayBound::new(1, 1); 17]);
        let err = desc.to_sdl().unwrap_err();
        assert_eq!(err.error_code(), Some(isc::INVALID_DIMENSION));
    }

    #[test]
    fn test_slice_length() {
        let desc = int_desc(vec![ArrayBound::new(1, 3), ArrayBound::new(0, 1)]);
        assert_eq!(desc.element_count(), 6);
        assert_eq!(desc.slice_length().unwrap(), 24);

        let mut varying = desc.clone();
        varying.blr_type = blr::VARYING;
        varying.length = 10;
        assert_eq!(varying.slice_length().unwrap(), 72);
    }

    #[tokio::test]
    async fn test_decode_integer_slice() {
        let desc = int_desc(vec![ArrayBound::new(1, 3)]);
        let data = [0, 0, 0, 1, 0, 0, 0, 2, 0xFF, 0xFF, 0xFF, 0xFF];
        let values = decode_slice(&desc, &data, Charset::Utf8).await.unwrap();
        assert_eq!(
            values,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(-1)]
        );
    }

    #[tokio::test]
    async fn test_decode_scaled_slice() {
        let mut desc = int_desc(vec![ArrayBound::new(1, 2)]);
        desc.scale = -2;
        let data = [0, 0, 0x04, 0xD2, 0, 0, 0, 5];
        let values = decode_slice(&desc, &data, Charset::Utf8).await.unwrap();
        assert_eq!(
            values,
            vec![
                Value::Decimal(Decimal::new(1234, 2)),
                Value::Decimal(Decimal::new(5, 2))
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_varying_slice() {
        let mut desc = int_desc(vec![ArrayBound::new(1, 2)]);
        desc.blr_type = blr::VARYING;
        desc.length = 8;
        let mut buf = WriteBuffer::new();
        buf.write_buffer(b"ab").unwrap();
        buf.write_buffer(b"cdefg").unwrap();
        let values = decode_slice(&desc, buf.as_slice(), Charset::Utf8)
            .await
            .unwrap();
        assert_eq!(values, vec![Value::from("ab"), Value::from("cdefg")]);
    }

    #[test]
    fn test_encode_slice_rejects_null() {
        let desc = int_desc(vec![ArrayBound::new(1, 1)]);
        assert!(matches!(
            encode_slice(&desc, &[Value::Null], Charset::Utf8),
            Err(Error::UnexpectedNull)
        ));
    }

    #[test]
    fn test_encode_short_slice_uses_words() {
        let mut desc = int_desc(vec![ArrayBound::new(1, 2)]);
        desc.blr_type = blr::SHORT;
        desc.length = 2;
        let data = encode_slice(&desc, &[Value::SmallInt(7), Value::SmallInt(-1)], Charset::Utf8)
            .unwrap();
        assert_eq!(&data[..], &[0, 0, 0, 7, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
