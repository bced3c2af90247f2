//! Row and parameter descriptors
//!
//! A [`Descriptor`] is the shape of a result row or of a statement's
//! parameter list as reported by the server when a statement is prepared.
//! It drives row decoding, parameter encoding and the BLR message format
//! sent with execute and fetch requests.
//!
//! The describe reply may not fit the buffer the client offered. [`describe`]
//! parses as much as arrived and, when the reply was truncated, hands back
//! the item list to re-request the remainder with
//! (see [`DescribeOutcome::Truncated`]).

use bytes::Bytes;

use crate::buffer::ReadBuffer;
use crate::charset::Charset;
use crate::constants::{blr, info, isc, sql_info, sql_type};
use crate::error::{Error, Result};

/// Items requested when a statement is prepared: the select block then the
/// bind block
pub const DESCRIBE_ITEMS: [u8; 22] = [
    sql_info::SELECT,
    sql_info::DESCRIBE_VARS,
    sql_info::SQLDA_SEQ,
    sql_info::TYPE,
    sql_info::SUB_TYPE,
    sql_info::LENGTH,
    sql_info::SCALE,
    sql_info::FIELD,
    sql_info::RELATION,
    sql_info::ALIAS,
    sql_info::DESCRIBE_END,
    sql_info::BIND,
    sql_info::DESCRIBE_VARS,
    sql_info::SQLDA_SEQ,
    sql_info::TYPE,
    sql_info::SUB_TYPE,
    sql_info::LENGTH,
    sql_info::SCALE,
    sql_info::FIELD,
    sql_info::RELATION,
    sql_info::ALIAS,
    sql_info::DESCRIBE_END,
];

// =============================================================================
// Data types
// =============================================================================

/// Logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDataType {
    /// Fixed-length text
    Char,
    /// Variable-length text
    VarChar,
    /// CHAR or VARCHAR in the OCTETS character set
    Binary,
    /// 16-bit integer
    SmallInt,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    BigInt,
    /// Exact numeric declared as NUMERIC
    Numeric,
    /// Exact numeric declared as DECIMAL
    Decimal,
    /// Single precision float
    Float,
    /// Double precision float
    Double,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time of day
    TimeStamp,
    /// Text blob
    Text,
    /// Binary blob
    Blob,
    /// Array
    Array,
    /// Boolean
    Boolean,
    /// Untyped NULL parameter
    Null,
}

// =============================================================================
// Field
// =============================================================================

/// One column or parameter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    /// SQL type code; the low bit marks a nullable column
    pub sql_type: i32,
    /// Sub type; for text columns the low byte is the character set id
    pub sub_type: i32,
    /// Decimal scale (zero or negative)
    pub scale: i32,
    /// Length in bytes
    pub length: i32,
    /// Column name
    pub name: String,
    /// Table the column belongs to
    pub relation: String,
    /// Owner of the table
    pub owner: String,
    /// Column alias
    pub alias: String,
}

impl Field {
    /// Create a field of the given type
    pub fn new(sql_type: i32, sub_type: i32, scale: i32, length: i32) -> Self {
        Self {
            sql_type,
            sub_type,
            scale,
            length,
            ..Default::default()
        }
    }

    /// SQL type with the nullable bit cleared
    pub fn base_type(&self) -> i32 {
        self.sql_type & !1
    }

    /// Whether the column accepts NULL
    pub fn is_nullable(&self) -> bool {
        self.sql_type & 1 != 0
    }

    /// Character set id of a text column
    pub fn charset_id(&self) -> i32 {
        self.sub_type & 0xFF
    }

    /// Character set of a text column, falling back to the connection one
    pub fn charset(&self, connection: Charset) -> Charset {
        match Charset::from_id(self.charset_id()) {
            Some(Charset::None) | None => connection,
            Some(cs) => cs,
        }
    }

    /// Bytes per character of the declared character set
    pub fn bytes_per_char(&self) -> usize {
        Charset::from_id(self.charset_id()).map_or(1, |cs| cs.bytes_per_char())
    }

    /// Maximum number of characters a CHAR or VARCHAR column holds
    pub fn char_count(&self) -> usize {
        self.length.max(0) as usize / self.bytes_per_char()
    }

    /// Logical type of the column
    pub fn data_type(&self) -> Result<DbDataType> {
        let exact = |plain: DbDataType| match self.sub_type {
            1 => DbDataType::Numeric,
            2 => DbDataType::Decimal,
            _ if self.scale < 0 => DbDataType::Decimal,
            _ => plain,
        };

        Ok(match self.base_type() {
            sql_type::TEXT if self.charset_id() == Charset::Octets.id() => DbDataType::Binary,
            sql_type::TEXT => DbDataType::Char,
            sql_type::VARYING if self.charset_id() == Charset::Octets.id() => DbDataType::Binary,
            sql_type::VARYING => DbDataType::VarChar,
            sql_type::SHORT => exact(DbDataType::SmallInt),
            sql_type::LONG => exact(DbDataType::Integer),
            sql_type::INT64 => exact(DbDataType::BigInt),
            sql_type::FLOAT => DbDataType::Float,
            sql_type::DOUBLE | sql_type::D_FLOAT => DbDataType::Double,
            sql_type::DATE => DbDataType::Date,
            sql_type::TIME => DbDataType::Time,
            sql_type::TIMESTAMP => DbDataType::TimeStamp,
            sql_type::BLOB if self.sub_type == 1 => DbDataType::Text,
            sql_type::BLOB | sql_type::QUAD => DbDataType::Blob,
            sql_type::ARRAY => DbDataType::Array,
            sql_type::BOOLEAN => DbDataType::Boolean,
            sql_type::NULL => DbDataType::Null,
            _ => return Err(Error::InvalidDataType(self.sql_type)),
        })
    }

    /// Name the column is known by: the alias, or the field name
    pub fn display_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.name
        } else {
            &self.alias
        }
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Ordered list of fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    fields: Vec<Field>,
    actual_count: usize,
}

impl Descriptor {
    /// Create a descriptor of `count` empty fields
    pub fn new(count: usize) -> Self {
        Self {
            fields: vec![Field::default(); count],
            actual_count: 0,
        }
    }

    /// Create a fully described descriptor
    pub fn from_fields(fields: Vec<Field>) -> Self {
        let actual_count = fields.len();
        Self {
            fields,
            actual_count,
        }
    }

    /// Number of fields the server declared
    pub fn count(&self) -> usize {
        self.fields.len()
    }

    /// Number of fields described so far
    pub fn actual_count(&self) -> usize {
        self.actual_count
    }

    /// Whether the descriptor has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field at `index`
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Position of the column with the given name or alias
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.display_name().eq_ignore_ascii_case(name))
    }

    fn field_mut(&mut self, seq: i32) -> Result<&mut Field> {
        if seq < 1 {
            return Err(Error::isc(isc::DSQL_SQLDA_ERR));
        }
        self.fields
            .get_mut(seq as usize - 1)
            .ok_or_else(|| Error::isc(isc::DSQL_SQLDA_ERR))
    }

    /// Encode the message format of this descriptor
    ///
    /// Every field is followed by a SHORT null indicator, so the message
    /// declares twice as many items as there are fields.
    pub fn to_blr(&self) -> Result<Bytes> {
        let items = self.fields.len() * 2;
        if items > u16::MAX as usize {
            return Err(Error::Internal(format!("too many fields: {}", self.fields.len())));
        }

        let mut out = Vec::with_capacity(8 + self.fields.len() * 6);
        out.extend_from_slice(&[blr::VERSION5, blr::BEGIN, blr::MESSAGE, 0]);
        out.extend_from_slice(&(items as u16).to_le_bytes());

        for field in &self.fields {
            let len = (field.length.max(0) as u16).to_le_bytes();
            let scale = field.scale as i8 as u8;
            match field.base_type() {
                sql_type::VARYING => {
                    out.push(blr::VARYING);
                    out.extend_from_slice(&len);
                }
                sql_type::TEXT => {
                    out.push(blr::TEXT);
                    out.extend_from_slice(&len);
                }
                sql_type::SHORT => out.extend_from_slice(&[blr::SHORT, scale]),
                sql_type::LONG => out.extend_from_slice(&[blr::LONG, scale]),
                sql_type::INT64 => out.extend_from_slice(&[blr::INT64, scale]),
                sql_type::QUAD => out.extend_from_slice(&[blr::QUAD, scale]),
                sql_type::BLOB | sql_type::ARRAY => out.extend_from_slice(&[blr::QUAD, 0]),
                sql_type::FLOAT => out.push(blr::FLOAT),
                sql_type::DOUBLE | sql_type::D_FLOAT => out.push(blr::DOUBLE),
                sql_type::DATE => out.push(blr::SQL_DATE),
                sql_type::TIME => out.push(blr::SQL_TIME),
                sql_type::TIMESTAMP => out.push(blr::TIMESTAMP),
                sql_type::BOOLEAN => out.push(blr::BOOL),
                sql_type::NULL => out.extend_from_slice(&[blr::TEXT, 0, 0]),
                other => return Err(Error::InvalidDataType(other)),
            }
            out.extend_from_slice(&[blr::SHORT, 0]);
        }

        out.extend_from_slice(&[blr::END, blr::EOC]);
        Ok(Bytes::from(out))
    }
}

// =============================================================================
// Describe
// =============================================================================

/// Result of parsing one describe reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribeOutcome {
    /// Both descriptors are complete
    Complete,
    /// The reply was cut short; re-request with these items
    Truncated {
        /// Describe items prefixed per block with the index to resume from
        items: Vec<u8>,
    },
}

/// Select and bind descriptors being filled in by describe replies
#[derive(Debug, Clone, Default)]
pub struct DescribeState {
    blocks: [Option<Descriptor>; 2],
}

impl DescribeState {
    /// Start with nothing described
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the (select, bind) descriptors
    pub fn into_descriptors(self) -> (Descriptor, Descriptor) {
        let [select, bind] = self.blocks;
        (select.unwrap_or_default(), bind.unwrap_or_default())
    }
}

/// Parse a describe reply into `state`
///
/// `items` is the item list the reply answers. Fields are addressed by
/// their sequence number, so a re-requested reply that repeats fields
/// simply overwrites them.
pub fn describe(
    reply: &[u8],
    items: &[u8],
    state: &mut DescribeState,
    charset: Charset,
) -> Result<DescribeOutcome> {
    let mut r = ReadBuffer::from_slice(reply);
    let mut block: Option<usize> = None;
    let mut seq: i32 = 0;

    loop {
        if r.remaining() == 0 {
            return Err(Error::isc(isc::DSQL_SQLDA_ERR));
        }
        let item = r.read_u8()?;
        match item {
            info::END => return Ok(DescribeOutcome::Complete),
            info::TRUNCATED => {
                let current = block.unwrap_or(usize::MAX);
                let resume = (seq - 1).max(0);
                return Ok(DescribeOutcome::Truncated {
                    items: describe_exact_items(items, state, current, resume),
                });
            }
            sql_info::SELECT | sql_info::BIND => {
                let index = block.map_or(0, |b| b + 1);
                if index > 1 {
                    return Err(Error::isc(isc::DSQL_SQLDA_ERR));
                }
                block = Some(index);
                seq = 0;
                if r.peek_u8()? == info::TRUNCATED {
                    continue;
                }
                // describe_vars
                r.skip(1)?;
                let count = r.read_clumplet_int()?;
                if state.blocks[index].is_none() {
                    state.blocks[index] = Some(Descriptor::new(count.max(0) as usize));
                }
            }
            sql_info::SQLDA_SEQ => {
                seq = r.read_clumplet_int()?;
            }
            sql_info::DESCRIBE_END => {
                let descriptor = current_block(state, block)?;
                descriptor.actual_count = descriptor.actual_count.max(seq.max(0) as usize);
            }
            sql_info::TYPE | sql_info::SUB_TYPE | sql_info::SCALE | sql_info::LENGTH => {
                let value = r.read_clumplet_int()?;
                let field = current_block(state, block)?.field_mut(seq)?;
                match item {
                    sql_info::TYPE => field.sql_type = value,
                    sql_info::SUB_TYPE => field.sub_type = value,
                    sql_info::SCALE => field.scale = value,
                    _ => field.length = value,
                }
            }
            sql_info::FIELD | sql_info::RELATION | sql_info::OWNER | sql_info::ALIAS => {
                let bytes = r.read_clumplet_bytes()?;
                let text = charset.decode(&bytes)?;
                let field = current_block(state, block)?.field_mut(seq)?;
                match item {
                    sql_info::FIELD => field.name = text,
                    sql_info::RELATION => field.relation = text,
                    sql_info::OWNER => field.owner = text,
                    _ => field.alias = text,
                }
            }
            _ => return Err(Error::isc(isc::DSQL_SQLDA_ERR)),
        }
    }
}

fn current_block(state: &mut DescribeState, block: Option<usize>) -> Result<&mut Descriptor> {
    block
        .and_then(|b| state.blocks[b].as_mut())
        .ok_or_else(|| Error::isc(isc::DSQL_SQLDA_ERR))
}

/// Build the item list that resumes a truncated describe
///
/// Each block of `items` is prefixed with `sqlda_start, 2, lo, hi`. The
/// block being parsed when the reply was cut resumes at `resume`; finished
/// blocks skip past their declared count and unreached blocks start at 0.
pub fn describe_exact_items(
    items: &[u8],
    state: &DescribeState,
    current: usize,
    resume: i32,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(items.len() + 8);
    let mut part = 0usize;
    let mut block_start = 0usize;

    for &item in items {
        if item == sql_info::DESCRIBE_END {
            let start = if part == current {
                resume
            } else {
                state
                    .blocks
                    .get(part)
                    .and_then(|b| b.as_ref())
                    .map_or(0, |d| d.count() as i32)
            };
            let prefix = [
                sql_info::SQLDA_START,
                2,
                (start & 0xFF) as u8,
                ((start >> 8) & 0xFF) as u8,
            ];
            out.splice(block_start..block_start, prefix);
            part += 1;
            out.push(item);
            block_start = out.len();
            continue;
        }
        out.push(item);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clumplet_int(out: &mut Vec<u8>, tag: u8, value: i32) {
        out.push(tag);
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn clumplet_str(out: &mut Vec<u8>, tag: u8, value: &str) {
        out.push(tag);
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
    }

    fn describe_field(out: &mut Vec<u8>, seq: i32, sql_type: i32, length: i32, name: &str) {
        clumplet_int(out, sql_info::SQLDA_SEQ, seq);
        clumplet_int(out, sql_info::TYPE, sql_type);
        clumplet_int(out, sql_info::SUB_TYPE, 0);
        clumplet_int(out, sql_info::LENGTH, length);
        clumplet_int(out, sql_info::SCALE, 0);
        clumplet_str(out, sql_info::FIELD, name);
        clumplet_str(out, sql_info::RELATION, "T");
        clumplet_str(out, sql_info::ALIAS, name);
        out.push(sql_info::DESCRIBE_END);
    }

    #[test]
    fn test_blr_for_mixed_fields() {
        let desc = Descriptor::from_fields(vec![
            Field::new(sql_type::VARYING + 1, 0, 0, 10),
            Field::new(sql_type::LONG, 0, -2, 4),
            Field::new(sql_type::TIMESTAMP, 0, 0, 8),
        ]);
        let blr = desc.to_blr().unwrap();
        assert_eq!(
            &blr[..],
            &[
                5, 2, 4, 0, 6, 0, // header, 6 items
                37, 10, 0, 7, 0, // varying(10) + null
                8, 0xFE, 7, 0, // long scale -2 + null
                35, 7, 0, // timestamp + null
                255, 76,
            ]
        );
    }

    #[test]
    fn test_blr_blob_and_null() {
        let desc = Descriptor::from_fields(vec![
            Field::new(sql_type::BLOB, 1, 0, 8),
            Field::new(sql_type::NULL, 0, 0, 0),
        ]);
        let blr = desc.to_blr().unwrap();
        assert_eq!(&blr[6..], &[9, 0, 7, 0, 14, 0, 0, 7, 0, 255, 76]);
    }

    #[test]
    fn test_empty_descriptor_blr() {
        let blr = Descriptor::new(0).to_blr().unwrap();
        assert_eq!(&blr[..], &[5, 2, 4, 0, 0, 0, 255, 76]);
    }

    #[test]
    fn test_data_types() {
        let data_type = |sql_type, sub_type, scale, length| {
            Field::new(sql_type, sub_type, scale, length).data_type().unwrap()
        };
        assert_eq!(data_type(sql_type::SHORT, 0, -1, 2), DbDataType::Decimal);
        assert_eq!(data_type(sql_type::LONG, 1, -2, 4), DbDataType::Numeric);
        assert_eq!(data_type(sql_type::INT64, 0, 0, 8), DbDataType::BigInt);
        assert_eq!(data_type(sql_type::TEXT, 1, 0, 8), DbDataType::Binary);
        assert_eq!(data_type(sql_type::BLOB + 1, 1, 4, 8), DbDataType::Text);

        // The error carries the type as the server sent it, nullable bit included
        assert!(matches!(
            Field::new(12345, 0, 0, 0).data_type(),
            Err(Error::InvalidDataType(12345))
        ));
        assert!(matches!(
            Field::new(12344, 0, 0, 0).data_type(),
            Err(Error::InvalidDataType(12344))
        ));
    }

    #[test]
    fn test_char_count_uses_field_charset() {
        let utf8 = Field::new(sql_type::TEXT, Charset::Utf8.id(), 0, 40);
        assert_eq!(utf8.char_count(), 10);
        let none = Field::new(sql_type::TEXT, 0, 0, 40);
        assert_eq!(none.char_count(), 40);
        assert_eq!(none.charset(Charset::Iso8859_1), Charset::Iso8859_1);
    }

    #[test]
    fn test_describe_complete() {
        let mut reply = vec![sql_info::SELECT];
        clumplet_int(&mut reply, sql_info::DESCRIBE_VARS, 2);
        describe_field(&mut reply, 1, sql_type::LONG, 4, "ID");
        describe_field(&mut reply, 2, sql_type::VARYING + 1, 20, "NAME");
        reply.push(sql_info::BIND);
        clumplet_int(&mut reply, sql_info::DESCRIBE_VARS, 0);
        reply.push(info::END);

        let mut state = DescribeState::new();
        let outcome = describe(&reply, &DESCRIBE_ITEMS, &mut state, Charset::Utf8).unwrap();
        assert_eq!(outcome, DescribeOutcome::Complete);

        let (select, bind) = state.into_descriptors();
        assert_eq!(select.count(), 2);
        assert_eq!(select.actual_count(), 2);
        assert_eq!(select.fields()[1].name, "NAME");
        assert_eq!(select.fields()[1].length, 20);
        assert!(select.fields()[1].is_nullable());
        assert_eq!(select.index_of("id"), Some(0));
        assert!(bind.is_empty());
    }

    #[test]
    fn test_describe_truncated_then_exact() {
        // First reply: select block of 3, cut off while describing field 2
        let mut reply = vec![sql_info::SELECT];
        clumplet_int(&mut reply, sql_info::DESCRIBE_VARS, 3);
        describe_field(&mut reply, 1, sql_type::LONG, 4, "A");
        clumplet_int(&mut reply, sql_info::SQLDA_SEQ, 2);
        reply.push(info::TRUNCATED);

        let mut state = DescribeState::new();
        let outcome = describe(&reply, &DESCRIBE_ITEMS, &mut state, Charset::Utf8).unwrap();
        let items = match outcome {
            DescribeOutcome::Truncated { items } => items,
            other => panic!("expected truncation, got {:?}", other),
        };

        // select block resumes at 1, unreached bind block at 0
        assert_eq!(&items[0..5], &[sql_info::SQLDA_START, 2, 1, 0, sql_info::SELECT]);
        assert_eq!(&items[15..20], &[sql_info::SQLDA_START, 2, 0, 0, sql_info::BIND]);
        assert_eq!(items.len(), DESCRIBE_ITEMS.len() + 8);

        // Second reply repeats from field 2 and completes
        let mut reply = vec![sql_info::SELECT];
        clumplet_int(&mut reply, sql_info::DESCRIBE_VARS, 3);
        describe_field(&mut reply, 2, sql_type::SHORT, 2, "B");
        describe_field(&mut reply, 3, sql_type::DOUBLE, 8, "C");
        reply.push(sql_info::BIND);
        clumplet_int(&mut reply, sql_info::DESCRIBE_VARS, 1);
        describe_field(&mut reply, 1, sql_type::LONG + 1, 4, "");
        reply.push(info::END);

        let outcome = describe(&reply, &items, &mut state, Charset::Utf8).unwrap();
        assert_eq!(outcome, DescribeOutcome::Complete);
        let (select, bind) = state.into_descriptors();
        let names: Vec<_> = select.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(select.actual_count(), 3);
        assert_eq!(bind.count(), 1);
    }

    #[test]
    fn test_finished_block_resumes_past_count() {
        let mut state = DescribeState::new();
        state.blocks[0] = Some(Descriptor::new(300));
        let items = describe_exact_items(&DESCRIBE_ITEMS, &state, 1, 4);
        assert_eq!(&items[0..4], &[sql_info::SQLDA_START, 2, 44, 1]);
        assert_eq!(&items[15..19], &[sql_info::SQLDA_START, 2, 4, 0]);
    }

    #[test]
    fn test_unknown_item_is_sqlda_error() {
        let mut state = DescribeState::new();
        let err = describe(&[99], &DESCRIBE_ITEMS, &mut state, Charset::Utf8).unwrap_err();
        assert_eq!(err.error_code(), Some(isc::DSQL_SQLDA_ERR));
    }

    #[test]
    fn test_sequence_out_of_range() {
        let mut reply = vec![sql_info::SELECT];
        clumplet_int(&mut reply, sql_info::DESCRIBE_VARS, 1);
        clumplet_int(&mut reply, sql_info::SQLDA_SEQ, 5);
        clumplet_int(&mut reply, sql_info::TYPE, sql_type::LONG);
        let mut state = DescribeState::new();
        let err = describe(&reply, &DESCRIBE_ITEMS, &mut state, Charset::Utf8).unwrap_err();
        assert_eq!(err.error_code(), Some(isc::DSQL_SQLDA_ERR));
    }
}
