//! Conversions between Rust values and Firebird storage formats

mod date;
mod decimal;

pub use date::{
    decode_date, decode_time, decode_timestamp, encode_date, encode_time, encode_timestamp,
    TICKS_PER_SECOND,
};
pub use decimal::{decode_decimal, encode_decimal, narrow_i16, narrow_i32};
