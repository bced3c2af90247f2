//! Scaled NUMERIC/DECIMAL values
//!
//! Exact numerics travel as an integer mantissa of the column's storage
//! width. The column scale (zero or negative) says how many digits of the
//! mantissa are fractional.

use rust_decimal::Decimal;

use crate::constants::isc;
use crate::error::{Error, Result};

/// Build a decimal from a wire mantissa and a column scale
pub fn decode_decimal(mantissa: i64, scale: i32) -> Result<Decimal> {
    if scale <= 0 {
        Decimal::try_from_i128_with_scale(mantissa as i128, scale.unsigned_abs())
            .map_err(|e| Error::DataConversion(e.to_string()))
    } else {
        let factor = pow10(scale.unsigned_abs())?;
        let value = (mantissa as i128)
            .checked_mul(factor)
            .ok_or_else(|| Error::isc(isc::ARITH_EXCEPT))?;
        Decimal::try_from_i128_with_scale(value, 0)
            .map_err(|e| Error::DataConversion(e.to_string()))
    }
}

/// Scale a decimal to the mantissa stored for a column of the given scale
///
/// Digits beyond the column scale are truncated toward zero.
pub fn encode_decimal(value: &Decimal, scale: i32) -> Result<i64> {
    let target = -(scale as i64);
    let current = value.scale() as i64;
    let mantissa = value.mantissa();

    let scaled = if current > target {
        mantissa / pow10((current - target) as u32)?
    } else {
        mantissa
            .checked_mul(pow10((target - current) as u32)?)
            .ok_or_else(|| Error::isc(isc::ARITH_EXCEPT))?
    };

    i64::try_from(scaled).map_err(|_| Error::isc(isc::ARITH_EXCEPT))
}

/// Narrow a scaled mantissa to a 32-bit column
pub fn narrow_i32(value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::isc(isc::ARITH_EXCEPT))
}

/// Narrow a scaled mantissa to a 16-bit column
pub fn narrow_i16(value: i64) -> Result<i16> {
    i16::try_from(value).map_err(|_| Error::isc(isc::ARITH_EXCEPT))
}

fn pow10(exp: u32) -> Result<i128> {
    10_i128
        .checked_pow(exp)
        .ok_or_else(|| Error::isc(isc::ARITH_EXCEPT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_decode_scaled() {
        assert_eq!(decode_decimal(12345, -2).unwrap(), Decimal::from_str("123.45").unwrap());
        assert_eq!(decode_decimal(-5, -3).unwrap(), Decimal::from_str("-0.005").unwrap());
        assert_eq!(decode_decimal(7, 0).unwrap(), Decimal::from(7));
        assert_eq!(decode_decimal(7, 2).unwrap(), Decimal::from(700));
    }

    #[test]
    fn test_encode_rescales() {
        let d = Decimal::from_str("123.45").unwrap();
        assert_eq!(encode_decimal(&d, -2).unwrap(), 12345);
        assert_eq!(encode_decimal(&d, -4).unwrap(), 1234500);
        let whole = Decimal::from(42);
        assert_eq!(encode_decimal(&whole, -2).unwrap(), 4200);
    }

    #[test]
    fn test_encode_truncates() {
        let d = Decimal::from_str("1.239").unwrap();
        assert_eq!(encode_decimal(&d, -2).unwrap(), 123);
        let d = Decimal::from_str("-1.239").unwrap();
        assert_eq!(encode_decimal(&d, -2).unwrap(), -123);
    }

    #[test]
    fn test_scale_boundaries() {
        let max = Decimal::from_str("327.67").unwrap();
        let m = encode_decimal(&max, -2).unwrap();
        assert_eq!(narrow_i16(m).unwrap(), i16::MAX);

        let over = Decimal::from_str("327.68").unwrap();
        let m = encode_decimal(&over, -2).unwrap();
        let err = narrow_i16(m).unwrap_err();
        assert_eq!(err.error_code(), Some(isc::ARITH_EXCEPT));

        let m = encode_decimal(&Decimal::from(i32::MAX), 0).unwrap();
        assert!(narrow_i32(m).is_ok());
        assert!(narrow_i32(m + 1).is_err());
    }

    #[test]
    fn test_encode_overflow() {
        let big = Decimal::from_str("99999999999999999999").unwrap();
        assert!(encode_decimal(&big, 0).is_err());
    }
}
