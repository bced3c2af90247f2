//! Server responses
//!
//! Each reply the server sends is decoded into one immutable value. The
//! operation code decides which shape follows; the shapes never overlap.

use bytes::Bytes;

use crate::buffer::XdrRead;
use crate::charset::Charset;
use crate::constants::{isc_arg, op};
use crate::error::{Error, IscError, IscStatus, Result};

/// Reply to most requests (`op_response`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericResponse {
    /// Handle of the object created or affected by the request
    pub object_handle: i32,
    /// Blob or array id
    pub blob_id: i64,
    /// Information or segment payload
    pub data: Bytes,
}

/// One step of a fetch (`op_fetch_response`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchResponse {
    /// 0 while rows follow, 100 once the cursor is exhausted
    pub status: i32,
    /// Number of rows following this header (0 or 1)
    pub count: i32,
}

/// Header of a singleton result (`op_sql_response`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlResponse {
    /// Number of rows following this header (0 or 1)
    pub count: i32,
}

/// A decoded server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `op_response`
    Generic(GenericResponse),
    /// `op_fetch_response`
    Fetch(FetchResponse),
    /// `op_sql_response`
    Sql(SqlResponse),
}

impl Response {
    /// Operation code this response was read for
    pub fn operation(&self) -> i32 {
        match self {
            Response::Generic(_) => op::RESPONSE,
            Response::Fetch(_) => op::FETCH_RESPONSE,
            Response::Sql(_) => op::SQL_RESPONSE,
        }
    }
}

/// Read the status vector that terminates an `op_response`
///
/// Tags are scanned until `isc_arg_end`. Zero codes are sentinels and are
/// not recorded, so an all-zero vector decodes to an empty status.
pub async fn read_status_vector<R>(reader: &mut R, charset: Charset) -> Result<IscStatus>
where
    R: XdrRead + ?Sized,
{
    let mut status = IscStatus::default();

    loop {
        let arg = reader.read_int().await?;
        match arg {
            isc_arg::END => break,
            isc_arg::STRING | isc_arg::CSTRING => {
                let text = read_text(reader, charset).await?;
                status.push(IscError::Text(text));
            }
            isc_arg::INTERPRETED => {
                let text = read_text(reader, charset).await?;
                status.push(IscError::Interpreted(text));
            }
            isc_arg::SQL_STATE => {
                let text = read_text(reader, charset).await?;
                status.push(IscError::SqlState(text));
            }
            isc_arg::NUMBER | isc_arg::WIN32 => {
                let number = reader.read_int().await?;
                status.push(IscError::Number(number));
            }
            isc_arg::WARNING => {
                let code = reader.read_int().await?;
                if code != 0 {
                    status.push(IscError::Warning(code));
                }
            }
            _ => {
                let code = reader.read_int().await?;
                if code != 0 {
                    status.push(IscError::Code(code));
                }
            }
        }
    }

    Ok(status)
}

async fn read_text<R>(reader: &mut R, charset: Charset) -> Result<String>
where
    R: XdrRead + ?Sized,
{
    let bytes = reader.read_buffer().await?;
    Ok(charset
        .decode(&bytes)
        .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned()))
}

/// Read the body of a response whose operation code was already consumed
///
/// Returns the response together with its status vector; fetch and SQL
/// responses carry no status vector and report an empty one.
pub async fn read_response_body<R>(
    reader: &mut R,
    operation: i32,
    charset: Charset,
) -> Result<(Response, IscStatus)>
where
    R: XdrRead + ?Sized,
{
    match operation {
        op::RESPONSE => {
            let object_handle = reader.read_int().await?;
            let blob_id = reader.read_long().await?;
            let data = reader.read_buffer().await?;
            let status = read_status_vector(reader, charset).await?;
            Ok((
                Response::Generic(GenericResponse {
                    object_handle,
                    blob_id,
                    data,
                }),
                status,
            ))
        }
        op::FETCH_RESPONSE => {
            let status = reader.read_int().await?;
            let count = reader.read_int().await?;
            Ok((
                Response::Fetch(FetchResponse { status, count }),
                IscStatus::default(),
            ))
        }
        op::SQL_RESPONSE => {
            let count = reader.read_int().await?;
            Ok((Response::Sql(SqlResponse { count }), IscStatus::default()))
        }
        other => Err(Error::UnexpectedOperation {
            expected: op::RESPONSE,
            actual: other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ReadBuffer, WriteBuffer};
    use crate::constants::isc;

    fn vector(words: &[i32]) -> ReadBuffer {
        let mut buf = WriteBuffer::new();
        for w in words {
            buf.write_i32(*w).unwrap();
        }
        ReadBuffer::new(buf.freeze())
    }

    #[tokio::test]
    async fn test_single_gds_code() {
        let mut r = vector(&[isc_arg::GDS, isc::ARITH_EXCEPT, isc_arg::END]);
        let status = read_status_vector(&mut r, Charset::Utf8).await.unwrap();
        assert_eq!(status.errors(), &[IscError::Code(isc::ARITH_EXCEPT)]);
        assert!(!status.is_warning());
    }

    #[tokio::test]
    async fn test_zero_vector_is_empty() {
        let mut r = vector(&[isc_arg::GDS, 0, isc_arg::END]);
        let status = read_status_vector(&mut r, Charset::Utf8).await.unwrap();
        assert!(status.is_empty());

        let mut r = vector(&[isc_arg::END]);
        assert!(read_status_vector(&mut r, Charset::Utf8)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_string_and_number_args() {
        let mut buf = WriteBuffer::new();
        buf.write_i32(isc_arg::GDS).unwrap();
        buf.write_i32(isc::TRA_STATE).unwrap();
        buf.write_i32(isc_arg::NUMBER).unwrap();
        buf.write_i32(17).unwrap();
        buf.write_i32(isc_arg::CSTRING).unwrap();
        buf.write_str("extra").unwrap();
        buf.write_i32(isc_arg::SQL_STATE).unwrap();
        buf.write_str("25000").unwrap();
        buf.write_i32(isc_arg::END).unwrap();

        let mut r = ReadBuffer::new(buf.freeze());
        let status = read_status_vector(&mut r, Charset::Utf8).await.unwrap();
        assert_eq!(
            status.errors(),
            &[
                IscError::Code(isc::TRA_STATE),
                IscError::Number(17),
                IscError::Text("extra".to_string()),
                IscError::SqlState("25000".to_string()),
            ]
        );
        assert_eq!(status.sql_state(), Some("25000"));
        assert!(status.message().starts_with("transaction 17 is in an illegal state"));
    }

    #[tokio::test]
    async fn test_leading_warning() {
        let mut r = vector(&[isc_arg::WARNING, 335544807, isc_arg::END]);
        let status = read_status_vector(&mut r, Charset::Utf8).await.unwrap();
        assert!(status.is_warning());
    }

    #[tokio::test]
    async fn test_fetch_response_body() {
        let mut r = vector(&[100, 0]);
        let (response, status) = read_response_body(&mut r, op::FETCH_RESPONSE, Charset::Utf8)
            .await
            .unwrap();
        assert_eq!(
            response,
            Response::Fetch(FetchResponse {
                status: 100,
                count: 0
            })
        );
        assert!(status.is_empty());
    }

    #[tokio::test]
    async fn test_generic_response_body() {
        let mut buf = WriteBuffer::new();
        buf.write_i32(7).unwrap();
        buf.write_i64(0x0102).unwrap();
        buf.write_buffer(&[1, 2, 3]).unwrap();
        buf.write_i32(isc_arg::END).unwrap();

        let mut r = ReadBuffer::new(buf.freeze());
        let (response, status) = read_response_body(&mut r, op::RESPONSE, Charset::Utf8)
            .await
            .unwrap();
        let Response::Generic(generic) = response else {
            panic!("expected generic response");
        };
        assert_eq!(generic.object_handle, 7);
        assert_eq!(generic.blob_id, 0x0102);
        assert_eq!(&generic.data[..], &[1, 2, 3]);
        assert!(status.is_empty());
        assert_eq!(r.remaining(), 0);
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let mut r = vector(&[]);
        let result = read_response_body(&mut r, 999, Charset::Utf8).await;
        assert!(matches!(
            result,
            Err(Error::UnexpectedOperation { actual: 999, .. })
        ));
    }
}
