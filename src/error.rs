//! Error types for the Firebird driver
//!
//! This module defines all error types that can occur during Firebird database
//! operations, from low-level framing errors up to the status vectors the
//! server reports for failed requests.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::constants::isc;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Firebird driver
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Unexpected operation code received
    #[error("unexpected operation: expected {expected}, got {actual}")]
    UnexpectedOperation { expected: i32, actual: i32 },

    /// Server did not accept any offered protocol version
    #[error("server protocol version {0} not supported")]
    ProtocolVersionNotSupported(i32),

    /// General protocol error
    #[error("protocol error: {0}")]
    Protocol(String),

    // =========================================================================
    // Buffer Errors
    // =========================================================================
    /// Buffer underflow - not enough data to read
    #[error("buffer underflow: need {needed} bytes but only {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    /// Buffer overflow - not enough space to write
    #[error("buffer overflow: need {needed} bytes but only {available} available")]
    BufferOverflow { needed: usize, available: usize },

    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// Connection closed unexpectedly
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    ConnectionTimeout(std::time::Duration),

    /// Invalid connection string
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Error reported through a status vector
    #[error("{0}")]
    Isc(IscStatus),

    // =========================================================================
    // State Errors
    // =========================================================================
    /// Operation attempted in the wrong lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    // =========================================================================
    // Data Type Errors
    // =========================================================================
    /// Invalid or unsupported SQL type code
    #[error("invalid data type: {0}")]
    InvalidDataType(i32),

    /// Data conversion error
    #[error("data conversion error: {0}")]
    DataConversion(String),

    /// NULL value encountered where not expected
    #[error("unexpected NULL value")]
    UnexpectedNull,

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // =========================================================================
    // Feature Errors
    // =========================================================================
    /// Feature not supported
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an error carrying a single ISC code
    pub fn isc(code: i32) -> Self {
        Error::Isc(IscStatus::from_code(code))
    }

    /// Create an error carrying a chain of ISC codes
    pub fn isc_codes(codes: &[i32]) -> Self {
        Error::Isc(IscStatus::new(
            codes.iter().map(|&c| IscError::Code(c)).collect(),
        ))
    }

    /// Create an error carrying an ISC code and one numeric parameter
    pub fn isc_with_number(code: i32, number: i32) -> Self {
        Error::Isc(IscStatus::new(vec![
            IscError::Code(code),
            IscError::Number(number),
        ]))
    }

    /// The leading ISC code, if this error came from a status vector
    pub fn error_code(&self) -> Option<i32> {
        match self {
            Error::Isc(status) => status.error_code(),
            _ => None,
        }
    }

    /// Check if this is a connection-related error
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::ConnectionClosed | Error::ConnectionTimeout(_) | Error::Io(_) => true,
            Error::Isc(status) => status.error_codes().any(|c| {
                matches!(
                    c,
                    isc::NETWORK_ERROR | isc::NET_READ_ERR | isc::NET_WRITE_ERR
                )
            }),
            _ => false,
        }
    }

    /// Check if this error only carries warnings
    pub fn is_warning(&self) -> bool {
        matches!(self, Error::Isc(status) if status.is_warning())
    }
}

// =============================================================================
// Status Vectors
// =============================================================================

/// One entry of a status vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IscError {
    /// Primary error code (`isc_arg_gds`)
    Code(i32),
    /// Warning code (`isc_arg_warning`)
    Warning(i32),
    /// String parameter (`isc_arg_string` / `isc_arg_cstring`)
    Text(String),
    /// Numeric parameter (`isc_arg_number` / `isc_arg_win32`)
    Number(i32),
    /// Already formatted message (`isc_arg_interpreted`)
    Interpreted(String),
    /// SQLSTATE (`isc_arg_sql_state`)
    SqlState(String),
}

impl IscError {
    fn code(&self) -> Option<i32> {
        match self {
            IscError::Code(c) | IscError::Warning(c) => Some(*c),
            _ => None,
        }
    }
}

/// A decoded status vector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IscStatus {
    errors: Vec<IscError>,
}

impl IscStatus {
    /// Create a status from its entries
    pub fn new(errors: Vec<IscError>) -> Self {
        Self { errors }
    }

    /// Create a status carrying a single error code
    pub fn from_code(code: i32) -> Self {
        Self::new(vec![IscError::Code(code)])
    }

    pub(crate) fn push(&mut self, error: IscError) {
        self.errors.push(error);
    }

    /// All entries in the order they were received
    pub fn errors(&self) -> &[IscError] {
        &self.errors
    }

    /// Whether no entries were decoded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// A status is a warning when its first entry is a warning code
    pub fn is_warning(&self) -> bool {
        matches!(self.errors.first(), Some(IscError::Warning(_)))
    }

    /// The first error or warning code
    pub fn error_code(&self) -> Option<i32> {
        self.errors.iter().find_map(IscError::code)
    }

    /// Every error and warning code in order
    pub fn error_codes(&self) -> impl Iterator<Item = i32> + '_ {
        self.errors.iter().filter_map(IscError::code)
    }

    /// Whether the given code appears anywhere in the chain
    pub fn contains(&self, code: i32) -> bool {
        self.error_codes().any(|c| c == code)
    }

    /// The SQLSTATE reported by the server, if any
    pub fn sql_state(&self) -> Option<&str> {
        self.errors.iter().find_map(|e| match e {
            IscError::SqlState(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Build the human readable message
    ///
    /// Each code is rendered through the built-in message table, with the
    /// string and number parameters that follow it substituted for `{0}`,
    /// `{1}`, ... placeholders. Codes without a known message fall back to
    /// their numeric value.
    pub fn message(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut i = 0;
        while i < self.errors.len() {
            match &self.errors[i] {
                IscError::Code(code) | IscError::Warning(code) => {
                    let mut args = Vec::new();
                    let mut j = i + 1;
                    while let Some(arg) = self.errors.get(j) {
                        match arg {
                            IscError::Text(s) => args.push(s.clone()),
                            IscError::Number(n) => args.push(n.to_string()),
                            _ => break,
                        }
                        j += 1;
                    }
                    parts.push(format_message(*code, &args));
                    i = j;
                }
                IscError::Interpreted(s) => {
                    parts.push(s.clone());
                    i += 1;
                }
                _ => i += 1,
            }
        }
        parts.join("\n")
    }
}

impl fmt::Display for IscStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_code() {
            Some(code) => write!(f, "ISC error {}: {}", code, self.message()),
            None => write!(f, "{}", self.message()),
        }
    }
}

fn format_message(code: i32, args: &[String]) -> String {
    let Some(template) = message_template(code) else {
        return if args.is_empty() {
            format!("error code {}", code)
        } else {
            format!("error code {} ({})", code, args.join(", "))
        };
    };

    let mut text = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        text = text.replace(&format!("{{{}}}", i), arg);
    }
    text
}

fn message_template(code: i32) -> Option<&'static str> {
    Some(match code {
        isc::ARITH_EXCEPT => "arithmetic exception, numeric overflow, or string truncation",
        isc::BAD_DB_HANDLE => "invalid database handle (no active connection)",
        isc::BAD_REQ_HANDLE => "invalid request handle",
        isc::BAD_TRANS_HANDLE => "invalid transaction handle (expecting explicit transaction start)",
        isc::BAD_STMT_HANDLE => "invalid statement handle",
        isc::OPEN_TRANS => "cannot disconnect database with open transactions ({0} active)",
        isc::SEGMENT => "segment buffer length shorter than expected",
        isc::SEGSTR_EOF => "attempted retrieval of more segments than exist",
        isc::CONNECT_REJECT => "connection rejected by remote interface",
        isc::INVALID_DIMENSION => "column not array or invalid dimensions (expected {0}, encountered {1})",
        isc::TRA_STATE => "transaction {0} is in an illegal state",
        isc::DSQL_SQLDA_ERR => "SQLDA error",
        isc::NETWORK_ERROR => "Unable to complete network request to host \"{0}\".",
        isc::NET_READ_ERR => "Error reading data from the connection.",
        isc::NET_WRITE_ERR => "Error writing data to the connection.",
        isc::STRING_TRUNCATION => "string right truncation",
        isc::NOTHING_TO_CANCEL => "nothing to cancel",
        isc::CANCELLED => "operation was cancelled",
        isc::LOGIN => "Your user name and password are not defined. Ask your database administrator to set up a Firebird login.",
        isc::UNAVAILABLE => "unavailable database",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isc_error_display() {
        let err = Error::isc(isc::ARITH_EXCEPT);
        assert_eq!(
            err.to_string(),
            "ISC error 335544321: arithmetic exception, numeric overflow, or string truncation"
        );
    }

    #[test]
    fn test_open_transactions_message() {
        let err = Error::isc_with_number(isc::OPEN_TRANS, 2);
        assert_eq!(err.error_code(), Some(isc::OPEN_TRANS));
        assert!(err
            .to_string()
            .contains("cannot disconnect database with open transactions (2 active)"));
    }

    #[test]
    fn test_unknown_code_message() {
        let status = IscStatus::new(vec![
            IscError::Code(335544999),
            IscError::Text("T1".to_string()),
        ]);
        assert_eq!(status.message(), "error code 335544999 (T1)");
    }

    #[test]
    fn test_warning_classification() {
        let status = IscStatus::new(vec![IscError::Warning(335544807)]);
        assert!(status.is_warning());
        assert!(Error::Isc(status).is_warning());

        let status = IscStatus::new(vec![IscError::Code(335544321), IscError::Warning(1)]);
        assert!(!status.is_warning());
    }

    #[test]
    fn test_code_chain() {
        let err = Error::isc_codes(&[isc::ARITH_EXCEPT, isc::STRING_TRUNCATION]);
        let Error::Isc(status) = &err else {
            panic!("expected status error");
        };
        assert_eq!(
            status.error_codes().collect::<Vec<_>>(),
            vec![isc::ARITH_EXCEPT, isc::STRING_TRUNCATION]
        );
        assert!(status.contains(isc::STRING_TRUNCATION));
        assert!(status.message().contains("string right truncation"));
    }

    #[test]
    fn test_sql_state() {
        let status = IscStatus::new(vec![
            IscError::Code(335544665),
            IscError::SqlState("23000".to_string()),
        ]);
        assert_eq!(status.sql_state(), Some("23000"));
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::isc(isc::NET_READ_ERR).is_connection_error());
        assert!(!Error::isc(isc::ARITH_EXCEPT).is_connection_error());
        assert!(!Error::InvalidState("x".to_string()).is_connection_error());
    }
}
