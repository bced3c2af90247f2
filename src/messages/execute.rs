//! Execute message for running a prepared statement
//!
//! Parameters travel as one message: the BLR describing the message layout
//! followed by the encoded values. Stored procedures use `op_execute2`,
//! which additionally names the layout of the singleton output row.

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::op;
use crate::error::Result;

/// Execute request (`op_execute` / `op_execute2`)
#[derive(Debug)]
pub struct ExecuteMessage {
    stmt_handle: i32,
    tx_handle: i32,
    /// Input BLR and encoded parameter message, if there are parameters
    input: Option<(Bytes, Bytes)>,
    /// Output BLR for `op_execute2`
    output_blr: Option<Bytes>,
}

impl ExecuteMessage {
    /// Create an execute request without parameters
    pub fn new(stmt_handle: i32, tx_handle: i32) -> Self {
        Self {
            stmt_handle,
            tx_handle,
            input: None,
            output_blr: None,
        }
    }

    /// Attach the parameter layout and the encoded parameter values
    pub fn with_parameters(mut self, blr: Bytes, message: Bytes) -> Self {
        self.input = Some((blr, message));
        self
    }

    /// Request a singleton output row with the given layout
    pub fn with_output(mut self, blr: Bytes) -> Self {
        self.output_blr = Some(blr);
        self
    }

    /// Operation code this request uses
    pub fn operation(&self) -> i32 {
        if self.output_blr.is_some() {
            op::EXECUTE2
        } else {
            op::EXECUTE
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::new();
        buf.write_i32(self.operation())?;
        buf.write_i32(self.stmt_handle)?;
        buf.write_i32(self.tx_handle)?;

        match &self.input {
            Some((blr, message)) => {
                buf.write_buffer(blr)?;
                buf.write_i32(0)?; // message number
                buf.write_i32(1)?; // message count
                buf.write_bytes(message)?;
            }
            None => {
                buf.write_buffer(&[])?;
                buf.write_i32(0)?;
                buf.write_i32(0)?;
            }
        }

        if let Some(blr) = &self.output_blr {
            buf.write_buffer(blr)?;
            buf.write_i32(0)?; // output message number
        }

        Ok(buf.freeze())
    }
}
