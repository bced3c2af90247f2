//! Event notification and cancellation requests

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::{op, protocol};
use crate::error::Result;

/// Ask the server for an auxiliary event connection (`op_connect_request`)
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequestMessage {
    db_handle: i32,
}

impl ConnectRequestMessage {
    /// Create the request for the attachment `db_handle`
    pub fn new(db_handle: i32) -> Self {
        Self { db_handle }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(16);
        buf.write_i32(op::CONNECT_REQUEST)?;
        buf.write_i32(protocol::P_REQ_ASYNC)?;
        buf.write_i32(self.db_handle)?;
        buf.write_i32(0)?; // partner
        Ok(buf.freeze())
    }
}

/// Register interest in a set of events (`op_que_events`)
#[derive(Debug)]
pub struct QueueEventsMessage {
    db_handle: i32,
    epb: Bytes,
    local_id: i32,
}

impl QueueEventsMessage {
    /// Queue the events described by `epb` under the client id `local_id`
    pub fn new(db_handle: i32, epb: Bytes, local_id: i32) -> Self {
        Self {
            db_handle,
            epb,
            local_id,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(28 + self.epb.len());
        buf.write_i32(op::QUE_EVENTS)?;
        buf.write_i32(self.db_handle)?;
        buf.write_buffer(&self.epb)?;
        buf.write_i32(0)?; // ast routine
        buf.write_i32(0)?; // ast argument
        buf.write_i32(self.local_id)?;
        Ok(buf.freeze())
    }
}

/// Cancel a queued event set (`op_cancel_events`)
#[derive(Debug, Clone, Copy)]
pub struct CancelEventsMessage {
    db_handle: i32,
    local_id: i32,
}

impl CancelEventsMessage {
    /// Cancel the event set registered as `local_id`
    pub fn new(db_handle: i32, local_id: i32) -> Self {
        Self {
            db_handle,
            local_id,
        }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(12);
        buf.write_i32(op::CANCEL_EVENTS)?;
        buf.write_i32(self.db_handle)?;
        buf.write_i32(self.local_id)?;
        Ok(buf.freeze())
    }
}

/// Cancel the operation running on the attachment (`op_cancel`)
#[derive(Debug, Clone, Copy)]
pub struct CancelMessage {
    kind: i32,
}

impl CancelMessage {
    /// Create a cancel request of the given `cancel::*` kind
    pub fn new(kind: i32) -> Self {
        Self { kind }
    }

    /// Build the request
    pub fn build_request(&self) -> Result<Bytes> {
        let mut buf = WriteBuffer::with_capacity(8);
        buf.write_i32(op::CANCEL)?;
        buf.write_i32(self.kind)?;
        Ok(buf.freeze())
    }
}
