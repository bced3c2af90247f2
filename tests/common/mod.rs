//! Scripted in-process server for driver tests
//!
//! Replies are encoded up front with the crate's own buffers and written to
//! one end of a `tokio::io::duplex` pipe; the driver attaches to the other
//! end with `Database::connect_stream`. Requests are drained and recorded.
//! Once the script runs out the server shuts its write side, so an
//! unexpected extra request fails with `ConnectionClosed` instead of hanging.

#![allow(dead_code)]

use firebird_rs::buffer::WriteBuffer;
use firebird_rs::constants::{info, isc_arg, op, protocol, sql_info, sql_type};
use firebird_rs::{Config, Database};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

/// Attachment handle the scripted server hands out
pub const DB_HANDLE: i32 = 1;

/// Builder for the server side of a conversation
#[derive(Default)]
pub struct Script {
    buf: WriteBuffer,
}

impl Script {
    /// A script starting with a successful connect and attach
    pub fn attached() -> Self {
        let mut script = Script::default();
        script
            .accept(protocol::PROTOCOL_VERSION12)
            .ok(DB_HANDLE)
            .ok_data(&[info::END]);
        script
    }

    fn int(&mut self, value: i32) -> &mut Self {
        self.buf.write_i32(value).unwrap();
        self
    }

    /// `op_accept` choosing `version`
    pub fn accept(&mut self, version: i32) -> &mut Self {
        self.int(op::ACCEPT)
            .int(version)
            .int(protocol::ARCH_GENERIC)
            .int(protocol::PTYPE_LAZY_SEND)
    }

    /// Full `op_response`
    pub fn response(
        &mut self,
        handle: i32,
        blob_id: i64,
        data: &[u8],
        status: &[i32],
    ) -> &mut Self {
        self.int(op::RESPONSE).int(handle);
        self.buf.write_i64(blob_id).unwrap();
        self.buf.write_buffer(data).unwrap();
        for word in status {
            self.int(*word);
        }
        self.int(isc_arg::END)
    }

    /// Successful `op_response` carrying only a handle
    pub fn ok(&mut self, handle: i32) -> &mut Self {
        self.response(handle, 0, &[], &[])
    }

    /// Successful `op_response` carrying an info or segment payload
    pub fn ok_data(&mut self, data: &[u8]) -> &mut Self {
        self.response(0, 0, data, &[])
    }

    /// Successful `op_response` carrying a blob or array id
    pub fn ok_blob(&mut self, handle: i32, blob_id: i64) -> &mut Self {
        self.response(handle, blob_id, &[], &[])
    }

    /// Failed `op_response` with one ISC code
    pub fn error(&mut self, code: i32) -> &mut Self {
        self.response(0, 0, &[], &[isc_arg::GDS, code])
    }

    /// Successful `op_response` carrying a warning
    pub fn warning(&mut self, handle: i32, code: i32) -> &mut Self {
        self.response(handle, 0, &[], &[isc_arg::WARNING, code])
    }

    /// Keep-alive the driver must skip
    pub fn dummy(&mut self) -> &mut Self {
        self.int(op::DUMMY)
    }

    /// Allocate and prepare replies for a statement
    pub fn prepared(
        &mut self,
        stmt_handle: i32,
        statement_type: i32,
        columns: &[Column],
        params: &[Column],
    ) -> &mut Self {
        self.ok(stmt_handle)
            .ok_data(&describe_reply(columns, params))
            .ok_data(&statement_type_reply(statement_type))
    }

    /// One `op_fetch_response` row header
    pub fn row_header(&mut self) -> &mut Self {
        self.int(op::FETCH_RESPONSE).int(0).int(1)
    }

    /// A row of INTEGER and VARCHAR cells; `None` is NULL
    pub fn row(&mut self, cells: &[Cell]) -> &mut Self {
        self.row_header();
        self.cells(cells)
    }

    /// Column values with their null indicators
    pub fn cells(&mut self, cells: &[Cell]) -> &mut Self {
        for cell in cells {
            match cell {
                Cell::Int(v) => self.int(*v).int(0),
                Cell::Text(s) => {
                    self.buf.write_buffer(s.as_bytes()).unwrap();
                    self.int(0)
                }
                Cell::NullInt => self.int(0).int(-1),
                Cell::NullText => {
                    self.buf.write_buffer(&[]).unwrap();
                    self.int(-1)
                }
            };
        }
        self
    }

    /// End of one fetch batch, more rows remain
    pub fn batch_end(&mut self) -> &mut Self {
        self.int(op::FETCH_RESPONSE).int(0).int(0)
    }

    /// End of the cursor
    pub fn cursor_end(&mut self) -> &mut Self {
        self.int(op::FETCH_RESPONSE).int(100).int(0)
    }

    /// `op_sql_response` header of a singleton result
    pub fn sql_response(&mut self, count: i32) -> &mut Self {
        self.int(op::SQL_RESPONSE).int(count)
    }

    /// Reply to an `isc_info_sql_records` query
    pub fn records(&mut self, inserted: i32, updated: i32, deleted: i32) -> &mut Self {
        self.ok_data(&records_reply(inserted, updated, deleted))
    }

    /// Raw bytes for replies the helpers don't cover
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.write_bytes(bytes).unwrap();
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.as_slice().to_vec()
    }
}

/// A column or parameter of a described statement
#[derive(Debug, Clone)]
pub struct Column {
    pub sql_type: i32,
    pub length: i32,
    pub scale: i32,
    pub name: &'static str,
}

impl Column {
    /// Nullable INTEGER
    pub fn int(name: &'static str) -> Self {
        Self {
            sql_type: sql_type::LONG + 1,
            length: 4,
            scale: 0,
            name,
        }
    }

    /// Nullable VARCHAR(length)
    pub fn varchar(name: &'static str, length: i32) -> Self {
        Self {
            sql_type: sql_type::VARYING + 1,
            length,
            scale: 0,
            name,
        }
    }
}

/// A cell value in a scripted row
#[derive(Debug, Clone)]
pub enum Cell {
    Int(i32),
    Text(&'static str),
    NullInt,
    NullText,
}

/// Append an integer info clumplet
pub fn clumplet_int(out: &mut Vec<u8>, tag: u8, value: i32) {
    out.push(tag);
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
}

fn clumplet_str(out: &mut Vec<u8>, tag: u8, value: &str) {
    out.push(tag);
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

/// Append a select or bind block declaring `total` fields, describing
/// `columns` from sequence number `first_seq` on
pub fn describe_block(
    out: &mut Vec<u8>,
    tag: u8,
    total: usize,
    first_seq: i32,
    columns: &[Column],
) {
    out.push(tag);
    clumplet_int(out, sql_info::DESCRIBE_VARS, total as i32);
    for (seq, column) in (first_seq..).zip(columns) {
        clumplet_int(out, sql_info::SQLDA_SEQ, seq);
        clumplet_int(out, sql_info::TYPE, column.sql_type);
        clumplet_int(out, sql_info::SUB_TYPE, 0);
        clumplet_int(out, sql_info::LENGTH, column.length);
        clumplet_int(out, sql_info::SCALE, column.scale);
        clumplet_str(out, sql_info::FIELD, column.name);
        clumplet_str(out, sql_info::RELATION, "T");
        clumplet_str(out, sql_info::ALIAS, column.name);
        out.push(sql_info::DESCRIBE_END);
    }
}

/// Describe payload of a prepare reply
pub fn describe_reply(columns: &[Column], params: &[Column]) -> Vec<u8> {
    let mut out = Vec::new();
    describe_block(&mut out, sql_info::SELECT, columns.len(), 1, columns);
    describe_block(&mut out, sql_info::BIND, params.len(), 1, params);
    out.push(info::END);
    out
}

/// Payload of an `isc_info_sql_stmt_type` reply
pub fn statement_type_reply(statement_type: i32) -> Vec<u8> {
    let mut out = Vec::new();
    clumplet_int(&mut out, sql_info::STMT_TYPE, statement_type);
    out.push(info::END);
    out
}

/// Payload of an `isc_info_sql_records` reply
pub fn records_reply(inserted: i32, updated: i32, deleted: i32) -> Vec<u8> {
    let mut body = Vec::new();
    clumplet_int(&mut body, sql_info::REQ_SELECT_COUNT, 0);
    clumplet_int(&mut body, sql_info::REQ_INSERT_COUNT, inserted);
    clumplet_int(&mut body, sql_info::REQ_UPDATE_COUNT, updated);
    clumplet_int(&mut body, sql_info::REQ_DELETE_COUNT, deleted);

    let mut out = vec![sql_info::RECORDS];
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(&body);
    out.push(info::END);
    out
}

/// Server end of a scripted conversation
pub struct MockServer {
    requests: JoinHandle<Vec<u8>>,
}

impl MockServer {
    /// Everything the driver sent, once it has closed its end
    pub async fn requests(self) -> Vec<u8> {
        self.requests.await.unwrap()
    }
}

/// Start a scripted server and attach a database to it
pub async fn connect(script: Script) -> (Database, MockServer) {
    let (db, server) = try_connect(script).await;
    (db.unwrap(), server)
}

/// Like [`connect`], returning the attach result
pub async fn try_connect(script: Script) -> (firebird_rs::Result<Database>, MockServer) {
    let (client, server) = tokio::io::duplex(1 << 20);
    let (mut reader, mut writer) = tokio::io::split(server);

    writer.write_all(&script.into_bytes()).await.unwrap();
    writer.shutdown().await.unwrap();

    let requests = tokio::spawn(async move {
        let _writer = writer;
        let mut received = Vec::new();
        let _ = reader.read_to_end(&mut received).await;
        received
    });

    let config = Config::new("localhost", "test.fdb", "SYSDBA", "masterkey");
    let db = Database::connect_stream(client, config).await;
    (db, MockServer { requests })
}
