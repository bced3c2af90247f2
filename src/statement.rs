//! SQL statement handling
//!
//! A [`Statement`] walks the server-side statement lifecycle:
//!
//! ```text
//! Deallocated --allocate--> Allocated --prepare--> Prepared --execute--> Executed
//! Executed --fetch*--> Executed
//! Prepared/Executed --free(Close)--> Allocated
//! any --free(Drop)--> Deallocated
//! bound transaction committed or rolled back --> Closed
//! ```
//!
//! Rows are fetched in batches of [`fetch_size`](Statement::set_fetch_size)
//! and handed out one at a time. Stored procedures return their singleton
//! output row with the execute reply instead of through a cursor.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;

use crate::buffer::ReadBuffer;
use crate::charset::Charset;
use crate::config::Config;
use crate::constants::{
    dsql, info, op, sql_info, stmt_type, DEFAULT_MAX_BUFFER_SIZE, FETCH_NO_MORE_ROWS,
    PREPARE_INFO_BUFFER_SIZE, ROWS_AFFECTED_BUFFER_SIZE, STATEMENT_TYPE_BUFFER_SIZE,
};
use crate::database::{Session, SharedSession};
use crate::descriptor::{describe, DescribeOutcome, DescribeState, Descriptor, DESCRIBE_ITEMS};
use crate::error::{Error, Result};
use crate::messages::{
    ExecuteMessage, FetchMessage, FetchResponse, FreeMessage, InfoMessage, ObjectMessage,
    PrepareMessage, Response, SqlResponse,
};
use crate::row::{encode_parameters, read_row_values, Row, Value};
use crate::transaction::{Transaction, TransactionSignal};

/// Attempts made by [`Statement::plan`] before giving up on a truncated plan
const PLAN_ATTEMPTS: usize = 4;

/// Statement type reported by the server after prepare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementType {
    /// Not prepared yet
    #[default]
    Unknown,
    /// SELECT
    Select,
    /// INSERT
    Insert,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
    /// DDL
    Ddl,
    /// Blob segment read
    GetSegment,
    /// Blob segment write
    PutSegment,
    /// EXECUTE PROCEDURE
    StoredProcedure,
    /// SET TRANSACTION
    StartTrans,
    /// COMMIT
    Commit,
    /// ROLLBACK
    Rollback,
    /// SELECT ... FOR UPDATE
    SelectForUpdate,
    /// SET GENERATOR
    SetGenerator,
    /// SAVEPOINT
    SavePoint,
}

impl StatementType {
    /// Map a server statement type code
    pub fn from_code(code: i32) -> Self {
        match code {
            stmt_type::SELECT => StatementType::Select,
            stmt_type::INSERT => StatementType::Insert,
            stmt_type::UPDATE => StatementType::Update,
            stmt_type::DELETE => StatementType::Delete,
            stmt_type::DDL => StatementType::Ddl,
            stmt_type::GET_SEGMENT => StatementType::GetSegment,
            stmt_type::PUT_SEGMENT => StatementType::PutSegment,
            stmt_type::EXEC_PROCEDURE => StatementType::StoredProcedure,
            stmt_type::START_TRANS => StatementType::StartTrans,
            stmt_type::COMMIT => StatementType::Commit,
            stmt_type::ROLLBACK => StatementType::Rollback,
            stmt_type::SELECT_FOR_UPDATE => StatementType::SelectForUpdate,
            stmt_type::SET_GENERATOR => StatementType::SetGenerator,
            stmt_type::SAVEPOINT => StatementType::SavePoint,
            _ => StatementType::Unknown,
        }
    }

    /// Whether executing opens a cursor
    pub fn is_cursor(self) -> bool {
        matches!(self, StatementType::Select | StatementType::SelectForUpdate)
    }

    /// Whether the server counts affected records for this type
    fn counts_records(self) -> bool {
        matches!(
            self,
            StatementType::Insert
                | StatementType::Update
                | StatementType::Delete
                | StatementType::StoredProcedure
        )
    }
}

/// Lifecycle state of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// No server handle
    Deallocated,
    /// Handle allocated, nothing prepared
    Allocated,
    /// Prepared and described
    Prepared,
    /// Executed; a cursor may be open
    Executed,
    /// The bound transaction ended; prepare again to reuse
    Closed,
    /// The last request failed on the server
    Error,
}

/// How [`Statement::free`] releases server resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeOption {
    /// Close the open cursor and keep the prepared statement
    Close,
    /// Release the statement handle
    Drop,
    /// Forget the prepared statement and keep the handle
    Unprepare,
}

impl FreeOption {
    fn code(self) -> i32 {
        match self {
            FreeOption::Close => dsql::CLOSE,
            FreeOption::Drop => dsql::DROP,
            FreeOption::Unprepare => dsql::UNPREPARE,
        }
    }
}

/// A statement bound to a transaction
///
/// Created by [`Database::create_statement`](crate::Database::create_statement).
/// The statement may be prepared and executed many times; committing or
/// rolling back its transaction closes it until it is prepared again.
pub struct Statement {
    session: SharedSession,
    transaction: watch::Receiver<TransactionSignal>,
    generation: u64,
    handle: Option<i32>,
    state: StatementState,
    statement_type: StatementType,
    fields: Descriptor,
    parameters: Descriptor,
    column_names: Arc<Vec<String>>,
    rows: VecDeque<Row>,
    output_rows: VecDeque<Row>,
    all_rows_fetched: bool,
    records_affected: i64,
    fetch_size: usize,
    dialect: i16,
    charset: Charset,
}

impl Statement {
    pub(crate) fn new(session: SharedSession, transaction: &Transaction, config: &Config) -> Self {
        let receiver = transaction.subscribe();
        let generation = receiver.borrow().generation;
        Self {
            session,
            transaction: receiver,
            generation,
            handle: None,
            state: StatementState::Deallocated,
            statement_type: StatementType::Unknown,
            fields: Descriptor::default(),
            parameters: Descriptor::default(),
            column_names: Arc::new(Vec::new()),
            rows: VecDeque::new(),
            output_rows: VecDeque::new(),
            all_rows_fetched: false,
            records_affected: -1,
            fetch_size: config.fetch_size.max(1),
            dialect: config.dialect,
            charset: config.charset,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Server handle, once allocated
    pub fn handle(&self) -> Option<i32> {
        self.handle
    }

    /// Current state
    ///
    /// Reports [`StatementState::Closed`] as soon as the bound transaction
    /// has ended, even before the next operation on this statement.
    pub fn state(&self) -> StatementState {
        if self.transaction_ended() && self.is_live() {
            StatementState::Closed
        } else {
            self.state
        }
    }

    /// Statement type, once prepared
    pub fn statement_type(&self) -> StatementType {
        self.statement_type
    }

    /// Output columns
    pub fn fields(&self) -> &Descriptor {
        &self.fields
    }

    /// Input parameters
    pub fn parameters(&self) -> &Descriptor {
        &self.parameters
    }

    /// Records changed by the last execute, or -1 when not applicable
    pub fn records_affected(&self) -> i64 {
        self.records_affected
    }

    /// Rows requested per fetch round trip
    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// Set the rows requested per fetch round trip
    pub fn set_fetch_size(&mut self, size: usize) {
        self.fetch_size = size.max(1);
    }

    /// Whether a transaction end should close this statement
    fn is_live(&self) -> bool {
        !matches!(self.state, StatementState::Deallocated | StatementState::Closed)
    }

    fn transaction_ended(&self) -> bool {
        self.transaction.borrow().generation != self.generation
    }

    /// Apply a transaction end that happened since the last operation
    fn sync_transaction(&mut self) {
        if self.transaction_ended() && self.is_live() {
            tracing::debug!(handle = ?self.handle, "transaction ended, closing statement");
            self.clear_queues();
            self.state = StatementState::Closed;
        }
    }

    fn clear_queues(&mut self) {
        self.rows.clear();
        self.output_rows.clear();
        self.all_rows_fetched = false;
    }

    fn transaction_handle(&self) -> Result<i32> {
        self.transaction
            .borrow()
            .handle
            .ok_or_else(|| Error::InvalidState("transaction is not active".into()))
    }

    fn require_handle(&self) -> Result<i32> {
        self.handle
            .ok_or_else(|| Error::InvalidState("statement is not allocated".into()))
    }

    /// Mark the statement failed when the server rejected a request
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(Error::Isc(_) | Error::Protocol(_)) = &result {
            self.state = StatementState::Error;
        }
        result
    }

    // =========================================================================
    // Prepare
    // =========================================================================

    async fn allocate(&mut self, session: &mut Session) -> Result<i32> {
        let db_handle = session.handle()?;
        let request = ObjectMessage::new(op::ALLOCATE_STATEMENT, db_handle).build_request()?;
        let handle = session.exchange(request).await?.object_handle;

        self.handle = Some(handle);
        self.state = StatementState::Allocated;
        self.statement_type = StatementType::Unknown;
        self.all_rows_fetched = false;
        tracing::trace!(handle, "statement allocated");
        Ok(handle)
    }

    /// Prepare `sql` in the current run of the bound transaction
    ///
    /// Describes the output columns and input parameters and determines the
    /// statement type. A statement closed by a transaction end is rebound
    /// to the transaction's current run.
    pub async fn prepare(&mut self, sql: &str) -> Result<()> {
        let signal = *self.transaction.borrow_and_update();
        let tx_handle = signal
            .handle
            .ok_or_else(|| Error::InvalidState("transaction is not active".into()))?;
        self.generation = signal.generation;

        self.clear_queues();
        self.fields = Descriptor::default();
        self.parameters = Descriptor::default();
        self.column_names = Arc::new(Vec::new());
        self.statement_type = StatementType::Unknown;
        self.records_affected = -1;
        let sql_bytes = Bytes::from(self.charset.encode(sql)?);

        let session = self.session.clone();
        let mut session = session.lock().await;

        let handle = match self.handle {
            Some(handle) => handle,
            None => self.allocate(&mut session).await?,
        };
        self.state = StatementState::Allocated;

        let (fields, parameters) = self
            .describe_statement(&mut session, tx_handle, handle, sql_bytes)
            .await?;
        let statement_type = Self::query_statement_type(&mut session, handle).await?;
        drop(session);

        self.column_names = Arc::new(
            fields
                .fields()
                .iter()
                .map(|f| f.display_name().to_string())
                .collect(),
        );
        self.fields = fields;
        self.parameters = parameters;
        self.statement_type = statement_type;
        self.state = StatementState::Prepared;

        tracing::debug!(
            handle,
            statement_type = ?statement_type,
            columns = self.fields.count(),
            parameters = self.parameters.count(),
            "statement prepared"
        );
        Ok(())
    }

    async fn describe_statement(
        &self,
        session: &mut Session,
        tx_handle: i32,
        handle: i32,
        sql: Bytes,
    ) -> Result<(Descriptor, Descriptor)> {
        let request = PrepareMessage::new(
            tx_handle,
            handle,
            self.dialect,
            sql,
            &DESCRIBE_ITEMS,
            PREPARE_INFO_BUFFER_SIZE,
        )
        .build_request()?;
        let mut reply = session.exchange(request).await?.data;

        let mut state = DescribeState::new();
        loop {
            match describe(&reply, &DESCRIBE_ITEMS, &mut state, self.charset)? {
                DescribeOutcome::Complete => break,
                DescribeOutcome::Truncated { items } => {
                    tracing::trace!(handle, "describe truncated, requesting the rest");
                    let request =
                        InfoMessage::sql(handle, &items, PREPARE_INFO_BUFFER_SIZE).build_request()?;
                    reply = session.exchange(request).await?.data;
                }
            }
        }
        Ok(state.into_descriptors())
    }

    async fn query_statement_type(session: &mut Session, handle: i32) -> Result<StatementType> {
        let request = InfoMessage::sql(handle, &[sql_info::STMT_TYPE], STATEMENT_TYPE_BUFFER_SIZE)
            .build_request()?;
        let reply = session.exchange(request).await?.data;
        parse_statement_type(&reply)
    }

    // =========================================================================
    // Execute
    // =========================================================================

    /// Execute the prepared statement with `params`
    ///
    /// Parameters are converted and checked against the parameter
    /// descriptor before anything is sent. Executing a select again closes
    /// its open cursor first.
    pub async fn execute(&mut self, params: &[Value]) -> Result<()> {
        self.sync_transaction();
        match self.state {
            StatementState::Deallocated => {
                return Err(Error::InvalidState("statement is not allocated".into()))
            }
            StatementState::Closed => {
                return Err(Error::InvalidState(
                    "statement is closed; its transaction has ended".into(),
                ))
            }
            _ => {}
        }
        if self.statement_type == StatementType::Unknown {
            return Err(Error::InvalidState("statement is not prepared".into()));
        }
        let handle = self.require_handle()?;
        let tx_handle = self.transaction_handle()?;

        let message = encode_parameters(&self.parameters, params, self.charset)?;
        let mut request = ExecuteMessage::new(handle, tx_handle);
        if !self.parameters.is_empty() {
            request = request.with_parameters(self.parameters.to_blr()?, message);
        }
        let procedure = self.statement_type == StatementType::StoredProcedure;
        if procedure {
            request = request.with_output(self.fields.to_blr()?);
        }

        let session = self.session.clone();
        let mut session = session.lock().await;

        if self.state == StatementState::Executed && self.statement_type.is_cursor() {
            let close = FreeMessage::new(handle, dsql::CLOSE).build_request()?;
            let result = session.exchange(close).await.map(|_| ());
            self.track(result)?;
        }
        self.clear_queues();

        let result = self.run_execute(&mut session, request, procedure).await;
        self.track(result)?;

        let result = if self.statement_type.counts_records() {
            Self::query_records_affected(&mut session, handle).await
        } else {
            Ok(-1)
        };
        self.records_affected = self.track(result)?;
        self.state = StatementState::Executed;

        tracing::debug!(
            handle,
            records_affected = self.records_affected,
            "statement executed"
        );
        Ok(())
    }

    async fn run_execute(
        &mut self,
        session: &mut Session,
        request: ExecuteMessage,
        procedure: bool,
    ) -> Result<()> {
        session.wire.send(request.build_request()?).await?;

        if procedure {
            match session.wire.read_response().await? {
                Response::Sql(SqlResponse { count }) => {
                    if count > 0 {
                        let values =
                            read_row_values(&mut session.wire, &self.fields, self.charset).await?;
                        self.output_rows
                            .push_back(Row::with_names(values, self.column_names.clone()));
                    }
                }
                Response::Generic(_) => return Ok(()),
                other => {
                    return Err(Error::UnexpectedOperation {
                        expected: op::SQL_RESPONSE,
                        actual: other.operation(),
                    })
                }
            }
        }

        session.wire.read_generic_response().await?;
        Ok(())
    }

    async fn query_records_affected(session: &mut Session, handle: i32) -> Result<i64> {
        let request = InfoMessage::sql(handle, &[sql_info::RECORDS], ROWS_AFFECTED_BUFFER_SIZE)
            .build_request()?;
        let reply = session.exchange(request).await?.data;
        parse_records_affected(&reply)
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Fetch the next row
    ///
    /// Returns `None` once the cursor is exhausted, and for statement types
    /// that do not open a cursor. A stored procedure yields its output row
    /// once, unless it was already taken with
    /// [`output_parameters`](Self::output_parameters).
    pub async fn fetch(&mut self) -> Result<Option<Row>> {
        self.sync_transaction();
        match self.state {
            StatementState::Deallocated => {
                return Err(Error::InvalidState("statement is not allocated".into()))
            }
            StatementState::Closed => {
                return Err(Error::InvalidState(
                    "statement is closed; its transaction has ended".into(),
                ))
            }
            _ => {}
        }

        if self.statement_type == StatementType::StoredProcedure {
            if self.all_rows_fetched {
                return Ok(None);
            }
            self.all_rows_fetched = true;
            return Ok(self.output_rows.pop_front());
        }

        if !self.statement_type.is_cursor() {
            return Ok(None);
        }
        if self.state != StatementState::Executed {
            return Err(Error::InvalidState("statement has not been executed".into()));
        }

        if self.rows.is_empty() && !self.all_rows_fetched {
            let result = self.fetch_batch().await;
            self.track(result)?;
        }
        Ok(self.rows.pop_front())
    }

    /// Fetch every remaining row
    pub async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn fetch_batch(&mut self) -> Result<()> {
        let handle = self.require_handle()?;
        let fetch_size = i32::try_from(self.fetch_size).unwrap_or(i32::MAX);
        let request = FetchMessage::new(handle, self.fields.to_blr()?, fetch_size).build_request()?;

        let session = self.session.clone();
        let mut session = session.lock().await;
        session.wire.send(request).await?;

        let mut count = 0usize;
        loop {
            match session.wire.read_response().await? {
                Response::Fetch(FetchResponse { status: 0, count: n }) if n > 0 => {
                    let values =
                        read_row_values(&mut session.wire, &self.fields, self.charset).await?;
                    self.rows
                        .push_back(Row::with_names(values, self.column_names.clone()));
                    count += 1;
                }
                Response::Fetch(FetchResponse {
                    status: FETCH_NO_MORE_ROWS,
                    ..
                }) => {
                    self.all_rows_fetched = true;
                    break;
                }
                Response::Fetch(FetchResponse { status: 0, .. }) => break,
                Response::Fetch(FetchResponse { status, .. }) => {
                    return Err(Error::Protocol(format!("fetch failed with status {}", status)));
                }
                other => {
                    return Err(Error::UnexpectedOperation {
                        expected: op::FETCH_RESPONSE,
                        actual: other.operation(),
                    })
                }
            }
        }

        tracing::trace!(handle, rows = count, done = self.all_rows_fetched, "fetched batch");
        Ok(())
    }

    /// Take the output row of an executed stored procedure
    pub fn output_parameters(&mut self) -> Option<Row> {
        self.output_rows.pop_front()
    }

    // =========================================================================
    // Free
    // =========================================================================

    /// Release server resources held by the statement
    ///
    /// Closing a stored procedure does nothing; it has no cursor.
    pub async fn free(&mut self, option: FreeOption) -> Result<()> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        if option == FreeOption::Close && self.statement_type == StatementType::StoredProcedure {
            return Ok(());
        }

        let session = self.session.clone();
        let mut session = session.lock().await;
        let request = FreeMessage::new(handle, option.code()).build_request()?;
        session.exchange(request).await?;
        drop(session);

        self.clear_queues();
        match option {
            FreeOption::Drop => {
                self.fields = Descriptor::default();
                self.parameters = Descriptor::default();
                self.column_names = Arc::new(Vec::new());
                self.statement_type = StatementType::Unknown;
                self.handle = None;
                self.state = StatementState::Deallocated;
            }
            FreeOption::Unprepare => {
                self.fields = Descriptor::default();
                self.parameters = Descriptor::default();
                self.column_names = Arc::new(Vec::new());
                self.statement_type = StatementType::Unknown;
                self.state = StatementState::Allocated;
            }
            FreeOption::Close => {
                self.state = StatementState::Allocated;
            }
        }
        tracing::trace!(handle, ?option, "statement freed");
        Ok(())
    }

    /// Close the open cursor
    pub async fn close(&mut self) -> Result<()> {
        self.free(FreeOption::Close).await
    }

    // =========================================================================
    // Info
    // =========================================================================

    /// Execution plan of the prepared statement
    pub async fn plan(&mut self) -> Result<String> {
        self.sync_transaction();
        if self.statement_type == StatementType::Unknown {
            return Err(Error::InvalidState("statement is not prepared".into()));
        }
        let handle = self.require_handle()?;

        let session = self.session.clone();
        let mut session = session.lock().await;
        let mut buffer_length = DEFAULT_MAX_BUFFER_SIZE;
        for _ in 0..PLAN_ATTEMPTS {
            let request = InfoMessage::sql(handle, &[sql_info::GET_PLAN], buffer_length)
                .build_request()?;
            let reply = session.exchange(request).await?.data;
            match parse_plan(&reply, self.charset)? {
                Some(plan) => return Ok(plan),
                None => buffer_length = buffer_length.saturating_mul(2),
            }
        }
        Err(Error::Protocol("statement plan does not fit the reply buffer".into()))
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        // Can't free asynchronously here; the server releases the handle at detach
        if let Some(handle) = self.handle {
            tracing::trace!(handle, "statement dropped without free");
        }
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("handle", &self.handle)
            .field("state", &self.state())
            .field("statement_type", &self.statement_type)
            .field("queued_rows", &self.rows.len())
            .finish()
    }
}

// =============================================================================
// Info replies
// =============================================================================

fn parse_statement_type(reply: &[u8]) -> Result<StatementType> {
    let mut r = ReadBuffer::from_slice(reply);
    if r.remaining() == 0 || r.read_u8()? != sql_info::STMT_TYPE {
        return Err(Error::Protocol("missing statement type in info reply".into()));
    }
    Ok(StatementType::from_code(r.read_clumplet_int()?))
}

/// Sum the insert, update and delete counts of an `isc_info_sql_records` reply
fn parse_records_affected(reply: &[u8]) -> Result<i64> {
    let mut r = ReadBuffer::from_slice(reply);
    if r.remaining() == 0 || r.read_u8()? != sql_info::RECORDS {
        return Ok(-1);
    }
    r.skip(2)?;

    let mut total = 0i64;
    while r.remaining() > 0 {
        let item = r.read_u8()?;
        if item == info::END {
            break;
        }
        let len = r.read_u16_le()? as usize;
        let count = r.read_vax_i64(len)?;
        if matches!(
            item,
            sql_info::REQ_INSERT_COUNT | sql_info::REQ_UPDATE_COUNT | sql_info::REQ_DELETE_COUNT
        ) {
            total += count;
        }
    }
    Ok(total)
}

/// Plan text of an `isc_info_sql_get_plan` reply, or `None` when truncated
fn parse_plan(reply: &[u8], charset: Charset) -> Result<Option<String>> {
    match reply.first() {
        None | Some(&info::END) => return Ok(Some(String::new())),
        Some(&info::TRUNCATED) => return Ok(None),
        Some(&sql_info::GET_PLAN) => {}
        Some(other) => {
            return Err(Error::Protocol(format!("unexpected plan info item {}", other)));
        }
    }
    if reply.len() < 3 {
        return Err(Error::Protocol("plan reply too short".into()));
    }
    let len = u16::from_le_bytes([reply[1], reply[2]]) as usize;
    // The plan text starts with a newline
    let end = (3 + len).min(reply.len());
    let start = 4.min(end);
    charset.decode(&reply[start..end]).map(Some)
}
