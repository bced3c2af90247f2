//! Firebird database attachment
//!
//! This module provides the main [`Database`] type. One `Database` owns one
//! connection; transactions, statements, blobs and arrays created from it
//! share that connection and serialise on its session lock.
//!
//! # Example
//!
//! ```rust,no_run
//! use firebird_rs::{Config, Database, TransactionOptions, Value};
//!
//! # async fn example() -> firebird_rs::Result<()> {
//! let config = Config::new("localhost", "/data/employee.fdb", "SYSDBA", "masterkey");
//! let db = Database::connect(config).await?;
//!
//! let mut tx = db.begin_transaction(TransactionOptions::default()).await?;
//! let mut stmt = db.create_statement(&tx);
//! stmt.prepare("SELECT emp_no, first_name FROM employee WHERE dept_no = ?").await?;
//! stmt.execute(&[Value::from("600")]).await?;
//! while let Some(row) = stmt.fetch().await? {
//!     println!("{:?}", row);
//! }
//!
//! tx.commit().await?;
//! db.detach().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, MutexGuard};

use crate::array::ArrayHandle;
use crate::blob::Blob;
use crate::buffer::WriteBuffer;
use crate::charset::Charset;
use crate::config::Config;
use crate::constants::{cancel, db_info, dpb, isc, op, DEFAULT_MAX_BUFFER_SIZE};
use crate::error::{Error, Result};
use crate::events::{build_epb, parse_aux_port, EventManager, EventSubscription};
use crate::info::{parse_database_info, InfoItem, InfoValue};
use crate::messages::{
    AcceptMessage, AttachMessage, CancelEventsMessage, CancelMessage, ConnectMessage,
    ConnectRequestMessage, GenericResponse, InfoMessage, ObjectMessage, QueueEventsMessage,
    SUPPORTED_PROTOCOLS,
};
use crate::params::ParameterBuffer;
use crate::statement::Statement;
use crate::transaction::{Transaction, TransactionOptions};
use crate::transport::{StreamTransport, TcpTransport, Transport};
use crate::wire::{WarningHandler, Wire};

/// Kind of out-of-band cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelKind {
    /// Ignore cancel requests until re-enabled
    Disable,
    /// Accept cancel requests again
    Enable,
    /// Cancel the operation currently running on the attachment
    Raise,
    /// Abort the attachment
    Abort,
}

impl CancelKind {
    fn code(self) -> i32 {
        match self {
            CancelKind::Disable => cancel::DISABLE,
            CancelKind::Enable => cancel::ENABLE,
            CancelKind::Raise => cancel::RAISE,
            CancelKind::Abort => cancel::ABORT,
        }
    }
}

pub(crate) type SharedSession = Arc<Mutex<Session>>;

/// Connection state shared by everything created from one [`Database`]
pub(crate) struct Session {
    pub(crate) wire: Wire,
    handle: Option<i32>,
    pub(crate) protocol: AcceptMessage,
    pub(crate) packet_size: usize,
    server_version: Option<String>,
    /// Transactions begun and not yet committed or rolled back
    pub(crate) transaction_count: i32,
    events: Option<EventManager>,
    next_event_id: i32,
}

impl Session {
    fn new(wire: Wire, protocol: AcceptMessage, config: &Config) -> Self {
        Self {
            wire,
            handle: None,
            protocol,
            packet_size: config.packet_size,
            server_version: None,
            transaction_count: 0,
            events: None,
            next_event_id: 0,
        }
    }

    /// Attachment handle; fails once detached
    pub(crate) fn handle(&self) -> Result<i32> {
        self.handle.ok_or(Error::ConnectionClosed)
    }

    pub(crate) fn charset(&self) -> Charset {
        self.wire.charset()
    }

    /// Send one request and read its `op_response`
    pub(crate) async fn exchange(&mut self, request: Bytes) -> Result<GenericResponse> {
        self.wire.send(request).await?;
        self.wire.read_generic_response().await
    }

    async fn attach(&mut self, config: &Config, create: bool) -> Result<()> {
        let dpb = build_dpb(config, create)?;
        let message = if create {
            AttachMessage::create(config.database.clone(), dpb)
        } else {
            AttachMessage::attach(config.database.clone(), dpb)
        };
        let response = self.exchange(message.build_request()?).await?;
        self.handle = Some(response.object_handle);
        tracing::debug!(
            handle = response.object_handle,
            database = %config.database,
            create,
            "attached to database"
        );

        let items = self
            .database_info(&[db_info::FIREBIRD_VERSION], DEFAULT_MAX_BUFFER_SIZE)
            .await?;
        self.server_version = items.into_iter().find_map(|item| match item.value {
            InfoValue::Versions(versions) => versions.into_iter().next(),
            _ => None,
        });
        Ok(())
    }

    pub(crate) async fn database_info(
        &mut self,
        items: &[u8],
        buffer_length: i32,
    ) -> Result<Vec<InfoItem>> {
        let handle = self.handle()?;
        let request = InfoMessage::database(handle, items, buffer_length).build_request()?;
        let response = self.exchange(request).await?;
        parse_database_info(&response.data, self.charset())
    }

    /// Send `op_disconnect` and drop the socket, logging failures
    async fn disconnect_quietly(&mut self) {
        if let Ok(request) = ObjectMessage::bare(op::DISCONNECT).build_request() {
            if let Err(e) = self.wire.send(request).await {
                tracing::warn!(error = %e, "disconnect request failed");
            }
        }
        if let Err(e) = self.wire.close().await {
            tracing::warn!(error = %e, "closing connection failed");
        }
        self.handle = None;
    }

    async fn stop_events(&mut self) {
        if let Some(manager) = self.events.take() {
            manager.close().await;
        }
    }

    fn reset(&mut self) {
        self.handle = None;
        self.server_version = None;
        self.transaction_count = 0;
        self.next_event_id = 0;
    }
}

/// Build the database parameter buffer for attach or create
pub(crate) fn build_dpb(config: &Config, create: bool) -> Result<Bytes> {
    let mut dpb = ParameterBuffer::with_version(dpb::VERSION1);
    dpb.append_string(dpb::USER_NAME, &config.user)?;
    dpb.append_string(dpb::PASSWORD, config.password())?;
    dpb.append_string(dpb::LC_CTYPE, config.charset.name())?;
    dpb.append_i32(dpb::SQL_DIALECT, config.dialect as i32);
    dpb.append_i32(dpb::PROCESS_ID, std::process::id() as i32);
    dpb.append_string(dpb::PROCESS_NAME, &process_name())?;

    if let Some(role) = &config.role {
        dpb.append_string(dpb::SQL_ROLE_NAME, role)?;
    }

    let timeout = config.connect_timeout.as_secs();
    if timeout > 0 {
        dpb.append_i32(dpb::CONNECT_TIMEOUT, timeout.min(i32::MAX as u64) as i32);
    }

    if create {
        if let Some(page_size) = config.page_size {
            dpb.append_i32(dpb::PAGE_SIZE, page_size);
        }
        dpb.append_string(dpb::SET_DB_CHARSET, config.charset.name())?;
    }

    Ok(dpb.into_bytes())
}

fn process_name() -> String {
    let mut name = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();
    while name.len() > 255 {
        name.pop();
    }
    name
}

/// Run `op_connect` for `path` and read the server's protocol choice
pub(crate) async fn handshake(wire: &mut Wire, path: &str) -> Result<AcceptMessage> {
    let request = ConnectMessage::new(path.to_string()).build_request()?;
    wire.send(request).await?;

    let operation = wire.read_operation().await?;
    if operation != op::ACCEPT {
        tracing::debug!(operation, "connection rejected");
        return Err(Error::isc(isc::CONNECT_REJECT));
    }

    let accept = AcceptMessage::read(wire).await?;
    if !SUPPORTED_PROTOCOLS.iter().any(|p| p.version == accept.version) {
        return Err(Error::ProtocolVersionNotSupported(accept.version));
    }
    tracing::debug!(
        protocol = accept.protocol_number(),
        accept_type = accept.accept_type,
        "protocol accepted"
    );
    Ok(accept)
}

/// An attachment to a Firebird database
///
/// Operations lock the session for their whole request/response exchange,
/// so concurrent callers on one `Database` are serialised. Use several
/// databases for parallel work.
pub struct Database {
    inner: SharedSession,
    config: Config,
    closed: AtomicBool,
    id: u32,
}

// Database ID counter
static DATABASE_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

impl Database {
    /// Attach to an existing database over TCP
    pub async fn connect(config: Config) -> Result<Self> {
        let transport = Self::tcp_transport(&config).await?;
        Self::open(Box::new(transport), config, false).await
    }

    /// Create a new database over TCP and attach to it
    pub async fn create(config: Config) -> Result<Self> {
        let transport = Self::tcp_transport(&config).await?;
        Self::open(Box::new(transport), config, true).await
    }

    /// Attach over an already connected byte stream
    ///
    /// Useful for tunnels and in-process servers. Event notifications need a
    /// second connection to the server and are unavailable on such streams.
    pub async fn connect_stream<S>(stream: S, config: Config) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Self::open(Box::new(StreamTransport::new(stream)), config, false).await
    }

    async fn tcp_transport(config: &Config) -> Result<TcpTransport> {
        let mut transport = TcpTransport::new();
        transport.connect_with_config(config).await?;
        Ok(transport)
    }

    async fn open(transport: Box<dyn Transport>, config: Config, create: bool) -> Result<Self> {
        let id = DATABASE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut wire = Wire::new(transport, config.charset);

        let protocol = match handshake(&mut wire, &config.database).await {
            Ok(protocol) => protocol,
            Err(e) => {
                if let Err(close_err) = wire.close().await {
                    tracing::warn!(error = %close_err, "closing rejected connection failed");
                }
                return Err(e);
            }
        };

        let mut session = Session::new(wire, protocol, &config);
        if let Err(e) = session.attach(&config, create).await {
            session.disconnect_quietly().await;
            return Err(e);
        }

        Ok(Database {
            inner: Arc::new(Mutex::new(session)),
            config,
            closed: AtomicBool::new(false),
            id,
        })
    }

    /// Get the database ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Check if the attachment is closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Configuration this database was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn shared_session(&self) -> SharedSession {
        self.inner.clone()
    }

    async fn session(&self) -> Result<MutexGuard<'_, Session>> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let session = self.inner.lock().await;
        session.handle()?;
        Ok(session)
    }

    /// Server-side attachment handle
    pub async fn handle(&self) -> Result<i32> {
        self.session().await?.handle()
    }

    /// Negotiated protocol version, without the Firebird flag bit
    pub async fn protocol_version(&self) -> Result<i32> {
        Ok(self.session().await?.protocol.protocol_number())
    }

    /// Number of transactions begun on this attachment and not yet ended
    pub async fn transaction_count(&self) -> i32 {
        self.inner.lock().await.transaction_count
    }

    /// Detach from the database
    ///
    /// Fails with `isc_open_trans`, carrying the number of open
    /// transactions, while any transaction is still active; the attachment
    /// stays usable in that case. After a successful detach every further
    /// call fails with [`Error::ConnectionClosed`].
    pub async fn detach(&self) -> Result<()> {
        let mut session = self.session().await?;

        if session.transaction_count > 0 {
            return Err(Error::isc_with_number(
                isc::OPEN_TRANS,
                session.transaction_count,
            ));
        }

        session.stop_events().await;

        let handle = session.handle()?;
        let mut buf = WriteBuffer::with_capacity(12);
        buf.write_bytes(&ObjectMessage::new(op::DETACH, handle).build_request()?)?;
        buf.write_bytes(&ObjectMessage::bare(op::DISCONNECT).build_request()?)?;
        session.wire.send(buf.freeze()).await?;
        let result = session.wire.read_generic_response().await;

        if let Err(e) = session.wire.close().await {
            tracing::warn!(error = %e, "closing connection failed");
        }
        session.reset();
        self.closed.store(true, Ordering::Relaxed);
        tracing::debug!(id = self.id, handle, "detached from database");

        result.map(|_| ())
    }

    /// Drop the database and close the connection
    pub async fn drop_database(&self) -> Result<()> {
        let mut session = self.session().await?;
        session.stop_events().await;

        let handle = session.handle()?;
        let request = ObjectMessage::new(op::DROP_DATABASE, handle).build_request()?;
        let result = session.exchange(request).await;

        if let Err(e) = session.wire.close().await {
            tracing::warn!(error = %e, "closing connection failed");
        }
        session.reset();
        self.closed.store(true, Ordering::Relaxed);
        tracing::debug!(id = self.id, handle, "database dropped");

        result.map(|_| ())
    }

    /// Query database information items
    pub async fn database_info(&self, items: &[u8]) -> Result<Vec<InfoItem>> {
        self.database_info_with_size(items, DEFAULT_MAX_BUFFER_SIZE)
            .await
    }

    /// Query database information items with an explicit reply buffer size
    pub async fn database_info_with_size(
        &self,
        items: &[u8],
        buffer_length: i32,
    ) -> Result<Vec<InfoItem>> {
        self.session()
            .await?
            .database_info(items, buffer_length)
            .await
    }

    async fn info_value(&self, item: u8) -> Result<InfoValue> {
        self.database_info(&[item])
            .await?
            .into_iter()
            .find(|i| i.item == item)
            .map(|i| i.value)
            .ok_or_else(|| Error::Protocol(format!("server did not return info item {}", item)))
    }

    /// Server version reported at attach time, e.g. `WI-V3.0.10.33601 Firebird 3.0`
    pub async fn server_version(&self) -> Option<String> {
        self.inner.lock().await.server_version.clone()
    }

    /// Database page size in bytes
    pub async fn page_size(&self) -> Result<i64> {
        self.info_value(db_info::PAGE_SIZE)
            .await?
            .as_i64()
            .ok_or_else(|| Error::Protocol("invalid page size".into()))
    }

    /// On-disk structure version as `major.minor`
    pub async fn ods_version(&self) -> Result<String> {
        let items = self
            .database_info(&[db_info::ODS_VERSION, db_info::ODS_MINOR_VERSION])
            .await?;
        let get = |item: u8| {
            items
                .iter()
                .find(|i| i.item == item)
                .and_then(|i| i.value.as_i64())
                .ok_or_else(|| Error::Protocol(format!("server did not return info item {}", item)))
        };
        Ok(format!(
            "{}.{}",
            get(db_info::ODS_VERSION)?,
            get(db_info::ODS_MINOR_VERSION)?
        ))
    }

    /// Ids of the transactions currently active in the database
    pub async fn active_transactions(&self) -> Result<Vec<i64>> {
        Ok(self
            .database_info(&[db_info::ACTIVE_TRANSACTIONS])
            .await?
            .into_iter()
            .filter(|i| i.item == db_info::ACTIVE_TRANSACTIONS)
            .filter_map(|i| i.value.as_i64())
            .collect())
    }

    /// Check that the server still answers
    pub async fn ping(&self) -> Result<()> {
        self.database_info(&[db_info::ATTACHMENT_ID]).await.map(|_| ())
    }

    /// Install (or remove) the callback receiving server warnings
    ///
    /// Without a callback, warnings are logged with `tracing::warn!`.
    pub async fn set_warning_handler(&self, handler: Option<WarningHandler>) {
        self.inner.lock().await.wire.set_warning_handler(handler);
    }

    /// Start a transaction
    pub async fn begin_transaction(&self, options: TransactionOptions) -> Result<Transaction> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let mut transaction = Transaction::new(self.inner.clone());
        transaction.begin(&options).await?;
        Ok(transaction)
    }

    /// Create a statement bound to `transaction`
    pub fn create_statement(&self, transaction: &Transaction) -> Statement {
        Statement::new(self.inner.clone(), transaction, &self.config)
    }

    /// Create a new blob in `transaction`
    pub async fn create_blob(&self, transaction: &Transaction) -> Result<Blob> {
        Blob::create(self.inner.clone(), transaction, None).await
    }

    /// Create a new blob with a blob parameter buffer
    pub async fn create_blob_with(&self, transaction: &Transaction, bpb: Bytes) -> Result<Blob> {
        Blob::create(self.inner.clone(), transaction, Some(bpb)).await
    }

    /// Open the existing blob `id` in `transaction`
    pub async fn open_blob(&self, transaction: &Transaction, id: i64) -> Result<Blob> {
        Blob::open(self.inner.clone(), transaction, id).await
    }

    /// Access the array column `relation.field`
    ///
    /// The array descriptor is looked up from the system tables.
    pub async fn array(
        &self,
        transaction: &Transaction,
        relation: &str,
        field: &str,
    ) -> Result<ArrayHandle> {
        ArrayHandle::lookup(self, transaction, relation, field).await
    }

    /// Register interest in the named events
    ///
    /// The first subscription opens the auxiliary event connection and
    /// starts the background event task; later ones join it.
    pub async fn queue_events(&self, names: &[&str]) -> Result<EventSubscription> {
        if names.is_empty() {
            return Err(Error::InvalidState("no event names given".into()));
        }
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let epb = build_epb(&names, &vec![0; names.len()])?;

        let mut session = self.session().await?;
        let db_handle = session.handle()?;

        if !session.events.as_ref().is_some_and(|m| m.is_running()) {
            let manager = self.start_event_manager(&mut session, db_handle).await?;
            session.events = Some(manager);
        }

        session.next_event_id += 1;
        let local_id = session.next_event_id;
        let receiver = match &session.events {
            Some(manager) => manager.queue(local_id, names.clone())?,
            None => return Err(Error::Internal("event manager not running".into())),
        };

        let request = QueueEventsMessage::new(db_handle, epb, local_id).build_request()?;
        match session.exchange(request).await {
            Ok(response) => {
                tracing::debug!(local_id, remote_id = response.object_handle, "events queued");
                Ok(EventSubscription::new(
                    local_id,
                    response.object_handle,
                    names,
                    receiver,
                ))
            }
            Err(e) => {
                if let Some(manager) = &session.events {
                    manager.cancel(local_id);
                }
                Err(e)
            }
        }
    }

    async fn start_event_manager(
        &self,
        session: &mut Session,
        db_handle: i32,
    ) -> Result<EventManager> {
        let host = session
            .wire
            .peer_host()
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::FeatureNotSupported("events require a TCP connection".into())
            })?;

        let request = ConnectRequestMessage::new(db_handle).build_request()?;
        let response = session.exchange(request).await?;
        let port = parse_aux_port(&response.data)?;

        let mut transport = TcpTransport::new().connect_timeout(self.config.connect_timeout);
        transport.connect(&host, port).await?;
        let mut aux = Wire::new(Box::new(transport), session.charset());
        aux.set_warning_handler(session.wire.warning_handler());

        tracing::debug!(
            host = %host,
            port,
            aux_handle = response.object_handle,
            "event connection opened"
        );
        Ok(EventManager::spawn(aux))
    }

    /// Cancel a subscription made with [`queue_events`](Self::queue_events)
    pub async fn cancel_events(&self, subscription: &EventSubscription) -> Result<()> {
        let mut session = self.session().await?;
        let db_handle = session.handle()?;
        let request = CancelEventsMessage::new(db_handle, subscription.id()).build_request()?;
        session.exchange(request).await?;
        if let Some(manager) = &session.events {
            manager.cancel(subscription.id());
        }
        Ok(())
    }

    /// Send an out-of-band cancel request
    ///
    /// Needs protocol 12 or later. The request carries no reply; a redundant
    /// cancel surfaces as `isc_nothing_to_cancel` on a later response and is
    /// ignored there.
    pub async fn cancel_operation(&self, kind: CancelKind) -> Result<()> {
        let mut session = self.session().await?;
        if session.protocol.protocol_number() < 12 {
            return Err(Error::FeatureNotSupported(
                "cancel needs protocol 12 or later".into(),
            ));
        }
        let request = CancelMessage::new(kind.code()).build_request()?;
        session.wire.send(request).await
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Can't detach asynchronously here; call detach() explicitly
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("id", &self.id)
            .field("database", &self.config.database)
            .field("closed", &self.is_closed())
            .finish()
    }
}
