//! Transaction lifecycle
//!
//! A [`Transaction`] is begun with a transaction parameter buffer built from
//! [`TransactionOptions`]. Ending it with commit or rollback invalidates
//! every statement bound to it; the retaining variants keep the server
//! context and the statements alive.

use bytes::Bytes;
use tokio::sync::watch;

use crate::constants::{op, tpb, DEFAULT_MAX_BUFFER_SIZE};
use crate::database::SharedSession;
use crate::error::{Error, Result};
use crate::messages::{InfoMessage, ObjectMessage, Prepare2Message, TransactionMessage};
use crate::params::ParameterBuffer;

// =============================================================================
// Options
// =============================================================================

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Snapshot isolation
    #[default]
    Concurrency,
    /// Snapshot with table stability
    Consistency,
    /// Read committed; `rec_version` reads the latest committed version
    /// instead of waiting on uncommitted ones
    ReadCommitted {
        /// Whether to read the latest committed record version
        rec_version: bool,
    },
}

/// Options used to build the transaction parameter buffer
///
/// The default is a read-write snapshot transaction that waits on lock
/// conflicts.
///
/// # Example
///
/// ```rust
/// use firebird_rs::{IsolationLevel, TransactionOptions};
///
/// let options = TransactionOptions::new()
///     .isolation(IsolationLevel::ReadCommitted { rec_version: true })
///     .lock_timeout(5)
///     .read_only();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOptions {
    isolation: IsolationLevel,
    wait: bool,
    lock_timeout: Option<i32>,
    read_only: bool,
    no_auto_undo: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::Concurrency,
            wait: true,
            lock_timeout: None,
            read_only: false,
            no_auto_undo: false,
        }
    }
}

impl TransactionOptions {
    /// Create the default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Wait on lock conflicts
    pub fn wait(mut self) -> Self {
        self.wait = true;
        self
    }

    /// Fail immediately on lock conflicts
    pub fn nowait(mut self) -> Self {
        self.wait = false;
        self.lock_timeout = None;
        self
    }

    /// Wait at most `seconds` on lock conflicts
    pub fn lock_timeout(mut self, seconds: i32) -> Self {
        self.wait = true;
        self.lock_timeout = Some(seconds);
        self
    }

    /// Start a read-only transaction
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Start a read-write transaction
    pub fn read_write(mut self) -> Self {
        self.read_only = false;
        self
    }

    /// Skip the undo log for this transaction
    pub fn no_auto_undo(mut self) -> Self {
        self.no_auto_undo = true;
        self
    }

    /// Encode the transaction parameter buffer
    pub fn to_tpb(&self) -> Bytes {
        let mut pb = ParameterBuffer::with_version(tpb::VERSION3);

        match self.isolation {
            IsolationLevel::Concurrency => {
                pb.append_tag(tpb::CONCURRENCY);
            }
            IsolationLevel::Consistency => {
                pb.append_tag(tpb::CONSISTENCY);
            }
            IsolationLevel::ReadCommitted { rec_version } => {
                pb.append_tag(tpb::READ_COMMITTED);
                pb.append_tag(if rec_version {
                    tpb::REC_VERSION
                } else {
                    tpb::NO_REC_VERSION
                });
            }
        }

        if self.wait {
            pb.append_tag(tpb::WAIT);
            if let Some(timeout) = self.lock_timeout {
                pb.append_i32(tpb::LOCK_TIMEOUT, timeout);
            }
        } else {
            pb.append_tag(tpb::NOWAIT);
        }

        pb.append_tag(if self.read_only { tpb::READ } else { tpb::WRITE });

        if self.no_auto_undo {
            pb.append_tag(tpb::NO_AUTO_UNDO);
        }

        pb.into_bytes()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Not started, or ended by commit or rollback
    NoTransaction,
    /// Started
    Active,
    /// First phase of a two-phase commit done
    Prepared,
}

/// What bound statements observe about their transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransactionSignal {
    /// Bumped every time the transaction ends
    pub(crate) generation: u64,
    /// Server handle while the transaction is running
    pub(crate) handle: Option<i32>,
}

/// A database transaction
///
/// Created by [`Database::begin_transaction`](crate::Database::begin_transaction).
/// Dropping an active transaction logs a warning and rolls it back in the
/// background.
pub struct Transaction {
    session: SharedSession,
    handle: Option<i32>,
    state: TransactionState,
    signal: watch::Sender<TransactionSignal>,
}

impl Transaction {
    pub(crate) fn new(session: SharedSession) -> Self {
        let (signal, _) = watch::channel(TransactionSignal {
            generation: 0,
            handle: None,
        });
        Self {
            session,
            handle: None,
            state: TransactionState::NoTransaction,
            signal,
        }
    }

    /// Server handle, while the transaction is running
    pub fn handle(&self) -> Option<i32> {
        self.handle
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Whether the transaction has been started and not yet ended
    pub fn is_active(&self) -> bool {
        self.state != TransactionState::NoTransaction
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<TransactionSignal> {
        self.signal.subscribe()
    }

    /// Start the transaction
    ///
    /// A transaction that was committed or rolled back may be started again;
    /// statements bound to its previous run stay closed.
    pub async fn begin(&mut self, options: &TransactionOptions) -> Result<()> {
        if self.state != TransactionState::NoTransaction {
            return Err(Error::InvalidState("transaction already started".into()));
        }

        let mut session = self.session.lock().await;
        let db_handle = session.handle()?;
        let request = TransactionMessage::new(db_handle, options.to_tpb()).build_request()?;
        let response = session.exchange(request).await?;
        session.transaction_count += 1;
        drop(session);

        let handle = response.object_handle;
        self.handle = Some(handle);
        self.state = TransactionState::Active;
        self.signal.send_modify(|s| s.handle = Some(handle));
        tracing::debug!(handle, "transaction started");
        Ok(())
    }

    fn ensure_started(&self) -> Result<i32> {
        match (self.state, self.handle) {
            (TransactionState::Active | TransactionState::Prepared, Some(handle)) => Ok(handle),
            _ => Err(Error::InvalidState("transaction is not active".into())),
        }
    }

    fn ensure_active(&self) -> Result<i32> {
        match (self.state, self.handle) {
            (TransactionState::Active, Some(handle)) => Ok(handle),
            _ => Err(Error::InvalidState("transaction is not active".into())),
        }
    }

    /// Commit and end the transaction
    pub async fn commit(&mut self) -> Result<()> {
        self.end(op::COMMIT).await?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Roll back and end the transaction
    pub async fn rollback(&mut self) -> Result<()> {
        self.end(op::ROLLBACK).await?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    async fn end(&mut self, operation: i32) -> Result<()> {
        let handle = self.ensure_started()?;

        let mut session = self.session.lock().await;
        let request = ObjectMessage::new(operation, handle).build_request()?;
        session.exchange(request).await?;
        session.transaction_count = (session.transaction_count - 1).max(0);
        drop(session);

        self.handle = None;
        self.state = TransactionState::NoTransaction;
        self.signal.send_modify(|s| {
            s.generation += 1;
            s.handle = None;
        });
        Ok(())
    }

    /// Commit the work done so far and keep the transaction open
    pub async fn commit_retaining(&mut self) -> Result<()> {
        self.retain(op::COMMIT_RETAINING).await
    }

    /// Undo the work done so far and keep the transaction open
    pub async fn rollback_retaining(&mut self) -> Result<()> {
        self.retain(op::ROLLBACK_RETAINING).await
    }

    async fn retain(&mut self, operation: i32) -> Result<()> {
        let handle = self.ensure_active()?;
        let mut session = self.session.lock().await;
        let request = ObjectMessage::new(operation, handle).build_request()?;
        session.exchange(request).await?;
        tracing::debug!(handle, operation, "transaction retained");
        Ok(())
    }

    /// First phase of a two-phase commit
    pub async fn prepare(&mut self) -> Result<()> {
        let handle = self.ensure_active()?;
        let mut session = self.session.lock().await;
        let request = ObjectMessage::new(op::PREPARE, handle).build_request()?;
        session.exchange(request).await?;
        drop(session);

        self.state = TransactionState::Prepared;
        tracing::debug!(handle, "transaction prepared");
        Ok(())
    }

    /// First phase of a two-phase commit, recording `message` with the
    /// prepared transaction for recovery
    pub async fn prepare_with(&mut self, message: &[u8]) -> Result<()> {
        let handle = self.ensure_active()?;
        let mut session = self.session.lock().await;
        let request =
            Prepare2Message::new(handle, Bytes::copy_from_slice(message)).build_request()?;
        session.exchange(request).await?;
        drop(session);

        self.state = TransactionState::Prepared;
        tracing::debug!(handle, "transaction prepared");
        Ok(())
    }

    /// Query transaction information items; returns the raw reply buffer
    pub async fn info(&self, items: &[u8]) -> Result<Bytes> {
        let handle = self.ensure_started()?;
        let mut session = self.session.lock().await;
        let request =
            InfoMessage::transaction(handle, items, DEFAULT_MAX_BUFFER_SIZE).build_request()?;
        Ok(session.exchange(request).await?.data)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.signal.send_modify(|s| {
            s.generation += 1;
            s.handle = None;
        });
        tracing::warn!(handle, "transaction dropped while active, rolling back");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let session = self.session.clone();
        runtime.spawn(async move {
            let mut session = session.lock().await;
            if session.handle().is_err() {
                return;
            }
            let result = match ObjectMessage::new(op::ROLLBACK, handle).build_request() {
                Ok(request) => session.exchange(request).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => session.transaction_count = (session.transaction_count - 1).max(0),
                Err(e) => tracing::warn!(handle, error = %e, "background rollback failed"),
            }
        });
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .finish()
    }
}
