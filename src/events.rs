//! Database event notifications
//!
//! Events are delivered over an auxiliary connection the server opens on
//! request. One background task per session owns that connection and the
//! map of pending subscriptions; [`Database`](crate::Database) talks to it
//! over a command channel.

use std::collections::HashMap;

use bytes::Bytes;
use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::buffer::{ReadBuffer, XdrRead};
use crate::constants::{epb, op};
use crate::error::{Error, Result};
use crate::params::ParameterBuffer;
use crate::wire::Wire;

/// Event name to the number of times it was posted since queueing
pub type EventCounts = IndexMap<String, u32>;

/// A queued set of events
///
/// The subscription fires once: [`wait`](Self::wait) resolves with the
/// counts of the first notification. Queue again to keep listening.
#[derive(Debug)]
pub struct EventSubscription {
    local_id: i32,
    remote_id: i32,
    names: Vec<String>,
    receiver: oneshot::Receiver<EventCounts>,
}

impl EventSubscription {
    pub(crate) fn new(
        local_id: i32,
        remote_id: i32,
        names: Vec<String>,
        receiver: oneshot::Receiver<EventCounts>,
    ) -> Self {
        Self {
            local_id,
            remote_id,
            names,
            receiver,
        }
    }

    /// Client-side id of this subscription
    pub fn id(&self) -> i32 {
        self.local_id
    }

    /// Id the server assigned
    pub fn remote_id(&self) -> i32 {
        self.remote_id
    }

    /// Event names in queue order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Wait for the notification
    ///
    /// Fails with [`Error::ConnectionClosed`] when the subscription is
    /// cancelled or the event connection goes away first.
    pub async fn wait(self) -> Result<EventCounts> {
        self.receiver.await.map_err(|_| Error::ConnectionClosed)
    }
}

/// Build an event parameter buffer for `names` with the last seen `counts`
pub(crate) fn build_epb(names: &[String], counts: &[u32]) -> Result<Bytes> {
    let mut buf = ParameterBuffer::with_version(epb::VERSION1);
    for (i, name) in names.iter().enumerate() {
        let count = counts.get(i).copied().unwrap_or(0);
        let len = u8::try_from(name.len())
            .map_err(|_| Error::DataConversion(format!("event name too long: {}", name)))?;
        buf.append_raw(&[len])
            .append_raw(name.as_bytes())
            .append_raw(&count.to_le_bytes());
    }
    Ok(buf.into_bytes())
}

/// Decode the counts of an `op_event` EPB, diffed against `queued`
pub(crate) fn parse_epb_counts(data: &[u8], queued: &[u32]) -> Result<EventCounts> {
    let mut r = ReadBuffer::from_slice(data);
    let mut counts = EventCounts::new();
    if r.remaining() == 0 {
        return Ok(counts);
    }
    if r.read_u8()? != epb::VERSION1 {
        return Err(Error::Protocol("unknown event buffer version".into()));
    }
    let mut i = 0;
    while r.remaining() > 0 {
        let len = r.read_u8()? as usize;
        let name = String::from_utf8_lossy(&r.read_bytes(len)?).into_owned();
        let raw = r.read_bytes(4)?;
        let count = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let base = queued.get(i).copied().unwrap_or(0);
        counts.insert(name, count.saturating_sub(base));
        i += 1;
    }
    Ok(counts)
}

/// Port of the auxiliary connection from an `op_connect_request` reply
///
/// The reply carries a socket address: family (2 bytes), port (2 bytes,
/// network order) and the address, which is ignored in favour of the
/// host of the main connection.
pub(crate) fn parse_aux_port(data: &[u8]) -> Result<u16> {
    let mut r = ReadBuffer::from_slice(data);
    r.skip(2)?;
    let port = r.read_bytes(2)?;
    Ok(u16::from_be_bytes([port[0], port[1]]))
}

// =============================================================================
// Listener task
// =============================================================================

enum Command {
    Queue {
        id: i32,
        names: Vec<String>,
        sender: oneshot::Sender<EventCounts>,
    },
    Cancel(i32),
    Close,
}

/// One notification read from the auxiliary connection
struct Notification {
    event_id: i32,
    epb: Bytes,
}

struct Pending {
    names: Vec<String>,
    sender: oneshot::Sender<EventCounts>,
}

/// Handle to the background event task
pub(crate) struct EventManager {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl EventManager {
    /// Start the listener on an established auxiliary connection
    pub(crate) fn spawn(wire: Wire) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_notifications(wire, notify_tx));
        let task = tokio::spawn(dispatch(command_rx, notify_rx, reader));
        tracing::debug!("event task started");
        Self { commands, task }
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished() && !self.commands.is_closed()
    }

    /// Register a subscription; the receiver fires with its counts
    pub(crate) fn queue(
        &self,
        id: i32,
        names: Vec<String>,
    ) -> Result<oneshot::Receiver<EventCounts>> {
        let (sender, receiver) = oneshot::channel();
        self.commands
            .send(Command::Queue { id, names, sender })
            .map_err(|_| Error::InvalidState("event task has stopped".into()))?;
        Ok(receiver)
    }

    pub(crate) fn cancel(&self, id: i32) {
        // A stopped task has nothing left to cancel
        let _ = self.commands.send(Command::Cancel(id));
    }

    /// Stop the task and close the auxiliary connection
    pub(crate) async fn close(self) {
        let _ = self.commands.send(Command::Close);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "event task failed");
        }
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("running", &self.is_running())
            .finish()
    }
}

async fn dispatch(
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    reader: JoinHandle<()>,
) {
    let mut pending: HashMap<i32, Pending> = HashMap::new();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Queue { id, names, sender }) => {
                    pending.insert(id, Pending { names, sender });
                }
                Some(Command::Cancel(id)) => {
                    pending.remove(&id);
                    if pending.is_empty() && !drain_queued(&mut commands, &mut pending) {
                        break;
                    }
                }
                Some(Command::Close) | None => break,
            },
            notification = notifications.recv() => {
                let Some(Notification { event_id, epb }) = notification else {
                    break;
                };
                let Some(subscription) = pending.remove(&event_id) else {
                    tracing::trace!(event_id, "notification for unknown subscription");
                    continue;
                };
                match parse_epb_counts(&epb, &[]) {
                    Ok(counts) => {
                        tracing::trace!(event_id, names = ?subscription.names, "event delivered");
                        // The subscriber may have dropped its handle
                        let _ = subscription.sender.send(counts);
                    }
                    Err(e) => tracing::warn!(event_id, error = %e, "malformed event buffer"),
                }
                if pending.is_empty() && !drain_queued(&mut commands, &mut pending) {
                    break;
                }
            }
        }
    }

    reader.abort();
    tracing::debug!(pending = pending.len(), "event task stopped");
}

/// Pick up queue commands already sent; false when there were none
fn drain_queued(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    pending: &mut HashMap<i32, Pending>,
) -> bool {
    while let Ok(command) = commands.try_recv() {
        match command {
            Command::Queue { id, names, sender } => {
                pending.insert(id, Pending { names, sender });
            }
            Command::Cancel(id) => {
                pending.remove(&id);
            }
            Command::Close => {
                commands.close();
                return false;
            }
        }
    }
    if pending.is_empty() {
        commands.close();
        return false;
    }
    true
}

async fn read_notifications(mut wire: Wire, notifications: mpsc::UnboundedSender<Notification>) {
    loop {
        match read_notification(&mut wire).await {
            Ok(Some(notification)) => {
                if notifications.send(notification).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "event connection ended");
                break;
            }
        }
    }
    if let Err(e) = wire.close().await {
        tracing::warn!(error = %e, "closing event connection failed");
    }
}

/// Read until the next notification; `None` when the server hangs up
async fn read_notification(wire: &mut Wire) -> Result<Option<Notification>> {
    loop {
        let operation = wire.read_operation().await?;
        match operation {
            op::EVENT => {
                let _db_handle = wire.read_int().await?;
                let epb = wire.read_buffer().await?;
                // ast routine and argument
                wire.read_opaque(8).await?;
                let event_id = wire.read_int().await?;
                return Ok(Some(Notification { event_id, epb }));
            }
            op::EXIT | op::DISCONNECT => return Ok(None),
            other => {
                wire.read_response_for(other).await?;
            }
        }
    }
}
