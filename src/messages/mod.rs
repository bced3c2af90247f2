//! Wire protocol messages
//!
//! Each request type encodes itself with `build_request`; server replies are
//! decoded in [`response`].

mod accept;
mod attach;
mod blob;
mod connect;
mod events;
mod execute;
mod fetch;
mod info;
mod object;
pub(crate) mod response;
mod service;
mod slice;
mod statement;
mod transaction;

pub use accept::AcceptMessage;
pub use attach::AttachMessage;
pub use blob::{BlobMessage, GetSegmentMessage, PutSegmentMessage};
pub use connect::{ConnectMessage, ProtocolOffer, SUPPORTED_PROTOCOLS};
pub use events::{CancelEventsMessage, CancelMessage, ConnectRequestMessage, QueueEventsMessage};
pub use execute::ExecuteMessage;
pub use fetch::FetchMessage;
pub use info::InfoMessage;
pub use object::ObjectMessage;
pub use response::{FetchResponse, GenericResponse, Response, SqlResponse};
pub use service::{ServiceInfoMessage, ServiceStartMessage};
pub use slice::{GetSliceMessage, PutSliceMessage};
pub use statement::{FreeMessage, PrepareMessage};
pub use transaction::{Prepare2Message, TransactionMessage};
