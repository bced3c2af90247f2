//! Segmented blob streams
//!
//! A [`Blob`] is opened (or created) inside a transaction and read or
//! written in segments. Segment replies may pack several pieces, each
//! prefixed with a two-byte little-endian length.

use bytes::Bytes;

use crate::buffer::ReadBuffer;
use crate::charset::Charset;
use crate::constants::{blob_info, blob_status, info, op, DEFAULT_MAX_BUFFER_SIZE, MAX_SEGMENT_SIZE};
use crate::database::{Session, SharedSession};
use crate::error::{Error, Result};
use crate::messages::{
    BlobMessage, GetSegmentMessage, InfoMessage, ObjectMessage, PutSegmentMessage,
};
use crate::transaction::Transaction;

/// An open blob
///
/// # Example
///
/// ```rust,no_run
/// use firebird_rs::{Database, TransactionOptions};
///
/// # async fn example(db: Database) -> firebird_rs::Result<()> {
/// let mut tx = db.begin_transaction(TransactionOptions::default()).await?;
///
/// let mut blob = db.create_blob(&tx).await?;
/// blob.write_string("hello").await?;
/// let id = blob.id();
///
/// let mut blob = db.open_blob(&tx, id).await?;
/// assert_eq!(blob.read_string().await?, "hello");
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct Blob {
    session: SharedSession,
    handle: Option<i32>,
    id: i64,
    eof: bool,
    segment_size: usize,
    charset: Charset,
}

impl Blob {
    pub(crate) async fn create(
        session: SharedSession,
        transaction: &Transaction,
        bpb: Option<Bytes>,
    ) -> Result<Self> {
        let mut message = BlobMessage::create(transaction_handle(transaction)?);
        if let Some(bpb) = bpb {
            message = message.with_bpb(bpb);
        }
        Self::start(session, message, None).await
    }

    pub(crate) async fn open(
        session: SharedSession,
        transaction: &Transaction,
        id: i64,
    ) -> Result<Self> {
        let message = BlobMessage::open(transaction_handle(transaction)?, id);
        Self::start(session, message, Some(id)).await
    }

    async fn start(session: SharedSession, message: BlobMessage, id: Option<i64>) -> Result<Self> {
        let mut guard = session.lock().await;
        guard.handle()?;
        let response = guard.exchange(message.build_request()?).await?;
        let segment_size = guard.packet_size.clamp(1, MAX_SEGMENT_SIZE);
        let charset = guard.charset();
        drop(guard);

        let id = id.unwrap_or(response.blob_id);
        tracing::trace!(handle = response.object_handle, id, "blob opened");
        Ok(Self {
            session,
            handle: Some(response.object_handle),
            id,
            eof: false,
            segment_size,
            charset,
        })
    }

    /// Blob id; store it in a blob column to reference the contents
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Server handle while the blob is open
    pub fn handle(&self) -> Option<i32> {
        self.handle
    }

    /// Whether the last segment has been read
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    fn require_open(&self) -> Result<i32> {
        self.handle
            .ok_or_else(|| Error::InvalidState("blob is closed".into()))
    }

    /// Read the next segment of at most `size` bytes
    ///
    /// Returns an empty vector once the end of the blob has been reached.
    pub async fn get_segment(&mut self, size: usize) -> Result<Vec<u8>> {
        let handle = self.require_open()?;
        if self.eof {
            return Ok(Vec::new());
        }

        let mut session = self.session.lock().await;
        let request = GetSegmentMessage::new(handle, size).build_request()?;
        let response = session.exchange(request).await?;
        drop(session);

        if response.object_handle == blob_status::EOF {
            self.eof = true;
        }
        parse_segments(&response.data)
    }

    /// Write one segment
    pub async fn put_segment(&mut self, data: &[u8]) -> Result<()> {
        let handle = self.require_open()?;
        if data.len() > MAX_SEGMENT_SIZE {
            return Err(Error::DataConversion(format!(
                "segment of {} bytes exceeds the limit of {}",
                data.len(),
                MAX_SEGMENT_SIZE
            )));
        }
        let mut session = self.session.lock().await;
        let request = PutSegmentMessage::new(handle, data).build_request()?;
        session.exchange(request).await?;
        Ok(())
    }

    /// Read the rest of the blob and close it
    ///
    /// On failure the blob is cancelled.
    pub async fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let result = async {
            while !self.eof {
                let segment = self.get_segment(self.segment_size).await?;
                data.extend_from_slice(&segment);
            }
            self.close().await
        }
        .await;

        match result {
            Ok(()) => Ok(data),
            Err(e) => {
                self.cancel_quietly().await;
                Err(e)
            }
        }
    }

    /// Write `data` in segments and close the blob
    ///
    /// On failure the blob is cancelled.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let result = async {
            for chunk in data.chunks(self.segment_size) {
                self.put_segment(chunk).await?;
            }
            self.close().await
        }
        .await;

        if result.is_err() {
            self.cancel_quietly().await;
        }
        result
    }

    /// Read the rest of the blob as text in the connection character set
    pub async fn read_string(&mut self) -> Result<String> {
        let data = self.read_all().await?;
        self.charset.decode(&data)
    }

    /// Write text in the connection character set and close the blob
    pub async fn write_string(&mut self, text: &str) -> Result<()> {
        let data = self.charset.encode(text)?;
        self.write_all(&data).await
    }

    /// Total length in bytes as reported by the server
    pub async fn length(&mut self) -> Result<i64> {
        let reply = self.info(&[blob_info::TOTAL_LENGTH]).await?;
        let mut r = ReadBuffer::from_slice(&reply);
        while r.remaining() > 0 {
            let item = r.read_u8()?;
            if item == info::END {
                break;
            }
            let len = r.read_u16_le()? as usize;
            if item == blob_info::TOTAL_LENGTH {
                return r.read_vax_i64(len);
            }
            r.skip(len)?;
        }
        Err(Error::Protocol("server did not report the blob length".into()))
    }

    /// Query blob information items; returns the raw reply buffer
    pub async fn info(&mut self, items: &[u8]) -> Result<Bytes> {
        let handle = self.require_open()?;
        let mut session = self.session.lock().await;
        let request = InfoMessage::blob(handle, items, DEFAULT_MAX_BUFFER_SIZE).build_request()?;
        Ok(session.exchange(request).await?.data)
    }

    /// Blobs are sequential streams
    pub async fn seek(&mut self, _offset: i64) -> Result<i64> {
        Err(Error::FeatureNotSupported("blob seek".into()))
    }

    /// Close the blob, keeping what was written
    pub async fn close(&mut self) -> Result<()> {
        self.finish(op::CLOSE_BLOB).await
    }

    /// Close the blob, discarding what was written
    pub async fn cancel(&mut self) -> Result<()> {
        self.finish(op::CANCEL_BLOB).await
    }

    async fn finish(&mut self, operation: i32) -> Result<()> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        let mut session = self.session.lock().await;
        release(&mut session, operation, handle).await?;
        self.handle = None;
        tracing::trace!(handle, id = self.id, operation, "blob released");
        Ok(())
    }

    async fn cancel_quietly(&mut self) {
        if let Err(e) = self.cancel().await {
            tracing::warn!(id = self.id, error = %e, "cancelling blob failed");
        }
        self.handle = None;
    }
}

async fn release(session: &mut Session, operation: i32, handle: i32) -> Result<()> {
    let request = ObjectMessage::new(operation, handle).build_request()?;
    session.exchange(request).await.map(|_| ())
}

fn transaction_handle(transaction: &Transaction) -> Result<i32> {
    transaction
        .handle()
        .ok_or_else(|| Error::InvalidState("transaction is not active".into()))
}

/// Join the length-prefixed pieces of a segment reply
fn parse_segments(data: &[u8]) -> Result<Vec<u8>> {
    let mut r = ReadBuffer::from_slice(data);
    let mut out = Vec::with_capacity(data.len());
    while r.remaining() >= 2 {
        let len = r.read_u16_le()? as usize;
        out.extend_from_slice(&r.read_bytes(len)?);
    }
    Ok(out)
}

impl Drop for Blob {
    fn drop(&mut self) {
        // Can't close asynchronously here; the server releases it with the transaction
        if let Some(handle) = self.handle {
            tracing::trace!(handle, id = self.id, "blob dropped while open");
        }
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("eof", &self.eof)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments_joins_pieces() {
        let data = [3, 0, b'a', b'b', b'c', 2, 0, b'd', b'e'];
        assert_eq!(parse_segments(&data).unwrap(), b"abcde");
    }

    #[test]
    fn test_parse_segments_empty() {
        assert!(parse_segments(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_segments_short_piece() {
        assert!(parse_segments(&[5, 0, b'a']).is_err());
    }
}
