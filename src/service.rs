//! Service manager: backup, restore, user administration and statistics
//!
//! The service manager is a separate attachment to `service_mgr`. Actions
//! are started with a service parameter buffer and their text output is
//! pulled line by line with `isc_info_svc_line` queries.
//!
//! # Example
//!
//! ```rust,no_run
//! use firebird_rs::{BackupOptions, Config, ServiceManager};
//!
//! # async fn example() -> firebird_rs::Result<()> {
//! let config = Config::new("localhost", "", "SYSDBA", "masterkey");
//! let mut svc = ServiceManager::attach(config).await?;
//! println!("{}", svc.server_version().await?);
//!
//! for line in svc.backup("/data/app.fdb", "/backup/app.fbk", &BackupOptions::default()).await? {
//!     println!("{}", line);
//! }
//! svc.detach().await?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::buffer::ReadBuffer;
use crate::config::Config;
use crate::constants::{info, op, spb, svc_info};
use crate::database::handshake;
use crate::error::{Error, Result};
use crate::messages::{AttachMessage, ObjectMessage, ServiceInfoMessage, ServiceStartMessage};
use crate::params::ParameterBuffer;
use crate::transport::{StreamTransport, TcpTransport, Transport};
use crate::wire::Wire;

/// Name of the service manager attachment
pub const SERVICE_MANAGER: &str = "service_mgr";

/// Reply buffer length for service queries
const SERVICE_QUERY_BUFFER_SIZE: i32 = 65535;

/// Options for [`ServiceManager::backup`]
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// `spb::BKP_*` flags
    pub flags: i32,
    /// Report progress lines
    pub verbose: bool,
}

/// Options for [`ServiceManager::restore`]
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// `spb::RES_*` flags
    pub flags: i32,
    /// Page size of the restored database
    pub page_size: Option<i32>,
    /// Page buffers of the restored database
    pub page_buffers: Option<i32>,
    /// Report progress lines
    pub verbose: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            flags: spb::RES_CREATE,
            page_size: None,
            page_buffers: None,
            verbose: false,
        }
    }
}

/// Database properties changed by [`ServiceManager::set_properties`]
#[derive(Debug, Clone, Default)]
pub struct DatabaseProperties {
    /// Sweep interval in transactions, 0 disables automatic sweep
    pub sweep_interval: Option<i32>,
    /// SQL dialect
    pub dialect: Option<i32>,
    /// Number of cache pages
    pub page_buffers: Option<i32>,
}

/// A security database entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserData {
    /// Login name
    pub user_name: String,
    /// Password; only sent when adding a user
    pub password: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Middle name
    pub middle_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Unix user id
    pub user_id: Option<i32>,
    /// Unix group id
    pub group_id: Option<i32>,
}

impl UserData {
    /// Create an entry with a name and password
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: Some(password.into()),
            ..Default::default()
        }
    }
}

/// An attachment to the service manager
pub struct ServiceManager {
    wire: Wire,
    handle: Option<i32>,
}

impl ServiceManager {
    /// Attach to the service manager of `config.host` over TCP
    ///
    /// `config.database` is ignored.
    pub async fn attach(config: Config) -> Result<Self> {
        let mut transport = TcpTransport::new();
        transport.connect_with_config(&config).await?;
        Self::open(Box::new(transport), &config).await
    }

    /// Attach over an already connected byte stream
    pub async fn attach_stream<S>(stream: S, config: Config) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Self::open(Box::new(StreamTransport::new(stream)), &config).await
    }

    async fn open(transport: Box<dyn Transport>, config: &Config) -> Result<Self> {
        let mut wire = Wire::new(transport, config.charset);
        let result = async {
            handshake(&mut wire, SERVICE_MANAGER).await?;
            let spb = attach_spb(config)?;
            let request = AttachMessage::service(SERVICE_MANAGER, spb).build_request()?;
            wire.send(request).await?;
            wire.read_generic_response().await
        }
        .await;

        match result {
            Ok(response) => {
                tracing::debug!(
                    handle = response.object_handle,
                    host = %config.host,
                    "attached to service manager"
                );
                Ok(Self {
                    wire,
                    handle: Some(response.object_handle),
                })
            }
            Err(e) => {
                if let Err(close_err) = wire.close().await {
                    tracing::warn!(error = %close_err, "closing service connection failed");
                }
                Err(e)
            }
        }
    }

    /// Service handle; fails once detached
    pub fn handle(&self) -> Result<i32> {
        self.handle.ok_or(Error::ConnectionClosed)
    }

    /// Start the action described by `spb`
    pub async fn start(&mut self, spb: Bytes) -> Result<()> {
        let handle = self.handle()?;
        let action = spb.first().copied().unwrap_or(0);
        let request = ServiceStartMessage::new(handle, spb).build_request()?;
        self.wire.send(request).await?;
        self.wire.read_generic_response().await?;
        tracing::debug!(handle, action, "service started");
        Ok(())
    }

    /// Query the service; returns the raw reply buffer
    pub async fn query(
        &mut self,
        items: &[u8],
        request: &[u8],
        buffer_length: i32,
    ) -> Result<Bytes> {
        let handle = self.handle()?;
        let message = ServiceInfoMessage::new(handle, items, request, buffer_length);
        self.wire.send(message.build_request()?).await?;
        Ok(self.wire.read_generic_response().await?.data)
    }

    /// Collect the output of the running action, one entry per line
    pub async fn output_lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let reply = self
                .query(&[], &[svc_info::LINE], SERVICE_QUERY_BUFFER_SIZE)
                .await?;
            let (items, _) = parse_service_reply(&reply)?;
            let line = items
                .into_iter()
                .find(|(item, _)| *item == svc_info::LINE)
                .map(|(_, data)| data)
                .unwrap_or_default();
            if line.is_empty() {
                return Ok(lines);
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
    }

    async fn query_text(&mut self, item: u8) -> Result<String> {
        let reply = self.query(&[], &[item], SERVICE_QUERY_BUFFER_SIZE).await?;
        let (items, _) = parse_service_reply(&reply)?;
        items
            .into_iter()
            .find(|(i, _)| *i == item)
            .map(|(_, data)| String::from_utf8_lossy(&data).into_owned())
            .ok_or_else(|| Error::Protocol(format!("service did not return info item {}", item)))
    }

    /// Server version string
    pub async fn server_version(&mut self) -> Result<String> {
        self.query_text(svc_info::SERVER_VERSION).await
    }

    /// Server implementation string
    pub async fn implementation(&mut self) -> Result<String> {
        self.query_text(svc_info::IMPLEMENTATION).await
    }

    /// Back up `database` into `file`; returns the service output
    pub async fn backup(
        &mut self,
        database: &str,
        file: &str,
        options: &BackupOptions,
    ) -> Result<Vec<String>> {
        self.start(backup_spb(database, file, options)?).await?;
        self.output_lines().await
    }

    /// Restore `file` into `database`; returns the service output
    pub async fn restore(
        &mut self,
        file: &str,
        database: &str,
        options: &RestoreOptions,
    ) -> Result<Vec<String>> {
        self.start(restore_spb(file, database, options)?).await?;
        self.output_lines().await
    }

    /// Add a user to the security database
    pub async fn add_user(&mut self, user: &UserData) -> Result<()> {
        self.start(add_user_spb(user)?).await?;
        self.output_lines().await.map(|_| ())
    }

    /// Remove a user from the security database
    pub async fn delete_user(&mut self, user_name: &str) -> Result<()> {
        let mut buf = ParameterBuffer::new();
        buf.append_tag(spb::ACTION_DELETE_USER);
        buf.append_string_le16(spb::SEC_USERNAME, user_name)?;
        self.start(buf.into_bytes()).await?;
        self.output_lines().await.map(|_| ())
    }

    /// List the users of the security database
    pub async fn display_users(&mut self) -> Result<Vec<UserData>> {
        let mut buf = ParameterBuffer::new();
        buf.append_tag(spb::ACTION_DISPLAY_USER);
        self.start(buf.into_bytes()).await?;

        let mut data = Vec::new();
        loop {
            let reply = self
                .query(&[], &[svc_info::GET_USERS], SERVICE_QUERY_BUFFER_SIZE)
                .await?;
            let (items, truncated) = parse_service_reply(&reply)?;
            let mut received = false;
            for (item, block) in items {
                if item == svc_info::GET_USERS && !block.is_empty() {
                    data.extend_from_slice(&block);
                    received = true;
                }
            }
            if !truncated || !received {
                break;
            }
        }
        parse_user_data(&data)
    }

    /// Change database properties
    pub async fn set_properties(
        &mut self,
        database: &str,
        properties: &DatabaseProperties,
    ) -> Result<()> {
        self.start(properties_spb(database, properties)?).await?;
        self.output_lines().await.map(|_| ())
    }

    /// Gather database statistics; `options` are `spb::STS_*` flags
    pub async fn database_stats(&mut self, database: &str, options: i32) -> Result<Vec<String>> {
        let mut buf = ParameterBuffer::new();
        buf.append_tag(spb::ACTION_DB_STATS);
        buf.append_string_le16(spb::DBNAME, database)?;
        buf.append_tag_i32(spb::OPTIONS, options);
        self.start(buf.into_bytes()).await?;
        self.output_lines().await
    }

    /// Detach from the service manager and close the connection
    pub async fn detach(&mut self) -> Result<()> {
        let handle = self.handle()?;
        let request = ObjectMessage::new(op::SERVICE_DETACH, handle).build_request()?;
        self.wire.send(request).await?;
        let result = self.wire.read_generic_response().await;

        if let Ok(request) = ObjectMessage::bare(op::DISCONNECT).build_request() {
            if let Err(e) = self.wire.send(request).await {
                tracing::warn!(error = %e, "disconnect request failed");
            }
        }
        if let Err(e) = self.wire.close().await {
            tracing::warn!(error = %e, "closing service connection failed");
        }
        self.handle = None;
        tracing::debug!(handle, "detached from service manager");
        result.map(|_| ())
    }
}

impl Drop for ServiceManager {
    fn drop(&mut self) {
        // Can't detach asynchronously here; call detach() explicitly
        if let Some(handle) = self.handle {
            tracing::trace!(handle, "service manager dropped while attached");
        }
    }
}

impl std::fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceManager")
            .field("handle", &self.handle)
            .field("wire", &self.wire)
            .finish()
    }
}

// =============================================================================
// Parameter buffers
// =============================================================================

fn attach_spb(config: &Config) -> Result<Bytes> {
    let mut buf = ParameterBuffer::with_version(spb::VERSION2);
    buf.append_tag(spb::CURRENT_VERSION);
    buf.append_string(spb::USER_NAME, &config.user)?;
    buf.append_string(spb::PASSWORD, config.password())?;
    Ok(buf.into_bytes())
}

fn backup_spb(database: &str, file: &str, options: &BackupOptions) -> Result<Bytes> {
    let mut buf = ParameterBuffer::new();
    buf.append_tag(spb::ACTION_BACKUP);
    buf.append_string_le16(spb::DBNAME, database)?;
    buf.append_string_le16(spb::BKP_FILE, file)?;
    if options.verbose {
        buf.append_tag(spb::VERBOSE);
    }
    buf.append_tag_i32(spb::OPTIONS, options.flags);
    Ok(buf.into_bytes())
}

fn restore_spb(file: &str, database: &str, options: &RestoreOptions) -> Result<Bytes> {
    let mut buf = ParameterBuffer::new();
    buf.append_tag(spb::ACTION_RESTORE);
    buf.append_string_le16(spb::BKP_FILE, file)?;
    buf.append_string_le16(spb::DBNAME, database)?;
    if options.verbose {
        buf.append_tag(spb::VERBOSE);
    }
    if let Some(buffers) = options.page_buffers {
        buf.append_tag_i32(spb::RES_BUFFERS, buffers);
    }
    if let Some(page_size) = options.page_size {
        buf.append_tag_i32(spb::RES_PAGE_SIZE, page_size);
    }
    buf.append_tag_i32(spb::OPTIONS, options.flags);
    Ok(buf.into_bytes())
}

fn add_user_spb(user: &UserData) -> Result<Bytes> {
    let mut buf = ParameterBuffer::new();
    buf.append_tag(spb::ACTION_ADD_USER);
    buf.append_string_le16(spb::SEC_USERNAME, &user.user_name)?;
    if let Some(password) = &user.password {
        buf.append_string_le16(spb::SEC_PASSWORD, password)?;
    }
    if let Some(name) = &user.first_name {
        buf.append_string_le16(spb::SEC_FIRSTNAME, name)?;
    }
    if let Some(name) = &user.middle_name {
        buf.append_string_le16(spb::SEC_MIDDLENAME, name)?;
    }
    if let Some(name) = &user.last_name {
        buf.append_string_le16(spb::SEC_LASTNAME, name)?;
    }
    if let Some(id) = user.user_id {
        buf.append_tag_i32(spb::SEC_USERID, id);
    }
    if let Some(id) = user.group_id {
        buf.append_tag_i32(spb::SEC_GROUPID, id);
    }
    Ok(buf.into_bytes())
}

fn properties_spb(database: &str, properties: &DatabaseProperties) -> Result<Bytes> {
    let mut buf = ParameterBuffer::new();
    buf.append_tag(spb::ACTION_PROPERTIES);
    buf.append_string_le16(spb::DBNAME, database)?;
    if let Some(interval) = properties.sweep_interval {
        buf.append_tag_i32(spb::PRP_SWEEP_INTERVAL, interval);
    }
    if let Some(dialect) = properties.dialect {
        buf.append_tag_i32(spb::PRP_SET_SQL_DIALECT, dialect);
    }
    if let Some(buffers) = properties.page_buffers {
        buf.append_tag_i32(spb::PRP_PAGE_BUFFERS, buffers);
    }
    Ok(buf.into_bytes())
}

// =============================================================================
// Replies
// =============================================================================

/// Split a service reply into items; the flag is set when it was truncated
fn parse_service_reply(reply: &[u8]) -> Result<(Vec<(u8, Bytes)>, bool)> {
    let mut r = ReadBuffer::from_slice(reply);
    let mut items = Vec::new();
    while r.remaining() > 0 {
        match r.read_u8()? {
            info::END => break,
            info::TRUNCATED => return Ok((items, true)),
            info::ERROR => return Err(Error::Protocol("service query failed".into())),
            svc_info::TIMEOUT | info::DATA_NOT_READY => {}
            item => {
                let len = r.read_u16_le()? as usize;
                items.push((item, r.read_bytes(len)?));
            }
        }
    }
    Ok((items, false))
}

fn parse_user_data(data: &[u8]) -> Result<Vec<UserData>> {
    let mut r = ReadBuffer::from_slice(data);
    let mut users: Vec<UserData> = Vec::new();

    let text = |r: &mut ReadBuffer| -> Result<String> {
        let len = r.read_u16_le()? as usize;
        Ok(String::from_utf8_lossy(&r.read_bytes(len)?).into_owned())
    };

    while r.remaining() > 0 {
        let tag = r.read_u8()?;
        if tag == info::END {
            break;
        }
        if tag == spb::SEC_USERNAME {
            users.push(UserData {
                user_name: text(&mut r)?,
                ..Default::default()
            });
            continue;
        }
        let user = users
            .last_mut()
            .ok_or_else(|| Error::Protocol("user attribute before user name".into()))?;
        match tag {
            spb::SEC_FIRSTNAME => user.first_name = Some(text(&mut r)?),
            spb::SEC_MIDDLENAME => user.middle_name = Some(text(&mut r)?),
            spb::SEC_LASTNAME => user.last_name = Some(text(&mut r)?),
            spb::SEC_USERID => user.user_id = Some(r.read_vax_i32(4)?),
            spb::SEC_GROUPID => user.group_id = Some(r.read_vax_i32(4)?),
            other => {
                return Err(Error::Protocol(format!("unknown user attribute {}", other)));
            }
        }
    }
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_spb() {
        let config = Config::new("localhost", "", "SYSDBA", "pw");
        let bytes = attach_spb(&config).unwrap();
        assert_eq!(
            &bytes[..],
            &[2, 2, 28, 6, b'S', b'Y', b'S', b'D', b'B', b'A', 29, 2, b'p', b'w']
        );
    }

    #[test]
    fn test_backup_spb() {
        let options = BackupOptions {
            flags: spb::BKP_METADATA_ONLY,
            verbose: true,
        };
        let bytes = backup_spb("a", "b", &options).unwrap();
        assert_eq!(
            &bytes[..],
            &[
                spb::ACTION_BACKUP,
                spb::DBNAME,
                1,
                0,
                b'a',
                spb::BKP_FILE,
                1,
                0,
                b'b',
                spb::VERBOSE,
                spb::OPTIONS,
                4,
                0,
                0,
                0
            ]
        );
    }

    #[test]
    fn test_restore_spb_defaults_to_create() {
        let bytes = restore_spb("b", "a", &RestoreOptions::default()).unwrap();
        assert_eq!(bytes[0], spb::ACTION_RESTORE);
        assert_eq!(&bytes[1..5], &[spb::BKP_FILE, 1, 0, b'b']);
        assert_eq!(&bytes[bytes.len() - 5..], &[spb::OPTIONS, 0, 0x20, 0, 0]);
    }

    #[test]
    fn test_properties_spb() {
        let properties = DatabaseProperties {
            sweep_interval: Some(0),
            dialect: None,
            page_buffers: Some(2048),
        };
        let bytes = properties_spb("a", &properties).unwrap();
        assert_eq!(
            &bytes[..],
            &[
                spb::ACTION_PROPERTIES,
                spb::DBNAME,
                1,
                0,
                b'a',
                spb::PRP_SWEEP_INTERVAL,
                0,
                0,
                0,
                0,
                spb::PRP_PAGE_BUFFERS,
                0,
                8,
                0,
                0
            ]
        );
    }

    #[test]
    fn test_parse_service_reply() {
        let reply = [svc_info::LINE, 2, 0, b'o', b'k', info::END];
        let (items, truncated) = parse_service_reply(&reply).unwrap();
        assert!(!truncated);
        assert_eq!(items, vec![(svc_info::LINE, Bytes::from_static(b"ok"))]);

        let (_, truncated) = parse_service_reply(&[info::TRUNCATED]).unwrap();
        assert!(truncated);
    }

    #[test]
    fn test_parse_user_data() {
        let data = [
            spb::SEC_USERNAME, 3, 0, b'B', b'O', b'B',
            spb::SEC_FIRSTNAME, 1, 0, b'R',
            spb::SEC_USERID, 7, 0, 0, 0,
            spb::SEC_USERNAME, 2, 0, b'A', b'L',
            info::END,
        ];
        let users = parse_user_data(&data).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].user_name, "BOB");
        assert_eq!(users[0].first_name.as_deref(), Some("R"));
        assert_eq!(users[0].user_id, Some(7));
        assert_eq!(users[1].user_name, "AL");
        assert_eq!(users[1].password, None);
    }
}
