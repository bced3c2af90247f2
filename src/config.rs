//! Connection configuration and connection string parsing
//!
//! Supports the classic Firebird connection string forms:
//! - `host/port:path`
//! - `host:path`
//! - `path` (server on localhost)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::charset::Charset;
use crate::error::{Error, Result};

/// Default Firebird port
pub const DEFAULT_PORT: u16 = 3050;

/// Default packet size used to chunk blob segments
pub const DEFAULT_PACKET_SIZE: usize = 8192;

/// Default number of rows requested per fetch round trip
pub const DEFAULT_FETCH_SIZE: usize = 200;

/// Default SQL dialect
pub const DEFAULT_DIALECT: i16 = 3;

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection configuration
///
/// # Example
///
/// ```rust
/// use firebird_rs::Config;
/// use std::time::Duration;
///
/// let config = Config::new("localhost", "/data/employee.fdb", "SYSDBA", "masterkey")
///     .connect_timeout(Duration::from_secs(30))
///     .fetch_size(500);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to connect to
    pub host: String,
    /// Port to connect to
    pub port: u16,
    /// Database path or alias on the server
    pub database: String,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    password: String,
    /// SQL role
    pub role: Option<String>,
    /// Connection character set
    pub charset: Charset,
    /// SQL dialect
    pub dialect: i16,
    /// Packet size
    pub packet_size: usize,
    /// Rows requested per fetch
    pub fetch_size: usize,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Page size for newly created databases
    pub page_size: Option<i32>,
}

impl Config {
    /// Create a new configuration
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connection character set
    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Set the SQL dialect
    pub fn dialect(mut self, dialect: i16) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the SQL role
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the number of rows fetched per round trip
    pub fn fetch_size(mut self, size: usize) -> Self {
        self.fetch_size = size.max(1);
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set packet size
    pub fn packet_size(mut self, size: usize) -> Self {
        self.packet_size = size;
        self
    }

    /// Set the page size used when creating a database
    pub fn page_size(mut self, size: i32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Get the password (for authentication)
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Set the password
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// Set the username
    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = user.into();
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: String::new(),
            user: "SYSDBA".to_string(),
            password: String::new(),
            role: None,
            charset: Charset::Utf8,
            dialect: DEFAULT_DIALECT,
            packet_size: DEFAULT_PACKET_SIZE,
            fetch_size: DEFAULT_FETCH_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            page_size: None,
        }
    }
}

/// Parse a Firebird connection string
///
/// Formats supported:
/// - `host/port:path`
/// - `host:path`
/// - `path`
///
/// A single letter before the first colon is a Windows drive, not a host.
impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() {
            return Err(Error::InvalidConnectionString(
                "empty connection string".to_string(),
            ));
        }

        let mut config = Config::default();

        let split = s.find(':').filter(|&pos| pos > 1);
        let Some(colon_pos) = split else {
            config.database = s.to_string();
            return Ok(config);
        };

        let host_port = &s[..colon_pos];
        let path = &s[colon_pos + 1..];

        if path.is_empty() {
            return Err(Error::InvalidConnectionString(
                "missing database path after :".to_string(),
            ));
        }

        if let Some(slash_pos) = host_port.find('/') {
            config.host = host_port[..slash_pos].to_string();
            config.port = host_port[slash_pos + 1..]
                .parse()
                .map_err(|_| Error::InvalidConnectionString("invalid port number".to_string()))?;
        } else {
            config.host = host_port.to_string();
        }

        if config.host.is_empty() {
            return Err(Error::InvalidConnectionString("missing host".to_string()));
        }

        config.database = path.to_string();
        Ok(config)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_port_path() {
        let config: Config = "dbhost/3051:/data/test.fdb".parse().unwrap();
        assert_eq!(config.host, "dbhost");
        assert_eq!(config.port, 3051);
        assert_eq!(config.database, "/data/test.fdb");
    }

    #[test]
    fn test_parse_default_port() {
        let config: Config = "dbhost:employee".parse().unwrap();
        assert_eq!(config.host, "dbhost");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database, "employee");
    }

    #[test]
    fn test_parse_windows_path() {
        let config: Config = "winhost:C:\\data\\test.fdb".parse().unwrap();
        assert_eq!(config.host, "winhost");
        assert_eq!(config.database, "C:\\data\\test.fdb");
    }

    #[test]
    fn test_parse_local_drive_path() {
        let config: Config = "C:\\data\\test.fdb".parse().unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.database, "C:\\data\\test.fdb");
    }

    #[test]
    fn test_parse_bare_path() {
        let config: Config = "/var/db/test.fdb".parse().unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.database, "/var/db/test.fdb");
    }

    #[test]
    fn test_parse_empty() {
        assert!("".parse::<Config>().is_err());
    }

    #[test]
    fn test_parse_invalid_port() {
        assert!("host/abc:db".parse::<Config>().is_err());
    }

    #[test]
    fn test_parse_missing_path() {
        assert!("host:".parse::<Config>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("h", "db", "u", "p");
        assert_eq!(config.port, 3050);
        assert_eq!(config.dialect, 3);
        assert_eq!(config.fetch_size, 200);
        assert_eq!(config.packet_size, 8192);
        assert_eq!(config.charset, Charset::Utf8);
        assert_eq!(config.password(), "p");
    }

    #[test]
    fn test_display() {
        let config = Config::new("h", "db", "u", "p").port(3051);
        assert_eq!(config.to_string(), "h/3051:db");
    }

    #[test]
    fn test_fetch_size_never_zero() {
        let config = Config::default().fetch_size(0);
        assert_eq!(config.fetch_size, 1);
    }
}
