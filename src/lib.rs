#![warn(missing_docs)]

//! # firebird-rs
//!
//! A pure Rust client for Firebird databases speaking the remote wire
//! protocol directly. No fbclient library is needed.
//!
//! ## Features
//!
//! - **Pure Rust** - Talks the Firebird wire protocol (versions 10 to 12)
//! - **Async/await** - Built on Tokio
//! - **Typed values** - Integers, NUMERIC/DECIMAL via `rust_decimal`, dates via `chrono`
//! - **Blobs and arrays** - Segmented blob streams and whole-array slices
//! - **Events** - Database event notifications on a background task
//! - **Services** - Backup, restore, user administration and statistics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use firebird_rs::{Config, Database, TransactionOptions};
//!
//! #[tokio::main]
//! async fn main() -> firebird_rs::Result<()> {
//!     let config = Config::new("localhost", "/data/employee.fdb", "SYSDBA", "masterkey");
//!     let db = Database::connect(config).await?;
//!
//!     let mut tx = db.begin_transaction(TransactionOptions::default()).await?;
//!     let mut stmt = db.create_statement(&tx);
//!     stmt.prepare("SELECT emp_no, first_name FROM employee").await?;
//!     stmt.execute(&[]).await?;
//!
//!     while let Some(row) = stmt.fetch().await? {
//!         let id = row.get_i64(0).unwrap_or(0);
//!         let name = row.get_string(1).unwrap_or("");
//!         println!("Employee {}: {}", id, name);
//!     }
//!
//!     tx.commit().await?;
//!     db.detach().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection Strings
//!
//! [`Config`] parses `host/port:path`, `host:path` and a bare path:
//!
//! ```rust
//! use firebird_rs::Config;
//!
//! let mut config: Config = "db.example.com/3051:/data/app.fdb".parse().unwrap();
//! config.set_user("SYSDBA");
//! config.set_password("masterkey");
//! assert_eq!(config.port, 3051);
//! ```
//!
//! ## Transactions
//!
//! ```rust,no_run
//! use firebird_rs::{Database, IsolationLevel, TransactionOptions, Value};
//!
//! # async fn example(db: Database) -> firebird_rs::Result<()> {
//! let options = TransactionOptions::new()
//!     .isolation(IsolationLevel::ReadCommitted { rec_version: true })
//!     .lock_timeout(5);
//! let mut tx = db.begin_transaction(options).await?;
//!
//! let mut stmt = db.create_statement(&tx);
//! stmt.prepare("UPDATE accounts SET balance = balance - ? WHERE id = ?").await?;
//! stmt.execute(&[Value::from(50), Value::from(1)]).await?;
//! println!("Rows updated: {}", stmt.records_affected());
//!
//! // Keep the transaction context open; `stmt` stays usable
//! tx.commit_retaining().await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Data Types
//!
//! | Firebird Type | Value variant |
//! |---------------|---------------|
//! | SMALLINT, INTEGER, BIGINT | `SmallInt`, `Integer`, `BigInt` |
//! | NUMERIC, DECIMAL | `Decimal` (`rust_decimal::Decimal`) |
//! | FLOAT, DOUBLE PRECISION | `Float`, `Double` |
//! | CHAR, VARCHAR | `String` (`Bytes` for OCTETS) |
//! | DATE, TIME, TIMESTAMP | `Date`, `Time`, `Timestamp` (`chrono`) |
//! | BOOLEAN | `Boolean` |
//! | BLOB | `Blob` id, read with [`Blob`] |
//! | ARRAY | `Array` id, read with [`ArrayHandle`] |
//!
//! ## Minimum Firebird Version
//!
//! Firebird 2.5 or later. Firebird 3+ servers must allow `Legacy_Auth`
//! with wire encryption disabled or optional.

pub mod array;
pub mod blob;
pub mod buffer;
pub mod charset;
pub mod config;
pub mod constants;
pub mod database;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod info;
pub mod messages;
pub mod params;
pub mod row;
pub mod service;
pub mod statement;
pub mod transaction;
pub mod transport;
pub mod types;
pub(crate) mod wire;

// Re-export commonly used types
pub use array::{ArrayBound, ArrayDesc, ArrayHandle, ArraySlice};
pub use blob::Blob;
pub use charset::Charset;
pub use config::Config;
pub use database::{CancelKind, Database};
pub use descriptor::{Descriptor, Field};
pub use error::{Error, IscError, IscStatus, Result};
pub use events::{EventCounts, EventSubscription};
pub use info::{InfoItem, InfoValue};
pub use row::{Row, Value};
pub use service::{BackupOptions, DatabaseProperties, RestoreOptions, ServiceManager, UserData};
pub use statement::{FreeOption, Statement, StatementState, StatementType};
pub use transaction::{IsolationLevel, Transaction, TransactionOptions, TransactionState};
pub use wire::WarningHandler;
