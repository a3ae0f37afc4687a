//! sheet-query: SQL over spreadsheet query endpoints.
//!
//! Statements are parsed, rewritten into the restricted remote query dialect
//! and sent over HTTP. Statements the dialect cannot express run instead on
//! an in-memory SQLite copy of the source table.
//!
//! ```no_run
//! use sheet_query::connect;
//!
//! let mut conn = connect();
//! let mut cursor = conn.cursor()?;
//! cursor.execute(
//!     r#"SELECT country, SUM(cnt) FROM "https://docs.google.com/spreadsheets/d/abc/edit#gid=0" GROUP BY country"#,
//!     None,
//! )?;
//! for row in cursor.fetchall()? {
//!     println!("{:?}", row.values());
//! }
//! # Ok::<(), sheet_query::Error>(())
//! ```

pub mod config;
pub mod convert;
pub mod db;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod remote;
pub mod sql;

pub use config::Config;
pub use convert::{ColumnDescription, ResultSet, Row, Value};
pub use db::{Connection, Cursor};
pub use engine::Session;
pub use error::{Error, Result};
pub use remote::ColumnType;
pub use sql::params::{Param, Parameters};

/// Open a connection with the default configuration.
pub fn connect() -> Connection {
    Connection::default()
}
