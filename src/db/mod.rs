//! Connection and cursor: the public entry points.

pub mod connection;
pub mod cursor;

pub use connection::Connection;
pub use cursor::Cursor;
