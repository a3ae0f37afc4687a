//! Remote data source: HTTP transport, payload decoding, query execution and
//! the column probe.

pub mod column_map;
pub mod executor;
pub mod payload;
pub mod transport;

pub use column_map::ColumnMap;
pub use executor::Executor;
pub use payload::{Cell, Column, ColumnType, Payload, Status, Table, TableRow};
pub use transport::{Authorizer, BearerToken, HttpResponse, Transport, UreqTransport};
