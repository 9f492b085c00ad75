//! Graph store gateways
//!
//! The service talks to the store only through the `GraphGateway` trait.
//! `SqliteGateway` is the embedded implementation used by the binary and
//! the tests.

mod sqlite;
mod statement;
mod traits;

pub use sqlite::SqliteGateway;
pub use statement::{BatchStats, GraphWrite, Properties, PropertyValue, Query, Row, Statement};
pub use traits::{GraphGateway, OpenGateway, StorageError, StorageResult};
