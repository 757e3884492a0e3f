//! Ad-hoc SQL access with ephemeral table staging.
//!
//! [`MocaEngine`] runs queries, statement batches and stored procedure calls
//! through a [`Driver`]. A caller supplied dataset can be uploaded as a
//! session-scoped temporary table and referenced in query text through a
//! placeholder.

pub mod bind;
pub mod config;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod lifecycle;
pub mod provider;
pub mod rewrite;
pub mod stage;
pub mod table;
pub mod types;

#[cfg(test)]
mod testutil;

pub use config::{ConnectionConfig, EngineOptions};
pub use driver::{Connection, Driver, ExecuteResult, RawConnection, ReadOptions, Session};
pub use engine::MocaEngine;
pub use errors::{MocaError, Result};
pub use lifecycle::{BorrowedConnection, BorrowedRawConnection};
pub use table::{Dataset, Row, Table};
pub use types::{DataType, Field, Schema, ScalarValue};
