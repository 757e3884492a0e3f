//! Transport traits implemented by database drivers.
//!
//! All statement text handed to a driver has already been rewritten and
//! escaped. Drivers must pass it through [`crate::bind::render`] exactly once
//! before sending it to the server.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::errors::Result;
use crate::table::Table;

/// Options for reading a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Read DECIMAL columns as Float64.
    ///
    /// Needed for values wider than 28 significant digits, which can't be
    /// read exactly.
    pub coerce_float: bool,
}

/// Outcome of a single executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteResult {
    /// The statement as it was sent.
    pub statement: String,
    pub affected_rows: u64,
    pub last_insert_id: Option<u64>,
    /// Rows if the statement produced a result set.
    pub output: Option<Table>,
}

/// Factory for sessions against one configured server.
#[async_trait]
pub trait Driver: Debug + Send + Sync {
    /// Open a standard session. May come from a pool.
    async fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Open a dedicated, non-pooled session able to call stored procedures.
    async fn connect_raw(&self) -> Result<Box<dyn RawConnection>>;
}

/// Behavior shared by every session kind.
#[async_trait]
pub trait Session: Debug + Send {
    async fn commit(&mut self) -> Result<()>;

    /// Release the session. Anything uncommitted is discarded.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait Connection: Session {
    /// Run a single statement, returning every row it produced.
    async fn query(&mut self, sql: &str, opts: ReadOptions) -> Result<Table>;

    /// Run a single statement.
    async fn execute(&mut self, sql: &str) -> Result<ExecuteResult>;

    /// Run a `CREATE TEMPORARY TABLE` statement for the table `name`.
    ///
    /// Errors with [`crate::errors::MocaError::StagingCollision`] if the
    /// server already has a table with that name.
    async fn create_temporary_table(&mut self, name: &str, statement: &str) -> Result<()>;

    /// Insert every row of `data` into an existing table, returning the number
    /// of rows inserted.
    ///
    /// `table` is already quoted. Rows are sent as bound values and never go
    /// through the text binder.
    async fn insert_rows(&mut self, table: &str, data: &Table, batch_size: usize) -> Result<u64>;
}

#[async_trait]
pub trait RawConnection: Session {
    /// Run a `CALL` statement, returning the procedure's first result set, or
    /// an empty table if it produced none. Later result sets are discarded.
    async fn call_procedure(&mut self, statement: &str, opts: ReadOptions) -> Result<Table>;
}
