use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::EngineOptions;
use crate::driver::{Connection, Driver, ExecuteResult, ReadOptions};
use crate::errors::{MocaError, Result};
use crate::executor;
use crate::lifecycle::{Borrowed, BorrowedConnection, BorrowedRawConnection, finish};
use crate::provider::ConnectionProvider;
use crate::rewrite::{QueryRewriter, split_statements};
use crate::stage::{StagedTable, stage_table};
use crate::table::{Dataset, Table};

/// Runs queries, statement batches and procedure calls against a database,
/// optionally staging a dataset as a temporary table first.
///
/// Every call runs on a borrowed connection if one is set, otherwise on a
/// connection opened for that call and closed before it returns.
#[derive(Debug)]
pub struct MocaEngine {
    provider: ConnectionProvider,
    options: EngineOptions,
}

impl MocaEngine {
    /// Create an engine with default options.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        MocaEngine {
            provider: ConnectionProvider::new(driver),
            options: EngineOptions::default(),
        }
    }

    pub fn try_new(driver: Arc<dyn Driver>, options: EngineOptions) -> Result<Self> {
        options.validate()?;
        Ok(MocaEngine {
            provider: ConnectionProvider::new(driver),
            options,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Open a standard connection for the caller to manage.
    pub async fn connect(&self) -> Result<BorrowedConnection> {
        let conn = self.provider.driver().connect().await?;
        Ok(Borrowed::new(conn))
    }

    /// Open a raw connection for the caller to manage.
    pub async fn connect_raw(&self) -> Result<BorrowedRawConnection> {
        let conn = self.provider.driver().connect_raw().await?;
        Ok(Borrowed::new(conn))
    }

    /// Use `conn` for every query and execute until it's taken back.
    ///
    /// Returns the previously set connection, if any.
    pub fn set_connection(&mut self, conn: BorrowedConnection) -> Option<BorrowedConnection> {
        self.provider.set_borrowed(Some(conn))
    }

    /// Use `conn` for every procedure call until it's taken back.
    pub fn set_raw_connection(
        &mut self,
        conn: BorrowedRawConnection,
    ) -> Option<BorrowedRawConnection> {
        self.provider.set_borrowed_raw(Some(conn))
    }

    pub fn take_connection(&mut self) -> Option<BorrowedConnection> {
        self.provider.set_borrowed(None)
    }

    pub fn take_raw_connection(&mut self) -> Option<BorrowedRawConnection> {
        self.provider.set_borrowed_raw(None)
    }

    pub fn connection(&self) -> Option<&BorrowedConnection> {
        self.provider.borrowed()
    }

    pub fn raw_connection(&self) -> Option<&BorrowedRawConnection> {
        self.provider.borrowed_raw()
    }

    /// Run a read query and return all of its rows.
    pub async fn query(&self, sql: &str) -> Result<Table> {
        self.query_inner(sql, None).await
    }

    /// Stage `tmp_table` then run a read query against it.
    ///
    /// The placeholder in `sql` is replaced with the staged table's name.
    pub async fn query_staged(&self, sql: &str, tmp_table: impl Dataset) -> Result<Table> {
        let data = into_staging_table(tmp_table)?;
        self.query_inner(sql, Some(&data)).await
    }

    /// Run one or more `;` separated statements and commit once.
    ///
    /// Returns the result of the last statement.
    pub async fn execute(&self, sql: &str) -> Result<ExecuteResult> {
        ensure_statements(sql)?;
        self.execute_inner(sql, None).await
    }

    /// Stage `tmp_table` then run one or more statements against it.
    pub async fn execute_staged(&self, sql: &str, tmp_table: impl Dataset) -> Result<ExecuteResult> {
        ensure_statements(sql)?;
        let data = into_staging_table(tmp_table)?;
        self.execute_inner(sql, Some(&data)).await
    }

    /// Call a stored procedure on a raw connection, commit, and return its
    /// first result set.
    pub async fn call(&self, procedure: &str) -> Result<Table> {
        let statement = executor::call_statement(procedure)?;
        let rewriter = QueryRewriter::new(&self.options);

        let mut conn = self.provider.resolve_raw().await?;
        let result =
            executor::run_call(&mut *conn, &statement, &rewriter, self.read_options()).await;
        finish(conn, result).await
    }

    async fn query_inner(&self, sql: &str, data: Option<&Table>) -> Result<Table> {
        let mut conn = self.provider.resolve().await?;
        let result = self.run_query(&mut *conn, sql, data).await;
        finish(conn, result).await
    }

    async fn execute_inner(&self, sql: &str, data: Option<&Table>) -> Result<ExecuteResult> {
        let mut conn = self.provider.resolve().await?;
        let borrowed = conn.is_borrowed();
        let result = self.run_batch(&mut *conn, sql, data).await;
        if result.is_err() && !borrowed {
            debug!("discarding uncommitted statements with the connection");
        }
        finish(conn, result).await
    }

    async fn run_query(
        &self,
        conn: &mut dyn Connection,
        sql: &str,
        data: Option<&Table>,
    ) -> Result<Table> {
        let staged = self.stage(conn, data).await?;
        let rewriter = QueryRewriter::new(&self.options);
        let sql = rewriter.substitute(sql, staged.as_ref());
        executor::run_query(conn, &sql, &rewriter, self.read_options()).await
    }

    async fn run_batch(
        &self,
        conn: &mut dyn Connection,
        sql: &str,
        data: Option<&Table>,
    ) -> Result<ExecuteResult> {
        let staged = self.stage(conn, data).await?;
        let rewriter = QueryRewriter::new(&self.options);
        let sql = rewriter.substitute(sql, staged.as_ref());
        executor::run_batch(conn, &sql, &rewriter).await
    }

    async fn stage(
        &self,
        conn: &mut dyn Connection,
        data: Option<&Table>,
    ) -> Result<Option<StagedTable>> {
        match data {
            Some(data) => {
                let staged = stage_table(conn, data, &self.options).await?;
                trace!(name = %staged.name(), "substituting staged table");
                Ok(Some(staged))
            }
            None => Ok(None),
        }
    }

    fn read_options(&self) -> ReadOptions {
        ReadOptions {
            coerce_float: self.options.coerce_float,
        }
    }
}

fn into_staging_table(tmp_table: impl Dataset) -> Result<Table> {
    let table = tmp_table.into_table()?;
    if table.num_columns() == 0 {
        return Err(MocaError::StagingType("dataset has no columns".to_string()));
    }
    Ok(table)
}

fn ensure_statements(sql: &str) -> Result<()> {
    if split_statements(sql).is_empty() {
        return Err(MocaError::statement(sql, "no statements to execute"));
    }
    Ok(())
}
