//! MySQL transport.
//!
//! Standard sessions are checked out of a pool created on first use. Raw
//! sessions are dedicated connections outside the pool. Every session runs
//! with `autocommit = 0`.

pub mod convert;
pub mod errors;
pub mod insert;

use std::fmt;

use async_trait::async_trait;
use moca_core::bind;
use moca_core::{
    Connection, ConnectionConfig, Driver, ExecuteResult, MocaError, RawConnection, ReadOptions,
    Result, Session, Table,
};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, Pool, Row as MysqlRow, Value};
use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use errors::MysqlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionKind {
    Pooled,
    Raw,
}

pub struct MysqlDriver {
    opts: Opts,
    pool: OnceCell<Pool>,
}

impl MysqlDriver {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Self::from_url(&config.connection_url())
    }

    /// Create a driver from a `mysql://` connection string.
    pub fn from_url(url: &str) -> Result<Self> {
        let opts = Opts::from_url(url).map_err(|e| MocaError::Configuration(e.to_string()))?;
        Ok(MysqlDriver {
            opts,
            pool: OnceCell::new(),
        })
    }

    fn pool(&self) -> &Pool {
        self.pool.get_or_init(|| {
            debug!(host = %self.opts.ip_or_hostname(), "creating connection pool");
            Pool::new(self.opts.clone())
        })
    }

    /// Disconnect every pooled connection. Raw sessions are unaffected.
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(pool) = self.pool.get() {
            pool.clone()
                .disconnect()
                .await
                .map_err(MocaError::connection)?;
            debug!("disconnected connection pool");
        }
        Ok(())
    }
}

impl fmt::Debug for MysqlDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlDriver")
            .field("host", &self.opts.ip_or_hostname())
            .field("port", &self.opts.tcp_port())
            .field("database", &self.opts.db_name())
            .field("pool_initialized", &self.pool.get().is_some())
            .finish()
    }
}

async fn init_session(conn: &mut Conn) -> Result<()> {
    conn.query_drop("SET autocommit = 0")
        .await
        .map_err(MocaError::connection)
}

#[async_trait]
impl Driver for MysqlDriver {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let mut conn = self.pool().get_conn().await.map_err(MocaError::connection)?;
        init_session(&mut conn).await?;
        Ok(Box::new(MysqlSession {
            conn,
            kind: SessionKind::Pooled,
        }))
    }

    async fn connect_raw(&self) -> Result<Box<dyn RawConnection>> {
        let mut conn = Conn::new(self.opts.clone())
            .await
            .map_err(MocaError::connection)?;
        init_session(&mut conn).await?;
        Ok(Box::new(MysqlSession {
            conn,
            kind: SessionKind::Raw,
        }))
    }
}

/// A single server session.
#[derive(Debug)]
pub struct MysqlSession {
    conn: Conn,
    kind: SessionKind,
}

impl MysqlSession {
    /// Render the statement, then run it.
    async fn run(&mut self, sql: &str, opts: ReadOptions) -> Result<StatementOutput> {
        let statement = bind::render(sql).map_err(|e| MocaError::statement(sql, e))?;
        trace!(%statement, "sending statement");
        run_statement(&mut self.conn, &statement, opts)
            .await
            .map_err(|e| e.into_moca(&statement))
    }
}

struct StatementOutput {
    statement: String,
    affected_rows: u64,
    last_insert_id: Option<u64>,
    table: Option<Table>,
}

/// Run a statement over the text protocol, keeping only the first result set.
async fn run_statement(
    conn: &mut Conn,
    statement: &str,
    opts: ReadOptions,
) -> errors::Result<StatementOutput> {
    let mut result = conn.query_iter(statement).await?;
    let affected_rows = result.affected_rows();
    let last_insert_id = result.last_insert_id();

    let columns = result.columns_ref().to_vec();
    let table = if columns.is_empty() {
        None
    } else {
        let schema = convert::try_create_schema(&columns, opts)?;
        let rows: Vec<MysqlRow> = result.collect().await?;
        let rows = convert::decode_rows(rows, &schema)?;
        let table =
            Table::try_new(schema, rows).map_err(|e| MysqlError::InvalidResult(e.to_string()))?;
        Some(table)
    };

    // Drop any remaining result sets.
    result.drop_result().await?;

    Ok(StatementOutput {
        statement: statement.to_string(),
        affected_rows,
        last_insert_id,
        table,
    })
}

#[async_trait]
impl Session for MysqlSession {
    async fn commit(&mut self) -> Result<()> {
        self.conn
            .query_drop("COMMIT")
            .await
            .map_err(|e| MocaError::statement("COMMIT", e))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let MysqlSession { mut conn, kind } = *self;
        match kind {
            SessionKind::Pooled => {
                // Roll back before the connection goes back to the pool.
                conn.query_drop("ROLLBACK")
                    .await
                    .map_err(|e| MocaError::statement("ROLLBACK", e))?;
                drop(conn);
            }
            SessionKind::Raw => conn.disconnect().await.map_err(MocaError::connection)?,
        }
        debug!(?kind, "closed session");
        Ok(())
    }
}

#[async_trait]
impl Connection for MysqlSession {
    async fn query(&mut self, sql: &str, opts: ReadOptions) -> Result<Table> {
        let output = self.run(sql, opts).await?;
        Ok(output.table.unwrap_or_else(Table::empty))
    }

    async fn execute(&mut self, sql: &str) -> Result<ExecuteResult> {
        let output = self.run(sql, ReadOptions::default()).await?;
        Ok(ExecuteResult {
            statement: output.statement,
            affected_rows: output.affected_rows,
            last_insert_id: output.last_insert_id,
            output: output.table,
        })
    }

    async fn create_temporary_table(&mut self, name: &str, statement: &str) -> Result<()> {
        let statement =
            bind::render(statement).map_err(|e| MocaError::statement(statement, e))?;
        trace!(%statement, "creating temporary table");

        match self.conn.query_drop(statement.as_str()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = MysqlError::from(e);
                if err.is_table_exists() {
                    Err(MocaError::StagingCollision(name.to_string()))
                } else {
                    Err(err.into_moca(&statement))
                }
            }
        }
    }

    async fn insert_rows(&mut self, table: &str, data: &Table, batch_size: usize) -> Result<u64> {
        let chunk_size = insert::rows_per_insert(data.num_columns(), batch_size);

        let mut inserted = 0;
        for rows in data.rows().chunks(chunk_size) {
            let statement = insert::insert_statement(table, data.schema(), rows.len());
            let params: Vec<Value> = rows.iter().flatten().map(insert::to_mysql_value).collect();

            self.conn
                .exec_drop(statement.as_str(), params)
                .await
                .map_err(|e| MocaError::statement(statement.as_str(), e))?;
            inserted += self.conn.affected_rows();
            trace!(%table, num_rows = rows.len(), "inserted chunk");
        }

        Ok(inserted)
    }
}

#[async_trait]
impl RawConnection for MysqlSession {
    async fn call_procedure(&mut self, statement: &str, opts: ReadOptions) -> Result<Table> {
        let output = self.run(statement, opts).await?;
        Ok(output.table.unwrap_or_else(Table::empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_from_config() {
        let config = ConnectionConfig {
            host: "db.example.com".to_string(),
            port: Some(3307),
            username: "public".to_string(),
            password: Some("p@ss:word".to_string()),
            database: "mocadb".to_string(),
        };
        let driver = MysqlDriver::new(&config).unwrap();

        assert_eq!("db.example.com", driver.opts.ip_or_hostname());
        assert_eq!(3307, driver.opts.tcp_port());
        assert_eq!(Some("public"), driver.opts.user());
        assert_eq!(Some("p@ss:word"), driver.opts.pass());
        assert_eq!(Some("mocadb"), driver.opts.db_name());

        let debug = format!("{driver:?}");
        assert!(!debug.contains("p@ss"), "{debug}");
    }

    #[test]
    fn driver_rejects_bad_url() {
        let err = MysqlDriver::from_url("postgres://localhost/db").unwrap_err();
        assert!(matches!(err, MocaError::Configuration(_)), "{err}");
    }

    #[test]
    fn driver_rejects_invalid_config() {
        let config = ConnectionConfig {
            host: String::new(),
            ..Default::default()
        };
        let err = MysqlDriver::new(&config).unwrap_err();
        assert!(matches!(err, MocaError::Configuration(_)), "{err}");
    }
}
