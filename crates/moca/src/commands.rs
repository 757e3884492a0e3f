use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use clap::{Args, Subcommand};
use moca_core::{EngineOptions, MocaEngine};
use moca_mysql::MysqlDriver;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

use crate::args::{ConnectionArgs, OutputMode, SqlArgs};
use crate::format::write_table;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a read query and print its rows.
    Query(QueryArgs),
    /// Run one or more `;` separated statements and commit.
    Execute(ExecuteArgs),
    /// Call a stored procedure and print its first result set.
    Call(CallArgs),
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[clap(flatten)]
    pub sql: SqlArgs,

    /// Display output mode.
    #[clap(long, value_enum, default_value_t = OutputMode::Table)]
    pub mode: OutputMode,
}

#[derive(Debug, Clone, Args)]
pub struct ExecuteArgs {
    #[clap(flatten)]
    pub sql: SqlArgs,

    /// Display output mode for statements that return rows.
    #[clap(long, value_enum, default_value_t = OutputMode::Table)]
    pub mode: OutputMode,
}

#[derive(Debug, Clone, Args)]
pub struct CallArgs {
    /// Procedure name, optionally qualified with a database.
    pub procedure: String,

    /// Display output mode.
    #[clap(long, value_enum, default_value_t = OutputMode::Table)]
    pub mode: OutputMode,
}

/// Everything a command needs to reach the database.
#[derive(Debug, Clone)]
pub struct Context {
    pub connection: ConnectionArgs,
    pub options: EngineOptions,
}

impl Commands {
    pub fn run(self, ctx: Context) -> Result<()> {
        match self {
            Commands::Query(args) => args.run(ctx),
            Commands::Execute(args) => args.run(ctx),
            Commands::Call(args) => args.run(ctx),
        }
    }
}

trait RunCommand {
    fn run(self, ctx: Context) -> Result<()>;
}

impl RunCommand for QueryArgs {
    fn run(self, ctx: Context) -> Result<()> {
        // Read all input before connecting so bad input fails fast.
        let sql = self.sql.read_sql()?;
        let tmp_table = self.sql.read_tmp_table()?;

        let runtime = build_runtime("query")?;
        runtime.block_on(async move {
            let (driver, engine) = connect(ctx)?;
            let result = match tmp_table {
                Some(tmp_table) => engine.query_staged(&sql, tmp_table).await,
                None => engine.query(&sql).await,
            };
            let disconnected = driver.disconnect().await;

            let table = result?;
            disconnected?;
            info!(num_rows = table.num_rows(), "query complete");
            write_table(&mut io::stdout().lock(), &table, self.mode)
        })
    }
}

impl RunCommand for ExecuteArgs {
    fn run(self, ctx: Context) -> Result<()> {
        let sql = self.sql.read_sql()?;
        let tmp_table = self.sql.read_tmp_table()?;

        let runtime = build_runtime("execute")?;
        runtime.block_on(async move {
            let (driver, engine) = connect(ctx)?;
            let result = match tmp_table {
                Some(tmp_table) => engine.execute_staged(&sql, tmp_table).await,
                None => engine.execute(&sql).await,
            };
            let disconnected = driver.disconnect().await;

            let result = result?;
            disconnected?;
            let mut stdout = io::stdout().lock();
            match &result.output {
                Some(table) => write_table(&mut stdout, table, self.mode)?,
                None => writeln!(stdout, "{} rows affected", result.affected_rows)?,
            }
            Ok(())
        })
    }
}

impl RunCommand for CallArgs {
    fn run(self, ctx: Context) -> Result<()> {
        let runtime = build_runtime("call")?;
        runtime.block_on(async move {
            let (driver, engine) = connect(ctx)?;
            let result = engine.call(&self.procedure).await;
            let disconnected = driver.disconnect().await;

            let table = result?;
            disconnected?;
            write_table(&mut io::stdout().lock(), &table, self.mode)
        })
    }
}

fn connect(ctx: Context) -> Result<(Arc<MysqlDriver>, MocaEngine)> {
    let config = ctx.connection.resolve()?;
    info!(host = %config.host, database = %config.database, "connecting");

    let driver = Arc::new(MysqlDriver::new(&config)?);
    let engine = MocaEngine::try_new(driver.clone(), ctx.options)?;
    Ok((driver, engine))
}

fn build_runtime(thread_label: &'static str) -> Result<Runtime> {
    let runtime = Builder::new_multi_thread()
        .thread_name_fn(move || {
            static THREAD_ID: AtomicU64 = AtomicU64::new(0);
            let id = THREAD_ID.fetch_add(1, Ordering::Relaxed);
            format!("{thread_label}-thread-{id}")
        })
        .enable_all()
        .build()?;

    Ok(runtime)
}
