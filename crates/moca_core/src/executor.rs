//! Running rewritten text against a session.

use tracing::{debug, trace};

use crate::driver::{Connection, ExecuteResult, RawConnection, ReadOptions};
use crate::errors::{MocaError, Result};
use crate::rewrite::{QueryRewriter, quote_identifier, split_statements};
use crate::table::Table;

/// Run text as a single read statement and materialize the result.
pub async fn run_query(
    conn: &mut dyn Connection,
    sql: &str,
    rewriter: &QueryRewriter<'_>,
    opts: ReadOptions,
) -> Result<Table> {
    let statement = rewriter.escape(sql);
    trace!(%statement, "running query");
    conn.query(&statement, opts).await
}

/// Run every statement in the text in order, then commit once.
///
/// Stops at the first failing statement without committing. Returns the
/// result of the last statement.
pub async fn run_batch(
    conn: &mut dyn Connection,
    sql: &str,
    rewriter: &QueryRewriter<'_>,
) -> Result<ExecuteResult> {
    let statements = split_statements(sql);

    let mut last = None;
    for statement in &statements {
        let statement = rewriter.escape(statement);
        trace!(%statement, "executing statement");
        last = Some(conn.execute(&statement).await?);
    }

    let last = last.ok_or_else(|| MocaError::statement(sql, "no statements to execute"))?;

    conn.commit().await?;
    debug!(num_statements = statements.len(), "committed batch");

    Ok(last)
}

/// Call a procedure and commit, returning its first result set.
///
/// The commit is what makes the procedure's writes visible to other
/// sessions.
pub async fn run_call(
    conn: &mut dyn RawConnection,
    statement: &str,
    rewriter: &QueryRewriter<'_>,
    opts: ReadOptions,
) -> Result<Table> {
    let statement = rewriter.escape(statement);
    trace!(%statement, "calling procedure");
    let table = conn.call_procedure(&statement, opts).await?;

    conn.commit().await?;
    debug!("committed procedure call");

    Ok(table)
}

/// Build the `CALL` statement for a procedure name.
///
/// The name may be qualified with a database, each part is quoted.
pub fn call_statement(procedure: &str) -> Result<String> {
    let parts: Vec<_> = procedure.split('.').map(str::trim).collect();
    if parts.len() > 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(MocaError::statement(
            procedure,
            format!("invalid procedure name '{procedure}'"),
        ));
    }

    let name = parts
        .iter()
        .map(|p| quote_identifier(p))
        .collect::<Vec<_>>()
        .join(".");

    Ok(format!("CALL {name}();"))
}
