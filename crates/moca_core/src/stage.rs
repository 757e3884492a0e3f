//! Uploading datasets as session-scoped temporary tables.
//!
//! Staged tables are never dropped explicitly. They're temporary, so they
//! disappear with the session that created them, including after a failed
//! upload.

use std::fmt::Write;

use tracing::debug;
use uuid::Uuid;

use crate::config::EngineOptions;
use crate::driver::Connection;
use crate::errors::Result;
use crate::rewrite::{QueryRewriter, quote_identifier};
use crate::table::Table;
use crate::types::{DataType, Field, Schema};

/// A dataset that has been uploaded to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTable {
    name: String,
    schema: Schema,
    num_rows: u64,
}

impl StagedTable {
    /// Generated table name, unquoted.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }
}

/// Generate a table name of `prefix` followed by 32 hex digits.
///
/// Not checked against the server, a collision fails table creation.
pub fn generate_table_name(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

/// Create a temporary table for `data` on the connection and insert all of
/// its rows.
pub async fn stage_table(
    conn: &mut dyn Connection,
    data: &Table,
    opts: &EngineOptions,
) -> Result<StagedTable> {
    let name = generate_table_name(&opts.table_prefix);
    let rewriter = QueryRewriter::new(opts);

    let ddl = create_temporary_table_sql(&name, data.schema());
    conn.create_temporary_table(&name, &rewriter.escape(&ddl))
        .await?;
    debug!(%name, "created temporary table");

    let num_rows = conn
        .insert_rows(&quote_identifier(&name), data, opts.insert_batch_size)
        .await?;
    debug!(%name, num_rows, "staged table");

    Ok(StagedTable {
        name,
        schema: data.schema().clone(),
        num_rows,
    })
}

/// Build the `CREATE TEMPORARY TABLE` statement for a schema.
pub fn create_temporary_table_sql(name: &str, schema: &Schema) -> String {
    let mut sql = format!("CREATE TEMPORARY TABLE {} (", quote_identifier(name));
    for (idx, field) in schema.fields.iter().enumerate() {
        if idx > 0 {
            sql.push_str(", ");
        }
        write_column_definition(&mut sql, field);
    }
    sql.push_str(");");
    sql
}

fn write_column_definition(buf: &mut String, field: &Field) {
    let _ = write!(
        buf,
        "{} {}",
        quote_identifier(&field.name),
        mysql_type_name(&field.datatype)
    );
    if !field.nullable {
        buf.push_str(" NOT NULL");
    }
}

/// MySQL column type used to store values of a data type.
pub fn mysql_type_name(datatype: &DataType) -> String {
    let name = match datatype {
        DataType::Boolean => "BOOLEAN",
        DataType::Int8 => "TINYINT",
        DataType::Int16 => "SMALLINT",
        DataType::Int32 => "INT",
        DataType::Int64 => "BIGINT",
        DataType::UInt8 => "TINYINT UNSIGNED",
        DataType::UInt16 => "SMALLINT UNSIGNED",
        DataType::UInt32 => "INT UNSIGNED",
        DataType::UInt64 => "BIGINT UNSIGNED",
        DataType::Float32 => "FLOAT",
        DataType::Float64 => "DOUBLE",
        DataType::Decimal { precision, scale } => return format!("DECIMAL({precision},{scale})"),
        DataType::Utf8 => "TEXT",
        DataType::Binary => "BLOB",
        DataType::Date => "DATE",
        DataType::Time => "TIME(6)",
        DataType::Timestamp => "DATETIME(6)",
        // All null column, pick something that accepts anything.
        DataType::Null => "TEXT",
    };
    name.to_string()
}
