//! Multi-row inserts for staged tables.

use moca_core::rewrite::quote_identifier;
use moca_core::types::{Schema, ScalarValue};
use mysql_async::Value;

/// Most placeholders MySQL accepts in a single prepared statement.
pub const MAX_PLACEHOLDERS: usize = 65535;

/// Number of rows to send per INSERT.
pub fn rows_per_insert(num_columns: usize, batch_size: usize) -> usize {
    let max_rows = MAX_PLACEHOLDERS / num_columns.max(1);
    batch_size.min(max_rows).max(1)
}

/// Build `INSERT INTO <table> (<cols>) VALUES (?, ..), ..` for `num_rows`
/// rows. `table` is already quoted.
pub fn insert_statement(table: &str, schema: &Schema, num_rows: usize) -> String {
    let columns = schema
        .names()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ");

    let row = format!("({})", vec!["?"; schema.len()].join(", "));
    let values = vec![row.as_str(); num_rows].join(", ");

    format!("INSERT INTO {table} ({columns}) VALUES {values}")
}

pub fn to_mysql_value(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::Null => Value::NULL,
        ScalarValue::Boolean(v) => Value::Int(i64::from(*v)),
        ScalarValue::Int64(v) => Value::Int(*v),
        ScalarValue::UInt64(v) => Value::UInt(*v),
        ScalarValue::Float32(v) => Value::Float(*v),
        ScalarValue::Float64(v) => Value::Double(*v),
        ScalarValue::Decimal(v) => Value::Bytes(v.to_string().into_bytes()),
        ScalarValue::Utf8(v) => Value::Bytes(v.clone().into_bytes()),
        ScalarValue::Binary(v) => Value::Bytes(v.clone()),
        ScalarValue::Date(v) => Value::from(*v),
        ScalarValue::Time(v) => Value::from(*v),
        ScalarValue::Timestamp(v) => Value::from(*v),
    }
}
