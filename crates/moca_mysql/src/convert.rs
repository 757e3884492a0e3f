//! Conversions between MySQL result sets and tables.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use moca_core::types::{DataType, Field, Schema, ScalarValue};
use moca_core::{ReadOptions, Row};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::prelude::FromValue;
use mysql_async::{Column as MysqlColumn, Row as MysqlRow, Value, from_value_opt};
use rust_decimal::Decimal;

use crate::errors::{MysqlError, Result};

/// Largest precision MySQL allows for DECIMAL.
const MAX_DECIMAL_PRECISION: u32 = 65;

/// Character set id of the `binary` character set.
pub const BINARY_CHARSET: u16 = 63;

/// Create a schema from a list of `MysqlColumn`.
pub fn try_create_schema(cols: &[MysqlColumn], opts: ReadOptions) -> Result<Schema> {
    let mut fields = Vec::with_capacity(cols.len());

    for col in cols {
        let name = col.name_str();
        let flags = col.flags();
        let datatype = mysql_datatype(
            col.column_type(),
            flags,
            col.column_length(),
            col.decimals(),
            col.character_set(),
            opts,
        )
        .ok_or_else(|| MysqlError::UnsupportedMysqlType(col.column_type(), name.to_string()))?;

        let nullable = !flags.contains(ColumnFlags::NOT_NULL_FLAG);
        fields.push(Field::new(name, datatype, nullable));
    }

    Ok(Schema::new(fields))
}

/// Data type for a column definition, `None` if the type isn't supported.
///
/// Column definition flags can be found here:
/// https://dev.mysql.com/doc/dev/mysql-server/latest/group__group__cs__column__definition__flags.html
pub fn mysql_datatype(
    typ: ColumnType,
    flags: ColumnFlags,
    column_length: u32,
    decimals: u8,
    character_set: u16,
    opts: ReadOptions,
) -> Option<DataType> {
    use ColumnType::*;

    let unsigned = flags.contains(ColumnFlags::UNSIGNED_FLAG);
    // BINARY_FLAG is also set for `_bin` collations, only the charset tells
    // bytes apart from text.
    let binary = character_set == BINARY_CHARSET;

    let datatype = match typ {
        // BOOLEAN is stored as TINYINT(1)
        MYSQL_TYPE_TINY if !unsigned && column_length == 1 => DataType::Boolean,
        // TINYINT
        MYSQL_TYPE_TINY if unsigned => DataType::UInt8,
        MYSQL_TYPE_TINY => DataType::Int8,
        // SMALLINT
        MYSQL_TYPE_SHORT if unsigned => DataType::UInt16,
        MYSQL_TYPE_SHORT => DataType::Int16,
        // INT == LONG and MEDIUMINT == INT24
        MYSQL_TYPE_LONG | MYSQL_TYPE_INT24 if unsigned => DataType::UInt32,
        MYSQL_TYPE_LONG | MYSQL_TYPE_INT24 => DataType::Int32,
        // BIGINT
        MYSQL_TYPE_LONGLONG if unsigned => DataType::UInt64,
        MYSQL_TYPE_LONGLONG => DataType::Int64,
        MYSQL_TYPE_YEAR => DataType::Int16,
        MYSQL_TYPE_FLOAT => DataType::Float32,
        MYSQL_TYPE_DOUBLE => DataType::Float64,
        MYSQL_TYPE_NULL => DataType::Null,
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL if opts.coerce_float => DataType::Float64,
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => {
            decimal_type(column_length, decimals, unsigned)
        }
        MYSQL_TYPE_DATE => DataType::Date,
        MYSQL_TYPE_TIME => DataType::Time,
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP => DataType::Timestamp,
        // JSON is reported with the binary charset but is always text.
        MYSQL_TYPE_JSON => DataType::Utf8,
        MYSQL_TYPE_VARCHAR | MYSQL_TYPE_VAR_STRING | MYSQL_TYPE_STRING if binary => {
            DataType::Binary
        }
        MYSQL_TYPE_VARCHAR | MYSQL_TYPE_VAR_STRING | MYSQL_TYPE_STRING => DataType::Utf8,
        // BLOB types
        MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB | MYSQL_TYPE_BLOB
            if binary =>
        {
            DataType::Binary
        }
        // TEXT types
        MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB | MYSQL_TYPE_BLOB => {
            DataType::Utf8
        }
        _ => return None,
    };

    Some(datatype)
}

/// The reported length of a DECIMAL column includes the sign and the decimal
/// point.
fn decimal_type(column_length: u32, decimals: u8, unsigned: bool) -> DataType {
    let mut precision = column_length;
    if decimals > 0 {
        precision = precision.saturating_sub(1);
    }
    if !unsigned {
        precision = precision.saturating_sub(1);
    }
    let precision = precision.clamp(1, MAX_DECIMAL_PRECISION);

    DataType::Decimal {
        precision: precision as u8,
        scale: decimals.min(precision as u8),
    }
}

/// Decode every row of a result set according to the schema.
pub fn decode_rows(rows: Vec<MysqlRow>, schema: &Schema) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        let mut values = Vec::with_capacity(schema.len());
        for (col_idx, field) in schema.fields.iter().enumerate() {
            let value: Value = row.take(col_idx).ok_or_else(|| MysqlError::InvalidValue {
                column: field.name.clone(),
                message: "row value should exist".to_string(),
            })?;
            values.push(decode_value(value, field)?);
        }
        out.push(values);
    }
    Ok(out)
}

/// Decode a single value into the representation for the field's type.
pub fn decode_value(value: Value, field: &Field) -> Result<ScalarValue> {
    if value == Value::NULL {
        return Ok(ScalarValue::Null);
    }

    let scalar = match field.datatype {
        DataType::Null => ScalarValue::Null,
        // TINYINT(1) may hold any tinyint, anything non-zero is true.
        DataType::Boolean => ScalarValue::Boolean(convert::<i64>(value, field)? != 0),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            ScalarValue::Int64(convert(value, field)?)
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            ScalarValue::UInt64(convert(value, field)?)
        }
        DataType::Float32 => ScalarValue::Float32(convert(value, field)?),
        DataType::Float64 => ScalarValue::Float64(convert(value, field)?),
        DataType::Decimal { .. } => {
            // Decimals come back as text, parse them ourselves to keep them
            // exact. Values with more than 28 significant digits don't fit.
            let s: String = convert(value, field)?;
            let v = s.parse::<Decimal>().map_err(|e| MysqlError::InvalidValue {
                column: field.name.clone(),
                message: format!("{s}: {e}"),
            })?;
            ScalarValue::Decimal(v)
        }
        DataType::Utf8 => ScalarValue::Utf8(convert(value, field)?),
        DataType::Binary => ScalarValue::Binary(convert(value, field)?),
        DataType::Date => ScalarValue::Date(convert::<NaiveDate>(value, field)?),
        DataType::Time => ScalarValue::Time(convert::<NaiveTime>(value, field)?),
        DataType::Timestamp => ScalarValue::Timestamp(convert::<NaiveDateTime>(value, field)?),
    };

    Ok(scalar)
}

fn convert<T: FromValue>(value: Value, field: &Field) -> Result<T> {
    from_value_opt(value).map_err(|e| MysqlError::InvalidValue {
        column: field.name.clone(),
        message: e.to_string(),
    })
}
