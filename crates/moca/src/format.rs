//! Writing result tables to the terminal.

use std::io::Write;

use anyhow::Result;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table as PrettyTable};
use moca_core::types::{DataType, Field, ScalarValue};
use moca_core::{Row, Table};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::args::OutputMode;

const DEFAULT_PRESET: &str = "││──╞═╪╡│    ┬┴┌┐└┘";

pub fn write_table(out: &mut impl Write, table: &Table, mode: OutputMode) -> Result<()> {
    match mode {
        OutputMode::Table => writeln!(out, "{}", pretty_table(table))?,
        OutputMode::Json => {
            let rows: Vec<_> = table
                .rows()
                .iter()
                .map(|row| JsonRow {
                    fields: &table.schema().fields,
                    row,
                })
                .collect();
            serde_json::to_writer(&mut *out, &rows)?;
            writeln!(out)?;
        }
        OutputMode::Csv => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(table.schema().names())?;
            for row in table.rows() {
                writer.write_record(row.iter().map(csv_value))?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn pretty_table(table: &Table) -> PrettyTable {
    let mut pretty = PrettyTable::new();
    pretty.load_preset(DEFAULT_PRESET);
    pretty.set_content_arrangement(ContentArrangement::Dynamic);

    if table.num_columns() == 0 {
        return pretty;
    }

    pretty.set_header(
        table
            .schema()
            .fields
            .iter()
            .map(|f| format!("{}\n──\n{}", f.name, f.datatype)),
    );
    for row in table.rows() {
        pretty.add_row(row.iter().map(|v| Cell::new(v.to_string())));
    }

    for (idx, field) in table.schema().fields.iter().enumerate() {
        if is_numeric(&field.datatype) {
            if let Some(column) = pretty.column_mut(idx) {
                column.set_cell_alignment(CellAlignment::Right);
            }
        }
    }

    pretty
}

fn is_numeric(datatype: &DataType) -> bool {
    datatype.is_integer()
        || matches!(
            datatype,
            DataType::Float32 | DataType::Float64 | DataType::Decimal { .. }
        )
}

fn csv_value(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// A row serialized as an object with keys in column order.
struct JsonRow<'a> {
    fields: &'a [Field],
    row: &'a Row,
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, value) in self.fields.iter().zip(self.row) {
            map.serialize_entry(&field.name, &json_value(value))?;
        }
        map.end()
    }
}

fn json_value(value: &ScalarValue) -> serde_json::Value {
    use serde_json::Value;

    match value {
        ScalarValue::Null => Value::Null,
        ScalarValue::Boolean(v) => Value::Bool(*v),
        ScalarValue::Int64(v) => Value::from(*v),
        ScalarValue::UInt64(v) => Value::from(*v),
        // Non-finite floats become null.
        ScalarValue::Float32(v) => Value::from(*v),
        ScalarValue::Float64(v) => Value::from(*v),
        // Strings keep decimals exact.
        other => Value::String(other.to_string()),
    }
}
