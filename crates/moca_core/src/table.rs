use serde_json::{Map, Value};

use crate::errors::{MocaError, Result};
use crate::types::{DataType, Field, Schema, ScalarValue};

pub type Row = Vec<ScalarValue>;

static NULL: Value = Value::Null;

/// A fully materialized table.
///
/// Used for both datasets uploaded to the server, and for results read back.
/// Every row has exactly one value per field, and every value is compatible
/// with the field's type.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    /// Create a new table, validating rows against the schema.
    pub fn try_new(schema: Schema, rows: Vec<Row>) -> Result<Self> {
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(MocaError::StagingType(format!(
                    "row {row_idx} has {} values, expected {}",
                    row.len(),
                    schema.len()
                )));
            }
            for (value, field) in row.iter().zip(&schema.fields) {
                if value.is_null() && !field.nullable {
                    return Err(MocaError::StagingType(format!(
                        "row {row_idx} has a null for non-nullable column '{}'",
                        field.name
                    )));
                }
                if !value.is_compatible_with(&field.datatype) {
                    return Err(MocaError::StagingType(format!(
                        "row {row_idx} has value {value:?} for column '{}' of type {}",
                        field.name, field.datatype
                    )));
                }
            }
        }

        Ok(Table { schema, rows })
    }

    pub fn empty() -> Self {
        Table {
            schema: Schema::empty(),
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.len()
    }

    /// Get the values of a column by name.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &ScalarValue>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Build a table from JSON.
    ///
    /// Accepts records (an array of objects, a key missing from a record is
    /// null) or columns (an object of equal length arrays). Columns are
    /// ordered by first appearance of their key.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Array(records) => from_json_records(records),
            Value::Object(columns) => from_json_columns(columns),
            other => Err(MocaError::StagingType(format!(
                "expected an array of records or an object of columns, got {}",
                json_kind(other)
            ))),
        }
    }
}

/// A value that can be uploaded as a staged table.
pub trait Dataset {
    fn into_table(self) -> Result<Table>;
}

impl Dataset for Table {
    fn into_table(self) -> Result<Table> {
        Ok(self)
    }
}

impl Dataset for &Table {
    fn into_table(self) -> Result<Table> {
        Ok(self.clone())
    }
}

impl Dataset for Value {
    fn into_table(self) -> Result<Table> {
        Table::from_json(&self)
    }
}

impl Dataset for &Value {
    fn into_table(self) -> Result<Table> {
        Table::from_json(self)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn from_json_records(records: &[Value]) -> Result<Table> {
    let mut names: Vec<String> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            MocaError::StagingType(format!(
                "record {idx} is {}, expected an object",
                json_kind(record)
            ))
        })?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let mut columns: Vec<Vec<&Value>> = vec![Vec::with_capacity(records.len()); names.len()];
    for record in records {
        // Checked above.
        let Some(obj) = record.as_object() else {
            continue;
        };
        for (col, name) in names.iter().enumerate() {
            columns[col].push(obj.get(name).unwrap_or(&NULL));
        }
    }

    build_from_columns(names, columns, records.len())
}

fn from_json_columns(obj: &Map<String, Value>) -> Result<Table> {
    let mut names = Vec::with_capacity(obj.len());
    let mut columns = Vec::with_capacity(obj.len());
    let mut num_rows = None;

    for (name, values) in obj {
        let values = values.as_array().ok_or_else(|| {
            MocaError::StagingType(format!(
                "column '{name}' is {}, expected an array",
                json_kind(values)
            ))
        })?;
        match num_rows {
            None => num_rows = Some(values.len()),
            Some(n) if n != values.len() => {
                return Err(MocaError::StagingType(format!(
                    "column '{name}' has {} values, expected {n}",
                    values.len()
                )));
            }
            Some(_) => (),
        }
        names.push(name.clone());
        columns.push(values.iter().collect());
    }

    build_from_columns(names, columns, num_rows.unwrap_or(0))
}

fn build_from_columns(
    names: Vec<String>,
    columns: Vec<Vec<&Value>>,
    num_rows: usize,
) -> Result<Table> {
    if names.is_empty() {
        return Err(MocaError::StagingType("dataset has no columns".to_string()));
    }

    let mut fields = Vec::with_capacity(names.len());
    for (name, values) in names.iter().zip(&columns) {
        let datatype = infer_json_type(name, values)?;
        let nullable = values.iter().any(|v| v.is_null());
        fields.push(Field::new(name.clone(), datatype, nullable));
    }

    let mut rows = vec![Vec::with_capacity(fields.len()); num_rows];
    for (field, values) in fields.iter().zip(&columns) {
        for (row, value) in rows.iter_mut().zip(values) {
            row.push(json_to_scalar(&field.name, field.datatype, value)?);
        }
    }

    Table::try_new(Schema::new(fields), rows)
}

fn infer_json_type(name: &str, values: &[&Value]) -> Result<DataType> {
    let mut datatype = DataType::Null;
    for value in values {
        let value_type = match value {
            Value::Null => continue,
            Value::Bool(_) => DataType::Boolean,
            Value::Number(n) if n.is_i64() => DataType::Int64,
            Value::Number(n) if n.is_u64() => DataType::UInt64,
            Value::Number(_) => DataType::Float64,
            Value::String(_) => DataType::Utf8,
            other => {
                return Err(MocaError::StagingType(format!(
                    "column '{name}' contains {}, expected a scalar",
                    json_kind(other)
                )));
            }
        };

        datatype = match (datatype, value_type) {
            (DataType::Null, t) => t,
            (a, b) if a == b => a,
            // Mixed numbers widen, nothing else does.
            (DataType::Int64 | DataType::UInt64 | DataType::Float64, DataType::Float64)
            | (DataType::Float64, DataType::Int64 | DataType::UInt64) => DataType::Float64,
            (DataType::Int64, DataType::UInt64) | (DataType::UInt64, DataType::Int64) => {
                DataType::Float64
            }
            (a, b) => {
                return Err(MocaError::StagingType(format!(
                    "column '{name}' mixes {a} and {b} values"
                )));
            }
        };
    }

    Ok(datatype)
}

fn json_to_scalar(name: &str, datatype: DataType, value: &Value) -> Result<ScalarValue> {
    let scalar = match (datatype, value) {
        (_, Value::Null) => ScalarValue::Null,
        (DataType::Boolean, Value::Bool(b)) => ScalarValue::Boolean(*b),
        (DataType::Utf8, Value::String(s)) => ScalarValue::Utf8(s.clone()),
        (DataType::Int64, Value::Number(n)) => n.as_i64().map(ScalarValue::Int64).ok_or_else(|| {
            MocaError::StagingType(format!("column '{name}' has non-integer {n}"))
        })?,
        (DataType::UInt64, Value::Number(n)) => {
            n.as_u64().map(ScalarValue::UInt64).ok_or_else(|| {
                MocaError::StagingType(format!("column '{name}' has non-integer {n}"))
            })?
        }
        (DataType::Float64, Value::Number(n)) => {
            n.as_f64().map(ScalarValue::Float64).ok_or_else(|| {
                MocaError::StagingType(format!("column '{name}' has non-finite {n}"))
            })?
        }
        (dt, other) => {
            return Err(MocaError::StagingType(format!(
                "column '{name}' of type {dt} has {}",
                json_kind(other)
            )));
        }
    };
    Ok(scalar)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn try_new_rejects_ragged_rows() {
        let schema = Schema::new([
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Utf8, true),
        ]);
        let err = Table::try_new(schema, vec![vec![1.into(), "x".into()], vec![2.into()]])
            .unwrap_err();
        assert!(matches!(err, MocaError::StagingType(_)), "{err}");
    }

    #[test]
    fn try_new_rejects_null_in_non_nullable() {
        let schema = Schema::new([Field::new("a", DataType::Int64, false)]);
        let err = Table::try_new(schema, vec![vec![ScalarValue::Null]]).unwrap_err();
        assert!(matches!(err, MocaError::StagingType(_)), "{err}");
    }

    #[test]
    fn try_new_rejects_wrong_type() {
        let schema = Schema::new([Field::new("a", DataType::Int32, false)]);
        let err = Table::try_new(schema, vec![vec![ScalarValue::Float64(1.5)]]).unwrap_err();
        assert!(matches!(err, MocaError::StagingType(_)), "{err}");
    }

    #[test]
    fn from_json_records() {
        let value = json!([
            {"moca_oid": 1, "value": "a"},
            {"moca_oid": 2, "value": null},
            {"moca_oid": 3, "value": "c"},
        ]);
        let table = Table::from_json(&value).unwrap();

        let expected_schema = Schema::new([
            Field::new("moca_oid", DataType::Int64, false),
            Field::new("value", DataType::Utf8, true),
        ]);
        assert_eq!(&expected_schema, table.schema());
        assert_eq!(3, table.num_rows());
        assert_eq!(
            vec![ScalarValue::Int64(2), ScalarValue::Null],
            table.rows()[1]
        );
    }

    #[test]
    fn from_json_records_missing_keys_are_null() {
        let value = json!([{"a": 1}, {"b": true}]);
        let table = Table::from_json(&value).unwrap();
        assert_eq!(vec!["a", "b"], table.schema().names().collect::<Vec<_>>());
        assert_eq!(vec![ScalarValue::Int64(1), ScalarValue::Null], table.rows()[0]);
        assert_eq!(
            vec![ScalarValue::Null, ScalarValue::Boolean(true)],
            table.rows()[1]
        );
    }

    #[test]
    fn from_json_columns() {
        let value = json!({"x": [1.5, 2], "y": ["a", "b"]});
        let table = Table::from_json(&value).unwrap();
        assert_eq!(DataType::Float64, table.schema().fields[0].datatype);
        assert_eq!(
            vec![ScalarValue::Float64(2.0), ScalarValue::Utf8("b".into())],
            table.rows()[1]
        );
    }

    #[test]
    fn from_json_keeps_key_order() {
        let records = json!([
            {"value": "a", "moca_oid": 1},
            {"zeta": 2.5, "moca_oid": 2},
        ]);
        let table = Table::from_json(&records).unwrap();
        assert_eq!(
            vec!["value", "moca_oid", "zeta"],
            table.schema().names().collect::<Vec<_>>()
        );
        assert_eq!(
            vec![
                ScalarValue::Utf8("a".into()),
                ScalarValue::Int64(1),
                ScalarValue::Null
            ],
            table.rows()[0]
        );

        let columns = json!({"z": [1], "a": ["x"], "m": [true]});
        let table = Table::from_json(&columns).unwrap();
        assert_eq!(
            vec!["z", "a", "m"],
            table.schema().names().collect::<Vec<_>>()
        );

        // Parsed text keeps file order too.
        let parsed: Value = serde_json::from_str(r#"[{"teff": 3042.5, "moca_oid": 7}]"#).unwrap();
        let table = Table::from_json(&parsed).unwrap();
        assert_eq!(
            vec!["teff", "moca_oid"],
            table.schema().names().collect::<Vec<_>>()
        );
    }

    #[test]
    fn from_json_not_tabular() {
        for value in [
            json!(42),
            json!("tmp"),
            json!(null),
            json!([1, 2, 3]),
            json!([]),
            json!({}),
            json!({"a": [1, 2], "b": [1]}),
            json!({"a": 1}),
            json!([{"a": {"nested": 1}}]),
            json!([{"a": 1}, {"a": "x"}]),
        ] {
            let err = Table::from_json(&value).unwrap_err();
            assert!(matches!(err, MocaError::StagingType(_)), "{value}: {err}");
        }
    }

    #[test]
    fn column_accessor() {
        let table = Table::from_json(&json!({"a": [1, 2, 3]})).unwrap();
        let vals: Vec<_> = table.column("a").unwrap().cloned().collect();
        assert_eq!(
            vec![
                ScalarValue::Int64(1),
                ScalarValue::Int64(2),
                ScalarValue::Int64(3)
            ],
            vals
        );
        assert!(table.column("missing").is_none());
    }
}
