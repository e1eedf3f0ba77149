//! Conversions between JSON scalars and SQLite values

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};
use crate::{Error, Result};

/// One row as an insertion-ordered column → scalar mapping
pub type Record = Map<String, Value>;

/// Convert a JSON scalar into a value SQLite can bind
pub fn to_sql(column: &str, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Real(f))
            } else {
                Err(Error::InvalidValue {
                    column: column.to_string(),
                    reason: format!("number {} out of range", n),
                })
            }
        }
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(Error::InvalidValue {
            column: column.to_string(),
            reason: "only scalar values can be stored".to_string(),
        }),
    }
}

/// Convert a SQLite value back into a JSON scalar
///
/// BLOBs come back as lossy UTF-8 text; non-finite reals become null.
pub fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

/// Build a record from a result row using the statement's column names
pub fn row_to_record(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (idx, column) in columns.iter().enumerate() {
        record.insert(column.clone(), from_sql(row.get_ref(idx)?));
    }
    Ok(record)
}

/// Render a scalar as a CSV field. Null is the empty field.
pub fn to_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_to_sql() {
        assert_eq!(to_sql("a", &json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(to_sql("a", &json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(to_sql("a", &json!(42)).unwrap(), SqlValue::Integer(42));
        assert_eq!(to_sql("a", &json!(1.5)).unwrap(), SqlValue::Real(1.5));
        assert_eq!(to_sql("a", &json!("x")).unwrap(), SqlValue::Text("x".into()));
    }

    #[test]
    fn test_nested_values_rejected() {
        let err = to_sql("tags", &json!(["a", "b"])).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { ref column, .. } if column == "tags"));
        assert!(to_sql("meta", &json!({"k": 1})).is_err());
    }

    #[test]
    fn test_from_sql() {
        assert_eq!(from_sql(ValueRef::Integer(7)), json!(7));
        assert_eq!(from_sql(ValueRef::Real(f64::NAN)), Value::Null);
        assert_eq!(from_sql(ValueRef::Text(b"hi")), json!("hi"));
        assert_eq!(from_sql(ValueRef::Blob(b"raw")), json!("raw"));
    }

    #[test]
    fn test_to_field() {
        assert_eq!(to_field(&Value::Null), "");
        assert_eq!(to_field(&json!("plain")), "plain");
        assert_eq!(to_field(&json!(3)), "3");
        assert_eq!(to_field(&json!(2.25)), "2.25");
    }
}
