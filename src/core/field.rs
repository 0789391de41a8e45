//! Typed dynamic field values
//!
//! A dynamic field stores its value in exactly one of the typed
//! `field_value_*` columns of `core_dynamic_data`; `field_type` records which.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::table::Row;

/// The type tag stored in `field_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Json,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" | "string" => Some(FieldType::Text),
            "number" | "decimal" | "integer" => Some(FieldType::Number),
            "boolean" | "bool" => Some(FieldType::Boolean),
            "date" | "datetime" => Some(FieldType::Date),
            "json" | "object" => Some(FieldType::Json),
            _ => None,
        }
    }

    /// Column holding values of this type
    pub fn column(&self) -> &'static str {
        match self {
            FieldType::Text => "field_value_text",
            FieldType::Number => "field_value_number",
            FieldType::Boolean => "field_value_boolean",
            FieldType::Date => "field_value_date",
            FieldType::Json => "field_value_json",
        }
    }
}

/// All typed value columns
pub const VALUE_COLUMNS: &[&str] = &[
    "field_value_text",
    "field_value_number",
    "field_value_boolean",
    "field_value_date",
    "field_value_json",
];

/// A typed dynamic field value
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    Json(Value),
}

impl DynamicValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            DynamicValue::Text(_) => FieldType::Text,
            DynamicValue::Number(_) => FieldType::Number,
            DynamicValue::Boolean(_) => FieldType::Boolean,
            DynamicValue::Date(_) => FieldType::Date,
            DynamicValue::Json(_) => FieldType::Json,
        }
    }

    /// Infer a value from untyped JSON
    ///
    /// Strings shaped like `YYYY-MM-DD` become dates; arrays and objects
    /// become JSON. Returns `None` for null.
    pub fn infer(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(DynamicValue::Boolean(*b)),
            Value::Number(n) => n.as_f64().map(DynamicValue::Number),
            Value::String(s) => Some(
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(DynamicValue::Date)
                    .unwrap_or_else(|_| DynamicValue::Text(s.clone())),
            ),
            Value::Array(_) | Value::Object(_) => Some(DynamicValue::Json(value.clone())),
        }
    }

    /// Coerce JSON into the declared type
    pub fn coerce(value: &Value, field_type: FieldType) -> Result<Self, String> {
        let mismatch = || format!("expected {} value, got {}", field_type.as_str(), value);
        match field_type {
            FieldType::Text => match value {
                Value::String(s) => Ok(DynamicValue::Text(s.clone())),
                Value::Number(n) => Ok(DynamicValue::Text(n.to_string())),
                Value::Bool(b) => Ok(DynamicValue::Text(b.to_string())),
                _ => Err(mismatch()),
            },
            FieldType::Number => {
                let number = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                // NaN and infinities have no JSON form and would be stored as null
                number
                    .filter(|n| n.is_finite())
                    .map(DynamicValue::Number)
                    .ok_or_else(mismatch)
            }
            FieldType::Boolean => match value {
                Value::Bool(b) => Ok(DynamicValue::Boolean(*b)),
                Value::String(s) if s == "true" => Ok(DynamicValue::Boolean(true)),
                Value::String(s) if s == "false" => Ok(DynamicValue::Boolean(false)),
                _ => Err(mismatch()),
            },
            FieldType::Date => value
                .as_str()
                .and_then(parse_date)
                .map(DynamicValue::Date)
                .ok_or_else(mismatch),
            FieldType::Json => match value {
                Value::Null => Err(mismatch()),
                other => Ok(DynamicValue::Json(other.clone())),
            },
        }
    }

    /// The JSON representation placed in the typed column
    pub fn to_json(&self) -> Value {
        match self {
            DynamicValue::Text(s) => Value::String(s.clone()),
            DynamicValue::Number(n) => serde_json::json!(n),
            DynamicValue::Boolean(b) => Value::Bool(*b),
            DynamicValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            DynamicValue::Json(v) => v.clone(),
        }
    }

    /// Write this value into a dynamic data row, clearing the other columns
    pub fn write_columns(&self, row: &mut Row) {
        let target = self.field_type().column();
        for column in VALUE_COLUMNS {
            if *column == target {
                row.insert(column.to_string(), self.to_json());
            } else {
                row.insert(column.to_string(), Value::Null);
            }
        }
        row.insert(
            "field_type".into(),
            Value::String(self.field_type().as_str().to_string()),
        );
    }

    /// Read the typed value back from a dynamic data row
    ///
    /// Uses `field_type` when present, otherwise the first non-null column.
    pub fn read_columns(row: &Row) -> Option<Self> {
        let declared = row
            .get("field_type")
            .and_then(Value::as_str)
            .and_then(FieldType::parse);

        let field_type = match declared {
            Some(t) => t,
            None => [
                FieldType::Text,
                FieldType::Number,
                FieldType::Boolean,
                FieldType::Date,
                FieldType::Json,
            ]
            .into_iter()
            .find(|t| row.get(t.column()).is_some_and(|v| !v.is_null()))?,
        };

        let raw = row.get(field_type.column()).filter(|v| !v.is_null())?;
        Self::coerce(raw, field_type).ok()
    }
}

/// Parse a date, accepting both plain dates and RFC 3339 timestamps
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().or_else(|| {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.date_naive())
    })
}
