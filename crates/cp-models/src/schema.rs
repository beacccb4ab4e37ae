/*
 *
 *
 *
 *
 * MIT License
 * Copyright (c) 2025. Dwight J. Browne
 * dwight[-at-]dwightjbrowne[-dot-]com
 *
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Destination table schema and the checks a batch must pass before load.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Column type as understood by the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
  String,
  Float,
  Timestamp,
}

impl fmt::Display for FieldType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FieldType::String => write!(f, "STRING"),
      FieldType::Float => write!(f, "FLOAT"),
      FieldType::Timestamp => write!(f, "TIMESTAMP"),
    }
  }
}

/// Column nullability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
  Required,
  Nullable,
}

/// One column of a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
  pub name: String,
  #[serde(rename = "type")]
  pub field_type: FieldType,
  pub mode: FieldMode,
}

impl FieldSchema {
  pub fn required(name: &str, field_type: FieldType) -> Self {
    Self { name: name.to_string(), field_type, mode: FieldMode::Required }
  }

  pub fn nullable(name: &str, field_type: FieldType) -> Self {
    Self { name: name.to_string(), field_type, mode: FieldMode::Nullable }
  }

  /// Check one raw CSV field against this column
  pub fn check_value(&self, value: &str) -> Result<(), SchemaError> {
    if value.is_empty() {
      return match self.mode {
        FieldMode::Required => Err(SchemaError::NullInRequired { column: self.name.clone() }),
        FieldMode::Nullable => Ok(()),
      };
    }

    let valid = match self.field_type {
      FieldType::String => true,
      FieldType::Float => value.parse::<f64>().map(f64::is_finite).unwrap_or(false),
      FieldType::Timestamp => DateTime::parse_from_rfc3339(value).is_ok(),
    };

    if valid {
      Ok(())
    } else {
      Err(SchemaError::InvalidValue {
        column: self.name.clone(),
        expected: self.field_type,
        value: value.to_string(),
      })
    }
  }
}

/// Schema violations detected before a batch is appended
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
  #[error("expected {expected} columns, found {found}")]
  ColumnCount { expected: usize, found: usize },

  #[error("column {position} should be '{expected}', found '{found}'")]
  HeaderMismatch { position: usize, expected: String, found: String },

  #[error("required column '{column}' is empty")]
  NullInRequired { column: String },

  #[error("column '{column}' expects {expected}, got '{value}'")]
  InvalidValue { column: String, expected: FieldType, value: String },

  #[error("table has schema [{found}], requested [{expected}]")]
  TableMismatch { expected: String, found: String },
}

/// Ordered column list of a warehouse table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema {
  pub fields: Vec<FieldSchema>,
}

impl TableSchema {
  pub fn new(fields: Vec<FieldSchema>) -> Self {
    Self { fields }
  }

  /// Schema of the crypto markets destination table
  pub fn crypto_markets() -> Self {
    Self::new(vec![
      FieldSchema::required("id", FieldType::String),
      FieldSchema::required("symbol", FieldType::String),
      FieldSchema::required("name", FieldType::String),
      FieldSchema::nullable("current_price", FieldType::Float),
      FieldSchema::nullable("total_volume", FieldType::Float),
      FieldSchema::nullable("price_change_24h", FieldType::Float),
      FieldSchema::nullable("total_supply", FieldType::Float),
      FieldSchema::nullable("max_supply", FieldType::Float),
      FieldSchema::nullable("last_updated", FieldType::Timestamp),
      FieldSchema::required("timestamp", FieldType::Timestamp),
    ])
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  pub fn field_names(&self) -> Vec<&str> {
    self.fields.iter().map(|f| f.name.as_str()).collect()
  }

  /// Header must list exactly the schema's columns, in order
  pub fn validate_header<S: AsRef<str>>(&self, header: &[S]) -> Result<(), SchemaError> {
    if header.len() != self.fields.len() {
      return Err(SchemaError::ColumnCount { expected: self.fields.len(), found: header.len() });
    }
    for (position, (field, found)) in self.fields.iter().zip(header).enumerate() {
      if field.name != found.as_ref() {
        return Err(SchemaError::HeaderMismatch {
          position,
          expected: field.name.clone(),
          found: found.as_ref().to_string(),
        });
      }
    }
    Ok(())
  }

  /// Every value must satisfy its column's type and mode
  pub fn validate_row<S: AsRef<str>>(&self, row: &[S]) -> Result<(), SchemaError> {
    if row.len() != self.fields.len() {
      return Err(SchemaError::ColumnCount { expected: self.fields.len(), found: row.len() });
    }
    self.fields.iter().zip(row).try_for_each(|(field, value)| field.check_value(value.as_ref()))
  }
}

impl fmt::Display for TableSchema {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> = self
      .fields
      .iter()
      .map(|field| {
        let mode = match field.mode {
          FieldMode::Required => "required",
          FieldMode::Nullable => "nullable",
        };
        format!("{}:{}({})", field.name, field.field_type, mode)
      })
      .collect();
    write!(f, "{}", parts.join(", "))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::NormalizedRecord;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_crypto_markets_contract() {
    assert_eq!(
      TableSchema::crypto_markets().to_string(),
      "id:STRING(required), symbol:STRING(required), name:STRING(required), \
       current_price:FLOAT(nullable), total_volume:FLOAT(nullable), \
       price_change_24h:FLOAT(nullable), total_supply:FLOAT(nullable), \
       max_supply:FLOAT(nullable), last_updated:TIMESTAMP(nullable), \
       timestamp:TIMESTAMP(required)"
    );
    assert_eq!(TableSchema::crypto_markets().len(), NormalizedRecord::COLUMN_COUNT);
  }

  #[test]
  fn test_schema_json_form() {
    let json = serde_json::to_value(TableSchema::crypto_markets()).unwrap();
    assert_eq!(json[0], serde_json::json!({"name": "id", "type": "STRING", "mode": "REQUIRED"}));
    assert_eq!(
      json[8],
      serde_json::json!({"name": "last_updated", "type": "TIMESTAMP", "mode": "NULLABLE"})
    );
    let back: TableSchema = serde_json::from_value(json).unwrap();
    assert_eq!(back, TableSchema::crypto_markets());
  }

  #[test]
  fn test_validate_header_order() {
    let schema = TableSchema::crypto_markets();
    let mut header = schema.field_names();
    assert!(schema.validate_header(&header).is_ok());

    header.swap(0, 1);
    assert_eq!(
      schema.validate_header(&header),
      Err(SchemaError::HeaderMismatch {
        position: 0,
        expected: "id".to_string(),
        found: "symbol".to_string()
      })
    );
  }

  #[test]
  fn test_validate_header_extra_column() {
    let schema = TableSchema::crypto_markets();
    let mut header = schema.field_names();
    header.push("market_cap");
    assert_eq!(
      schema.validate_header(&header),
      Err(SchemaError::ColumnCount { expected: 10, found: 11 })
    );
  }

  #[test]
  fn test_validate_row() {
    let schema = TableSchema::crypto_markets();
    let good = [
      "bitcoin", "btc", "Bitcoin", "1", "", "-2.5", "", "", "", "2025-01-17T10:05:00Z",
    ];
    assert!(schema.validate_row(&good).is_ok());

    let mut missing_name = good;
    missing_name[2] = "";
    assert_eq!(
      schema.validate_row(&missing_name),
      Err(SchemaError::NullInRequired { column: "name".to_string() })
    );

    let mut bad_float = good;
    bad_float[3] = "abc";
    assert!(matches!(schema.validate_row(&bad_float), Err(SchemaError::InvalidValue { .. })));

    let mut bad_time = good;
    bad_time[9] = "2025-01-17";
    assert!(matches!(schema.validate_row(&bad_time), Err(SchemaError::InvalidValue { .. })));
  }

  #[test]
  fn test_float_rejects_non_finite() {
    let field = FieldSchema::nullable("current_price", FieldType::Float);
    assert!(field.check_value("NaN").is_err());
    assert!(field.check_value("inf").is_err());
    assert!(field.check_value("21000000000").is_ok());
  }
}
