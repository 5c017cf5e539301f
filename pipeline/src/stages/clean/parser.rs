//! Source-file parsers
//!
//! Parsers turn raw bytes into native records (`serde_json::Value`), one per
//! row or list element. Extension routing lives in [`parser_for_extension`];
//! cleaners downstream never see the source format.

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
}

pub trait RecordParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<Value>, ParseError>;
}

/// Route a lower-cased extension (including the dot) to a parser
pub fn parser_for_extension(ext: &str) -> Result<Box<dyn RecordParser>, ParseError> {
    match ext {
        ".json" => Ok(Box::new(JsonParser)),
        ".xlsx" | ".xls" => Ok(Box::new(SpreadsheetParser)),
        other => Err(ParseError::UnsupportedFormat(other.to_string())),
    }
}

/// JSON parser: arrays become the record list, any other document is
/// wrapped in a single-element list.
pub struct JsonParser;

impl RecordParser for JsonParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<Value>, ParseError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(match value {
            Value::Array(items) => items,
            other => vec![other],
        })
    }
}

/// Spreadsheet parser: first row is the header, every following row becomes
/// one record keyed by header. Datetime cells are rendered as
/// `%Y-%m-%d %H:%M:%S` strings and empty cells as `""` so the records are
/// JSON-serializable as-is.
pub struct SpreadsheetParser;

impl RecordParser for SpreadsheetParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<Value>, ParseError> {
        let cursor = Cursor::new(bytes.to_vec());
        let mut workbook = open_workbook_auto_from_rs(cursor)
            .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ParseError::Spreadsheet("workbook has no sheets".to_string()))?
            .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(Vec::new());
        };
        let headers: Vec<String> = header_row.iter().map(cell_to_text).collect();

        let mut records = Vec::new();
        for row in rows {
            let mut record = Map::new();
            for (header, cell) in headers.iter().zip(row) {
                if header.is_empty() {
                    continue;
                }
                record.insert(header.clone(), cell_to_value(cell));
            }
            records.push(Value::Object(record));
        }
        Ok(records)
    }
}

fn cell_to_text(cell: &Data) -> String {
    match cell_to_value(cell) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::String(
            dt.as_datetime()
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::String(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_array_input() {
        let records = JsonParser.parse(br#"[{"a": 1}, {"a": 2}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], 1);
    }

    #[test]
    fn test_json_object_is_wrapped() {
        let records = JsonParser.parse(br#"{"a": 1}"#).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_json_invalid_input() {
        assert!(matches!(
            JsonParser.parse(b"not json"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn test_parser_dispatch() {
        assert!(parser_for_extension(".json").is_ok());
        assert!(parser_for_extension(".xlsx").is_ok());
        assert!(parser_for_extension(".xls").is_ok());
        assert!(matches!(
            parser_for_extension(".docx"),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_cell_conversions() {
        assert_eq!(cell_to_value(&Data::Empty), Value::String("".into()));
        assert_eq!(
            cell_to_value(&Data::String("title".into())),
            Value::String("title".into())
        );
        assert_eq!(cell_to_value(&Data::Bool(true)), Value::Bool(true));
        assert_eq!(cell_to_value(&Data::Int(7)), Value::Number(7.into()));
    }
}
