//! Spreadsheet payloads flattened into template rows
//!
//! A route may declare that one request field carries a base64 encoded
//! workbook. Its first worksheet is decoded into rows of JSON cells and stored
//! under a second field for the template. Decoding failures are logged and the
//! template simply receives no rows.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use serde_json::{Number, Value};
use std::io::Cursor;
use tracing::{debug, warn};

/// Moves a base64 workbook from `source` into decoded rows at `target`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableBinding {
    pub source: &'static str,
    pub target: &'static str,
}

/// Decode the first worksheet of a base64 encoded xlsx document
///
/// Accepts an optional `data:...;base64,` prefix. Returns `None` when the
/// payload is not base64, not a workbook, or has no worksheet.
pub fn decode_rows(encoded: &str) -> Option<Vec<Vec<Value>>> {
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

    let bytes = match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Spreadsheet payload is not valid base64: {}", e);
            return None;
        }
    };

    let mut workbook: Xlsx<_> = match open_workbook_from_rs(Cursor::new(bytes)) {
        Ok(workbook) => workbook,
        Err(e) => {
            warn!("Spreadsheet payload could not be opened: {}", e);
            return None;
        }
    };

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            warn!("First worksheet could not be read: {}", e);
            return None;
        }
        None => {
            warn!("Spreadsheet has no worksheets");
            return None;
        }
    };

    let rows: Vec<Vec<Value>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_json).collect())
        .collect();
    debug!("Decoded {} spreadsheet rows", rows.len());
    Some(rows)
}

const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        // xlsx stores every number as a double
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => Value::from(*f as i64),
        Data::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// Apply every binding to a request object in place
pub fn apply_bindings(data: &mut Value, bindings: &[TableBinding]) {
    let Some(fields) = data.as_object_mut() else {
        return;
    };

    for binding in bindings {
        let Some(Value::String(encoded)) = fields.remove(binding.source) else {
            continue;
        };

        match decode_rows(&encoded) {
            Some(rows) => {
                let rows = rows.into_iter().map(Value::Array).collect();
                fields.insert(binding.target.to_string(), Value::Array(rows));
            }
            None => {
                warn!(
                    "Skipping table `{}`: field `{}` could not be decoded",
                    binding.target, binding.source
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BINDING: TableBinding = TableBinding {
        source: "excelBase64",
        target: "excelRows",
    };

    const WORKBOOK: &[u8] = include_bytes!("testdata/regional_sales.xlsx");

    #[test]
    fn first_worksheet_decodes_to_rows() {
        let rows = decode_rows(&STANDARD.encode(WORKBOOK)).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![json!("Region"), json!("Revenue")],
                vec![json!("North"), json!(1200)],
                vec![json!("South"), json!(950.5)],
            ]
        );
    }

    #[test]
    fn data_url_with_line_breaks_is_accepted() {
        let encoded = STANDARD.encode(WORKBOOK);
        let (head, tail) = encoded.split_at(encoded.len() / 2);
        let wrapped = format!(
            "data:application/vnd.openxmlformats-officedocument.spreadsheetml.sheet;base64,{head}\n{tail}"
        );
        assert_eq!(decode_rows(&wrapped).map(|rows| rows.len()), Some(3));
    }

    #[test]
    fn binding_moves_rows_to_target() {
        let mut data = json!({"title": "Q1", "excelBase64": STANDARD.encode(WORKBOOK)});
        apply_bindings(&mut data, &[BINDING]);

        assert!(data.get("excelBase64").is_none());
        assert_eq!(data["excelRows"][1], json!(["North", 1200]));
        assert_eq!(data["excelRows"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn invalid_base64_yields_none() {
        assert!(decode_rows("%%% not base64 %%%").is_none());
    }

    #[test]
    fn non_workbook_bytes_yield_none() {
        let encoded = STANDARD.encode(b"just some text, not a zip archive");
        assert!(decode_rows(&encoded).is_none());
        assert!(decode_rows(&format!("data:application/octet-stream;base64,{encoded}")).is_none());
    }

    #[test]
    fn cells_map_to_json_values() {
        assert_eq!(cell_to_json(&Data::Empty), Value::Null);
        assert_eq!(cell_to_json(&Data::Int(7)), json!(7));
        assert_eq!(cell_to_json(&Data::Float(1.5)), json!(1.5));
        assert_eq!(cell_to_json(&Data::Float(1200.0)), json!(1200));
        assert_eq!(cell_to_json(&Data::Float(f64::NAN)), Value::Null);
        assert_eq!(cell_to_json(&Data::Bool(true)), json!(true));
        assert_eq!(cell_to_json(&Data::String("Q1".into())), json!("Q1"));
    }

    #[test]
    fn failed_decode_leaves_no_rows_and_drops_source() {
        let mut data = json!({"title": "Q1", "excelBase64": "not-a-workbook"});
        apply_bindings(&mut data, &[BINDING]);
        assert_eq!(data, json!({"title": "Q1"}));
    }

    #[test]
    fn missing_source_field_is_ignored() {
        let mut data = json!({"title": "Q1"});
        apply_bindings(&mut data, &[BINDING]);
        assert_eq!(data, json!({"title": "Q1"}));
    }
}
