//! Table model and CSV/JSON codecs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{TableError, TableResult};

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    /// Parse a raw CSV cell, sniffing numbers and booleans.
    pub fn from_csv_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match trimmed {
            "true" | "True" | "TRUE" => return Value::Bool(true),
            "false" | "False" | "FALSE" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Value::Number(n);
            }
        }
        Value::Text(cell.to_string())
    }

    /// Convert a JSON value; objects and arrays stringify.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                n.as_f64().map_or(Value::Null, Value::Number)
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    /// Numeric view of the cell, if it is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether the cell is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => {
                // Integers render without the trailing ".0".
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Numeric summary of one column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// An in-memory table: named columns over rows of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DataTable {
    /// Parse CSV text. Headers are lowercased; short rows pad with nulls and
    /// long rows truncate to the header width.
    pub fn from_csv(input: &str) -> TableResult<Self> {
        let records = parse_csv(input)?;
        let mut records = records.into_iter();

        let header = records.next().ok_or_else(|| TableError::Parse {
            reason: "CSV input is empty".to_string(),
        })?;
        let columns: Vec<String> = header
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        if columns.iter().any(String::is_empty) {
            return Err(TableError::Parse {
                reason: "CSV header contains an empty column name".to_string(),
            });
        }

        let width = columns.len();
        let rows = records
            .map(|record| {
                let mut row: Vec<Value> =
                    record.iter().map(|cell| Value::from_csv_cell(cell)).collect();
                row.resize(width, Value::Null);
                row.truncate(width);
                row
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Parse a JSON array of objects. Column order follows first appearance;
    /// headers are lowercased and rows missing a key get null.
    pub fn from_json(input: &str) -> TableResult<Self> {
        let parsed: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(input).map_err(|e| TableError::Parse {
                reason: format!("expected a JSON array of objects: {e}"),
            })?;

        let mut columns: Vec<String> = Vec::new();
        for object in &parsed {
            for key in object.keys() {
                let key = key.to_lowercase();
                if !columns.contains(&key) {
                    columns.push(key);
                }
            }
        }
        if columns.is_empty() {
            return Err(TableError::Parse {
                reason: "JSON input has no columns".to_string(),
            });
        }

        let rows = parsed
            .iter()
            .map(|object| {
                columns
                    .iter()
                    .map(|col| {
                        object
                            .iter()
                            .find(|(k, _)| k.to_lowercase() == *col)
                            .map_or(Value::Null, |(_, v)| Value::from_json(v))
                    })
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Serialize back to CSV, quoting cells that need it.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        write_csv_record(&mut out, self.columns.iter().map(String::as_str));
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            write_csv_record(&mut out, cells.iter().map(String::as_str));
        }
        out
    }

    /// Index of a column by (lowercased) name.
    pub fn column_index(&self, name: &str) -> TableResult<usize> {
        let wanted = name.to_lowercase();
        self.columns
            .iter()
            .position(|c| *c == wanted)
            .ok_or(TableError::UnknownColumn { name: name.to_string() })
    }

    /// A column is numeric when every non-null cell is a number and at least
    /// one cell is.
    pub fn is_numeric_column(&self, idx: usize) -> bool {
        let mut saw_number = false;
        for row in &self.rows {
            match &row[idx] {
                Value::Number(_) => saw_number = true,
                Value::Null => {}
                _ => return false,
            }
        }
        saw_number
    }

    /// Non-null numeric values of a column, in row order.
    pub fn numeric_values(&self, idx: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row[idx].as_number())
            .collect()
    }

    /// count/mean/std/min/max over a numeric column. Sample std (n-1); 0.0
    /// for a single value.
    pub fn summary(&self, column: &str) -> TableResult<ColumnSummary> {
        let idx = self.column_index(column)?;
        let values = self.numeric_values(idx);
        if values.is_empty() {
            return Err(TableError::Chart {
                reason: format!("column '{column}' has no numeric values"),
            });
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / (count - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(ColumnSummary { count, mean, std, min, max })
    }

    /// Capitalize the first letter of every text cell.
    pub fn normalize_categorical(&mut self) {
        for row in &mut self.rows {
            for cell in row {
                if let Value::Text(s) = cell {
                    let mut chars = s.chars();
                    if let Some(first) = chars.next() {
                        *s = first.to_uppercase().collect::<String>() + chars.as_str();
                    }
                }
            }
        }
    }
}

/// Parse CSV into records. Handles quoted fields with embedded commas,
/// quotes ("" escape), and newlines.
fn parse_csv(input: &str) -> TableResult<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => {
                    if field.is_empty() {
                        in_quotes = true;
                    } else {
                        field.push(c);
                    }
                }
                ',' => {
                    record.push(std::mem::take(&mut field));
                }
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }
    }

    if in_quotes {
        return Err(TableError::Parse {
            reason: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    // Trailing blank lines produce empty records; drop them.
    records.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    Ok(records)
}

/// Append one CSV record, escaping fields containing commas, quotes, or
/// newlines.
fn write_csv_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Name,Age,Active\nada,36,true\ngrace,45,false\n";

    #[test]
    fn test_from_csv_sniffs_types_and_lowercases_headers() {
        let table = DataTable::from_csv(SAMPLE).unwrap();
        assert_eq!(table.columns, vec!["name", "age", "active"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], Value::Number(36.0));
        assert_eq!(table.rows[0][2], Value::Bool(true));
        assert_eq!(table.rows[1][0], Value::Text("grace".into()));
    }

    #[test]
    fn test_from_csv_quoted_fields() {
        let table =
            DataTable::from_csv("note\n\"a, b\"\n\"say \"\"hi\"\"\"\n").unwrap();
        assert_eq!(table.rows[0][0], Value::Text("a, b".into()));
        assert_eq!(table.rows[1][0], Value::Text("say \"hi\"".into()));
    }

    #[test]
    fn test_from_csv_short_row_pads_null() {
        let table = DataTable::from_csv("a,b\n1\n").unwrap();
        assert_eq!(table.rows[0], vec![Value::Number(1.0), Value::Null]);
    }

    #[test]
    fn test_from_csv_empty_input() {
        assert!(DataTable::from_csv("").is_err());
    }

    #[test]
    fn test_from_json_array_of_objects() {
        let table = DataTable::from_json(
            r#"[{"Name": "ada", "Age": 36}, {"Name": "grace", "City": "DC"}]"#,
        )
        .unwrap();
        assert_eq!(table.columns, vec!["name", "age", "city"]);
        assert_eq!(table.rows[0][2], Value::Null);
        assert_eq!(table.rows[1][2], Value::Text("DC".into()));
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(DataTable::from_json(r#"{"name": "ada"}"#).is_err());
    }

    #[test]
    fn test_to_csv_escapes_and_renders_integers() {
        let table = DataTable::from_csv("name,age\n\"a, b\",36\n").unwrap();
        assert_eq!(table.to_csv(), "name,age\n\"a, b\",36\n");
    }

    #[test]
    fn test_numeric_column_detection() {
        let table = DataTable::from_csv("a,b,c\n1,x,\n2,y,3\n").unwrap();
        assert!(table.is_numeric_column(0));
        assert!(!table.is_numeric_column(1));
        // nulls don't disqualify
        assert!(table.is_numeric_column(2));
    }

    #[test]
    fn test_summary() {
        let table = DataTable::from_csv("v\n1\n2\n3\n4\n").unwrap();
        let summary = table.summary("v").unwrap();
        assert_eq!(summary.count, 4);
        assert!((summary.mean - 2.5).abs() < 1e-9);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert!((summary.std - 1.2909944487358056).abs() < 1e-9);
    }

    #[test]
    fn test_summary_non_numeric_column() {
        let table = DataTable::from_csv("v\nx\ny\n").unwrap();
        assert!(table.summary("v").is_err());
    }

    #[test]
    fn test_normalize_categorical() {
        let mut table = DataTable::from_csv("city\nparis\nnew york\n").unwrap();
        table.normalize_categorical();
        assert_eq!(table.rows[0][0], Value::Text("Paris".into()));
        assert_eq!(table.rows[1][0], Value::Text("New york".into()));
    }

    #[test]
    fn test_column_index_case_insensitive() {
        let table = DataTable::from_csv("Name\nada\n").unwrap();
        assert_eq!(table.column_index("NAME").unwrap(), 0);
        assert!(table.column_index("missing").is_err());
    }
}
