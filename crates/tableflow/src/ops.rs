//! Typed table operations.
//!
//! The model emits these as a JSON array; each op is validated against the
//! table before anything is applied, so a bad plan leaves the table intact.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{TableError, TableResult};
use crate::table::{DataTable, Value};

/// One table operation, as planned by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TableOp {
    /// Append a row; unmentioned columns get null.
    AddRow { values: HashMap<String, Value> },
    /// Add a column filled with `default`.
    AddColumn {
        name: String,
        #[serde(default)]
        default: Value,
    },
    /// Remove a column.
    DropColumn { name: String },
    /// Rename a column.
    RenameColumn { from: String, to: String },
    /// Set one cell.
    SetCell { row: usize, column: String, value: Value },
    /// Set `set_column` to `set_value` on every row where `column == equals`.
    UpdateWhere {
        column: String,
        equals: Value,
        set_column: String,
        set_value: Value,
    },
    /// Delete every row where `column == equals`.
    DeleteRows { column: String, equals: Value },
    /// Keep only rows where `column == equals`.
    FilterRows { column: String, equals: Value },
    /// Sort rows by a column.
    SortBy {
        column: String,
        #[serde(default)]
        descending: bool,
    },
}

impl TableOp {
    /// Short human-readable description for the history log.
    pub fn describe(&self) -> String {
        match self {
            TableOp::AddRow { .. } => "add row".to_string(),
            TableOp::AddColumn { name, .. } => format!("add column '{name}'"),
            TableOp::DropColumn { name } => format!("drop column '{name}'"),
            TableOp::RenameColumn { from, to } => {
                format!("rename column '{from}' to '{to}'")
            }
            TableOp::SetCell { row, column, .. } => {
                format!("set {column}[{row}]")
            }
            TableOp::UpdateWhere { column, set_column, .. } => {
                format!("update '{set_column}' where '{column}' matches")
            }
            TableOp::DeleteRows { column, .. } => {
                format!("delete rows by '{column}'")
            }
            TableOp::FilterRows { column, .. } => {
                format!("filter rows by '{column}'")
            }
            TableOp::SortBy { column, descending } => {
                if *descending {
                    format!("sort by '{column}' descending")
                } else {
                    format!("sort by '{column}'")
                }
            }
        }
    }
}

/// Apply a plan to a table, returning the new table. The input is never
/// mutated; the first invalid op aborts the whole plan.
pub fn apply_ops(table: &DataTable, ops: &[TableOp]) -> TableResult<DataTable> {
    let mut table = table.clone();
    for op in ops {
        apply_one(&mut table, op)?;
    }
    Ok(table)
}

fn apply_one(table: &mut DataTable, op: &TableOp) -> TableResult<()> {
    match op {
        TableOp::AddRow { values } => {
            // Validate column names before touching the table.
            for name in values.keys() {
                table.column_index(name)?;
            }
            let row = table
                .columns
                .iter()
                .map(|col| {
                    values
                        .iter()
                        .find(|(k, _)| k.to_lowercase() == *col)
                        .map_or(Value::Null, |(_, v)| v.clone())
                })
                .collect();
            table.rows.push(row);
        }
        TableOp::AddColumn { name, default } => {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                return Err(TableError::InvalidOp {
                    reason: "new column name is empty".to_string(),
                });
            }
            if table.columns.contains(&name) {
                return Err(TableError::InvalidOp {
                    reason: format!("column '{name}' already exists"),
                });
            }
            table.columns.push(name);
            for row in &mut table.rows {
                row.push(default.clone());
            }
        }
        TableOp::DropColumn { name } => {
            let idx = table.column_index(name)?;
            if table.columns.len() == 1 {
                return Err(TableError::InvalidOp {
                    reason: "cannot drop the last column".to_string(),
                });
            }
            table.columns.remove(idx);
            for row in &mut table.rows {
                row.remove(idx);
            }
        }
        TableOp::RenameColumn { from, to } => {
            let idx = table.column_index(from)?;
            let to = to.trim().to_lowercase();
            if to.is_empty() {
                return Err(TableError::InvalidOp {
                    reason: "new column name is empty".to_string(),
                });
            }
            if table.columns.iter().enumerate().any(|(i, c)| i != idx && *c == to) {
                return Err(TableError::InvalidOp {
                    reason: format!("column '{to}' already exists"),
                });
            }
            table.columns[idx] = to;
        }
        TableOp::SetCell { row, column, value } => {
            let idx = table.column_index(column)?;
            if *row >= table.rows.len() {
                return Err(TableError::RowOutOfBounds {
                    row: *row,
                    rows: table.rows.len(),
                });
            }
            table.rows[*row][idx] = value.clone();
        }
        TableOp::UpdateWhere { column, equals, set_column, set_value } => {
            let match_idx = table.column_index(column)?;
            let set_idx = table.column_index(set_column)?;
            for row in &mut table.rows {
                if values_equal(&row[match_idx], equals) {
                    row[set_idx] = set_value.clone();
                }
            }
        }
        TableOp::DeleteRows { column, equals } => {
            let idx = table.column_index(column)?;
            table.rows.retain(|row| !values_equal(&row[idx], equals));
        }
        TableOp::FilterRows { column, equals } => {
            let idx = table.column_index(column)?;
            table.rows.retain(|row| values_equal(&row[idx], equals));
        }
        TableOp::SortBy { column, descending } => {
            let idx = table.column_index(column)?;
            table.rows.sort_by(|a, b| {
                let ord = compare_values(&a[idx], &b[idx]);
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
    }
    Ok(())
}

/// Equality for matching: case-insensitive for text, exact otherwise.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.eq_ignore_ascii_case(y),
        _ => a == b,
    }
}

/// Sort order: nulls last, then bools, numbers, text.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Value::Text(x), Value::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        // Mixed types group by kind.
        (Value::Bool(_), _) => Ordering::Less,
        (_, Value::Bool(_)) => Ordering::Greater,
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
    }
}
