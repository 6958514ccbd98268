//! Chart data builders.
//!
//! The service returns plottable data rather than rendered charts; the UI
//! decides how to draw it.

use std::collections::HashMap;

use serde::Serialize;

use crate::errors::{TableError, TableResult};
use crate::table::{ColumnSummary, DataTable, Value};

/// Equal-width histogram of a numeric column.
#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    pub column: String,
    /// Left edge of each bin; the last bin is closed on the right
    pub bin_edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Count per distinct value of a column.
#[derive(Debug, Clone, Serialize)]
pub struct ValueCounts {
    pub column: String,
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
}

/// Categorical × categorical contingency table.
#[derive(Debug, Clone, Serialize)]
pub struct Crosstab {
    pub rows_column: String,
    pub cols_column: String,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// counts[i][j] pairs row_labels[i] with col_labels[j]
    pub counts: Vec<Vec<usize>>,
}

/// Pearson correlation over the table's numeric columns.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// values[i][j] is the correlation of columns[i] with columns[j]
    pub values: Vec<Vec<f64>>,
}

/// Build a histogram over `column` with `bins` equal-width bins.
pub fn histogram(table: &DataTable, column: &str, bins: usize) -> TableResult<Histogram> {
    if bins == 0 {
        return Err(TableError::Chart {
            reason: "bin count must be at least 1".to_string(),
        });
    }
    let idx = table.column_index(column)?;
    if !table.is_numeric_column(idx) {
        return Err(TableError::Chart {
            reason: format!("column '{column}' is not numeric"),
        });
    }

    let values = table.numeric_values(idx);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let width = if max > min { (max - min) / bins as f64 } else { 1.0 };
    let bin_edges: Vec<f64> = (0..=bins).map(|i| min + width * i as f64).collect();

    let mut counts = vec![0usize; bins];
    for v in values {
        let mut bin = ((v - min) / width) as usize;
        if bin >= bins {
            bin = bins - 1;
        }
        counts[bin] += 1;
    }

    Ok(Histogram {
        column: table.columns[idx].clone(),
        bin_edges,
        counts,
    })
}

/// Count occurrences of each distinct value, descending, ties by label.
/// Null cells count under an empty label.
pub fn value_counts(table: &DataTable, column: &str) -> TableResult<ValueCounts> {
    let idx = table.column_index(column)?;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in &table.rows {
        *counts.entry(row[idx].to_string()).or_default() += 1;
    }

    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let (labels, counts) = pairs.into_iter().unzip();
    Ok(ValueCounts {
        column: table.columns[idx].clone(),
        labels,
        counts,
    })
}

/// Numeric summary for one column.
pub fn summary_stats(table: &DataTable, column: &str) -> TableResult<ColumnSummary> {
    table.summary(column)
}

/// Contingency counts of `col_a` values against `col_b` values.
pub fn crosstab(table: &DataTable, col_a: &str, col_b: &str) -> TableResult<Crosstab> {
    let idx_a = table.column_index(col_a)?;
    let idx_b = table.column_index(col_b)?;

    let mut row_labels: Vec<String> = Vec::new();
    let mut col_labels: Vec<String> = Vec::new();
    for row in &table.rows {
        let a = row[idx_a].to_string();
        let b = row[idx_b].to_string();
        if !row_labels.contains(&a) {
            row_labels.push(a);
        }
        if !col_labels.contains(&b) {
            col_labels.push(b);
        }
    }
    row_labels.sort();
    col_labels.sort();

    let mut counts = vec![vec![0usize; col_labels.len()]; row_labels.len()];
    for row in &table.rows {
        let a = row[idx_a].to_string();
        let b = row[idx_b].to_string();
        // labels were collected from these same rows
        if let (Some(i), Some(j)) = (
            row_labels.iter().position(|l| *l == a),
            col_labels.iter().position(|l| *l == b),
        ) {
            counts[i][j] += 1;
        }
    }

    Ok(Crosstab {
        rows_column: table.columns[idx_a].clone(),
        cols_column: table.columns[idx_b].clone(),
        row_labels,
        col_labels,
        counts,
    })
}

/// Pearson correlation over every numeric column pair. Requires at least
/// two numeric columns.
pub fn correlation_matrix(table: &DataTable) -> TableResult<CorrelationMatrix> {
    let numeric: Vec<usize> = (0..table.columns.len())
        .filter(|&i| table.is_numeric_column(i))
        .collect();
    if numeric.len() < 2 {
        return Err(TableError::Chart {
            reason: "correlation needs at least two numeric columns".to_string(),
        });
    }

    let columns: Vec<String> = numeric.iter().map(|&i| table.columns[i].clone()).collect();

    // Pairwise over rows where both cells are numbers.
    let mut values = vec![vec![0.0f64; numeric.len()]; numeric.len()];
    for (i, &a) in numeric.iter().enumerate() {
        for (j, &b) in numeric.iter().enumerate() {
            values[i][j] = if i == j {
                1.0
            } else {
                pearson(table, a, b)
            };
        }
    }

    Ok(CorrelationMatrix { columns, values })
}

fn pearson(table: &DataTable, a: usize, b: usize) -> f64 {
    let pairs: Vec<(f64, f64)> = table
        .rows
        .iter()
        .filter_map(|row| match (&row[a], &row[b]) {
            (Value::Number(x), Value::Number(y)) => Some((*x, *y)),
            _ => None,
        })
        .collect();

    let n = pairs.len();
    if n < 2 {
        return 0.0;
    }

    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        cov / denom
    }
}
