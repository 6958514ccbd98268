//! Per-upload editing session with history and undo.

use serde::Serialize;

use crate::errors::{TableError, TableResult};
use crate::table::DataTable;

/// One committed state of the table.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// What produced this state ("Initial upload", op descriptions, ...)
    pub action: String,
    /// The table after the action
    pub table: DataTable,
}

/// An uploaded table plus its edit history and any staged preview.
///
/// Changes are two-phase: `stage` parks the modified table as a preview,
/// `apply` commits it to history. `undo` pops history but never removes
/// the initial upload.
#[derive(Debug, Clone)]
pub struct Workbook {
    /// Original file name, kept for the download endpoint
    pub file_name: String,
    history: Vec<HistoryEntry>,
    preview: Option<(String, DataTable)>,
}

impl Workbook {
    /// Start a session from an uploaded table.
    pub fn new(file_name: impl Into<String>, mut table: DataTable) -> Self {
        table.normalize_categorical();
        Self {
            file_name: file_name.into(),
            history: vec![HistoryEntry {
                action: "Initial upload".to_string(),
                table,
            }],
            preview: None,
        }
    }

    /// The current committed table.
    pub fn current(&self) -> &DataTable {
        // history always holds at least the initial upload
        &self.history[self.history.len() - 1]
            .table
    }

    /// The staged preview, if any.
    pub fn preview(&self) -> Option<&DataTable> {
        self.preview.as_ref().map(|(_, table)| table)
    }

    /// Stage a modified table as the pending change, replacing any previous
    /// preview.
    pub fn stage(&mut self, action: impl Into<String>, mut table: DataTable) {
        table.normalize_categorical();
        self.preview = Some((action.into(), table));
    }

    /// Commit the staged preview to history.
    pub fn apply(&mut self) -> TableResult<&DataTable> {
        let (action, table) = self.preview.take().ok_or(TableError::NoPreview)?;
        self.history.push(HistoryEntry { action, table });
        Ok(self.current())
    }

    /// Discard the staged preview without committing.
    pub fn discard(&mut self) {
        self.preview = None;
    }

    /// Revert the last committed change. The initial upload is never undone.
    pub fn undo(&mut self) -> TableResult<&DataTable> {
        if self.history.len() <= 1 {
            return Err(TableError::NothingToUndo);
        }
        self.history.pop();
        self.preview = None;
        Ok(self.current())
    }

    /// Action strings in commit order.
    pub fn log(&self) -> Vec<&str> {
        self.history.iter().map(|e| e.action.as_str()).collect()
    }

    /// Number of committed states, including the initial upload.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
