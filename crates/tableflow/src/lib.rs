#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

//! # tableflow
//!
//! Natural-language tabular editing.
//!
//! A user uploads a CSV or JSON table, types an instruction, and the LLM
//! translates it into a typed operation plan. The plan is validated against
//! the table, applied to produce a preview, and committed (or undone)
//! against a per-session history. Chart builders produce plottable data
//! from the current table.

pub mod charts;
pub mod ops;
pub mod planner;
pub mod table;
pub mod workbook;

mod errors;

pub use errors::{TableError, TableResult};
pub use ops::{apply_ops, TableOp};
pub use planner::Planner;
pub use table::{DataTable, Value};
pub use workbook::{HistoryEntry, Workbook};
