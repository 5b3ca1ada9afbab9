//! Shared deterministic types passed between the run loop and the pipeline.

use crate::core::statement::Statement;

/// Rows returned by a backend, every value rendered as text (`NULL` as `"NULL"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowSet {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            fields: Vec::new(),
            rows,
        }
    }

    /// A single-row, single-column result.
    pub fn cell(value: impl Into<String>) -> Self {
        Self::new(vec![vec![value.into()]])
    }

    pub fn first_cell(&self) -> Option<&str> {
        self.rows.first()?.first().map(String::as_str)
    }
}

/// Per-query dispatch decision, derived from the mode state at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub statement: Statement,
    /// Run against the target (Vitess).
    pub target: bool,
    /// Run against the reference (MySQL).
    pub reference: bool,
    /// Accept the target's result as baseline instead of comparing.
    pub capture_reference: bool,
}

impl ExecutionRequest {
    pub fn is_select(&self) -> bool {
        self.statement.is_select()
    }

    pub fn is_dml(&self) -> bool {
        self.statement.is_dml()
    }

    pub fn sql(&self) -> &str {
        &self.statement.sql
    }
}
