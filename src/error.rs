use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// One failing row from validation. Every offending row is reported; the
/// validator never stops at the first failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    /// Table the row belongs to ("capex_items", "risks", ...).
    pub table: &'static str,
    /// Row id within that table.
    pub row: u64,
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}].{}: {}", self.table, self.row, self.field, self.message)
    }
}

/// Error taxonomy at the engine boundary. The enclosing service maps these
/// to its own transport codes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("validation failed with {} issue(s)", .0.len())]
    Validation(Vec<RowIssue>),

    #[error("dataset contains no capex items and no risks")]
    InsufficientData,

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("correlation factorisation failed (min eigenvalue {min_eigenvalue:.3e})")]
    Numeric { min_eigenvalue: f64 },

    #[error("simulation cancelled")]
    Cancelled,

    /// A bug, not a user-input problem: invariants broken after validation.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_issue_display_names_table_row_and_field() {
        let issue = RowIssue {
            table: "capex_items",
            row: 7,
            field: "p10",
            message: "must be strictly positive".to_string(),
        };
        assert_eq!(issue.to_string(), "capex_items[7].p10: must be strictly positive");
    }

    #[test]
    fn validation_error_reports_issue_count() {
        let err = SimulationError::Validation(vec![
            RowIssue { table: "risks", row: 1, field: "probability", message: "out of range".into() },
            RowIssue { table: "risks", row: 2, field: "impact_p10", message: "not finite".into() },
        ]);
        assert_eq!(err.to_string(), "validation failed with 2 issue(s)");
    }
}
