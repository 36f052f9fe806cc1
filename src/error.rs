//! Error taxonomy for the reconciliation core.
//!
//! Command-level code wraps these in `anyhow` with context; the core itself
//! only ever fails on configuration problems; malformed cell values are
//! coerced to null by the normalizer instead of raising.

use std::fmt;

use crate::schema::ColumnType;

/// Which dataset a schema problem was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Previous,
    Current,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Previous => write!(f, "previous"),
            Side::Current => write!(f, "current"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// No key columns were selected, or a selected key is absent from a side.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A key column resolved to different types on the two sides.
    #[error(
        "type mismatch for key column '{column}': previous is {previous} but current is {current}"
    )]
    TypeMismatch {
        column: String,
        previous: ColumnType,
        current: ColumnType,
    },

    /// A key column was missing from a row handed to the key builder.
    #[error("schema error: key column '{column}' not found in {side} row")]
    Schema { column: String, side: Side },
}

impl ReconcileError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ReconcileError::Configuration(message.into())
    }
}
