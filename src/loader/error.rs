//! Load errors.

use crate::core::ConditionError;
use thiserror::Error;

/// Errors that prevent a definition from loading at all.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("States table defines no states")]
    NoStates,

    #[error("Transitions table has no header row")]
    MissingHeader,
}

/// A problem with one row or column. Loading always continues; the
/// offending item is skipped unless noted otherwise.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RowError {
    #[error("Row {row}: state '{name}' defined twice; keeping the later definition")]
    DuplicateState { row: usize, name: String },

    #[error("Column {column}: invalid channel declaration '{header}'")]
    InvalidChannel { column: usize, header: String },

    #[error("Row {row}: ignoring transition from undefined state '{home}'")]
    UndefinedHome { row: usize, home: String },

    #[error("Row {row}: ignoring transition to undefined state '{dest}'")]
    UndefinedDest { row: usize, dest: String },

    /// The row is kept; each bad expression evaluates to false.
    #[error(
        "Row {row}: transition '{home}' --> '{dest}' has unhandled conditions: {}",
        format_errors(.errors)
    )]
    InvalidConditions {
        row: usize,
        home: String,
        dest: String,
        errors: Vec<ConditionError>,
    },

    #[error("Row {row}: transition '{home}' --> '{dest}' has no conditions; a transition must have at least one condition")]
    NoConditions { row: usize, home: String, dest: String },
}

fn format_errors(errors: &[ConditionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Rows and columns skipped while loading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub errors: Vec<RowError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn push(&mut self, error: RowError) {
        tracing::error!("{error}");
        self.errors.push(error);
    }
}
