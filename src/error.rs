use thiserror::Error;

use crate::models::ColumnRole;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("missing required columns: {}", join_roles(.roles))]
    MissingColumns { roles: Vec<ColumnRole> },

    #[error("sheet '{sheet}' has no rows")]
    EmptySheet { sheet: String },

    #[error("sheet '{sheet}' appears more than once in the batch")]
    DuplicateSheet { sheet: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn join_roles(roles: &[ColumnRole]) -> String {
    roles
        .iter()
        .map(|role| role.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single cell whose date could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot convert '{raw}' to a date: {reason}")]
pub struct UnconvertibleValue {
    pub raw: String,
    pub reason: &'static str,
}

impl UnconvertibleValue {
    pub fn new(raw: impl Into<String>, reason: &'static str) -> Self {
        Self {
            raw: raw.into(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_message_names_roles() {
        let err = EngineError::MissingColumns {
            roles: vec![ColumnRole::Date, ColumnRole::Status],
        };
        assert_eq!(err.to_string(), "missing required columns: DATA, STATUS");
    }

    #[test]
    fn io_errors_convert() {
        let err = EngineError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
