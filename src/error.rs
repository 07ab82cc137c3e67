use std::fmt;

use thiserror::Error;

/// The three input tables the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Matches,
    Predictions,
    Odds,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Matches, Table::Predictions, Table::Odds];

    pub fn name(self) -> &'static str {
        match self {
            Table::Matches => "matches",
            Table::Predictions => "predictions",
            Table::Odds => "odds",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputContract,
    Config,
    Internal,
}

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("{table} row {}: {message}", row_label(.row, .field))]
    InputContract {
        table: Table,
        row: Option<usize>,
        field: Option<String>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl BacktestError {
    pub fn contract(
        table: Table,
        row: usize,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        BacktestError::InputContract {
            table,
            row: Some(row),
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn table_contract(table: Table, message: impl Into<String>) -> Self {
        BacktestError::InputContract {
            table,
            row: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BacktestError::InputContract { .. } | BacktestError::Csv(_) => {
                ErrorKind::InputContract
            }
            BacktestError::Config(_) => ErrorKind::Config,
            BacktestError::Internal(_)
            | BacktestError::Io(_)
            | BacktestError::Json(_)
            | BacktestError::Sqlite(_) => ErrorKind::Internal,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::InputContract => 1,
            ErrorKind::Config => 2,
            ErrorKind::Internal => 3,
        }
    }
}

fn row_label(row: &Option<usize>, field: &Option<String>) -> String {
    match (row, field.as_deref()) {
        (Some(row), Some(field)) => format!("{row} field `{field}`"),
        (Some(row), None) => row.to_string(),
        (None, Some(field)) => format!("? field `{field}`"),
        (None, None) => "?".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, BacktestError>;

#[cfg(test)]
mod tests {
    use super::{BacktestError, ErrorKind, Table};

    #[test]
    fn exit_codes_follow_error_kind() {
        let contract = BacktestError::contract(Table::Odds, 3, "odds_1x2", "not a number");
        assert_eq!(contract.kind(), ErrorKind::InputContract);
        assert_eq!(contract.exit_code(), 1);
        assert_eq!(BacktestError::Config("bad".into()).exit_code(), 2);
        assert_eq!(BacktestError::Internal("oops".into()).exit_code(), 3);
    }

    #[test]
    fn contract_message_names_row_and_field() {
        let err = BacktestError::contract(Table::Matches, 7, "home_score", "negative score");
        assert_eq!(
            err.to_string(),
            "matches row 7 field `home_score`: negative score"
        );
    }
}
