//! Error types for the simulation.

use crate::types::Location;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter name: {0}")]
    InvalidParameterName(String),

    #[error("Invalid value {value} for parameter {name}: must be finite and non-negative")]
    InvalidParameterValue { name: String, value: f64 },

    #[error("Unknown species: {0}")]
    UnknownSpecies(String),

    #[error("Unknown terrain code '{symbol}' at row {row}, column {col}")]
    UnknownTerrain { symbol: char, row: usize, col: usize },

    #[error("Island map is empty")]
    EmptyMap,

    #[error("Row {row} has length {found}, expected {expected}: all map rows must have the same length")]
    UnequalRowLengths {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Island is not surrounded by water: found '{symbol}' at row {row}, column {col}")]
    OpenBoundary { symbol: char, row: usize, col: usize },

    #[error("Location {0} is outside the island map")]
    InvalidLocation(Location),

    #[error("Location {0} is not passable and cannot hold animals")]
    ImpassableLocation(Location),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = Error::UnknownTerrain {
            symbol: 'X',
            row: 2,
            col: 3,
        };
        assert_eq!(
            err.to_string(),
            "Unknown terrain code 'X' at row 2, column 3"
        );

        let err = Error::InvalidParameterValue {
            name: "beta".to_string(),
            value: -1.0,
        };
        assert!(err.to_string().contains("beta"));

        let err = Error::ImpassableLocation(Location::new(1, 1));
        assert!(err.to_string().contains("(1, 1)"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: Error = bad.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
