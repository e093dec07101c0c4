//! Error types for the volatility matrix

use thiserror::Error;

use super::option::ContractType;

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("No {contract_type} contracts with a valid strike and expiration")]
    EmptyFilteredSet { contract_type: ContractType },

    #[error("None of the {records} {contract_type} contracts carries an underlying price")]
    MissingReferencePrice {
        contract_type: ContractType,
        records: usize,
    },

    #[error("Sort column {column} is out of range ({columns} expirations)")]
    InvalidSortTarget { column: usize, columns: usize },

    #[error("Upstream fetch failed: {0}")]
    UpstreamFetchFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type MatrixResult<T> = Result<T, MatrixError>;

impl MatrixError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamFetchFailed(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
