//! Shared error types for the search battle system

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SharedError {
    #[error("Unknown battle status: {value}")]
    UnknownStatus { value: String },
}
