use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    InvalidGeometry(String),
    InvalidWindow(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidGeometry(msg) => {
                write!(f, "invalid geometry: {msg}")
            }
            ModelError::InvalidWindow(msg) => {
                write!(f, "invalid time window: {msg}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
