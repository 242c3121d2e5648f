use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("no valid (finite) samples in {0}")]
    NoValidData(&'static str),

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("invalid window type: {0}")]
    InvalidWindow(String),

    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("least-squares system is singular: {0}")]
    Singular(String),

    #[error("index out of bounds: {0}")]
    OutOfBounds(String),
}

impl Error {
    pub(crate) fn shape(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::ShapeMismatch {
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }

    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
