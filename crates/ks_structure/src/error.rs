use std::fmt;

/// Error type for model arena and linking operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The model arena is full.
    Arena(String),

    /// An element or constraint cannot be linked where requested.
    Link(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Arena(msg) => write!(f, "model arena exhausted: {msg}"),
            ModelError::Link(msg) => write!(f, "illegal model link: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}
