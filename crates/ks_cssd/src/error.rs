use std::fmt;

use ks_structure::ModelError;

/// Error type for CSSD compilation.
///
/// `Grammar` errors are the normal rejection path for bad notation and carry
/// a 1-based source position where one is defined. `Inconsistency` means the
/// validator accepted something the builder cannot handle; that is a defect
/// in this crate, never a property of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssdError {
    /// Missing, oversized, or lexically invalid input.
    Input(String),

    /// A structural rule violation.
    Grammar {
        message: String,
        position: Option<usize>,
    },

    /// A fixed capacity (scratch table, output string) was exceeded.
    Capacity(String),

    /// Validator and builder disagree about the input.
    Inconsistency(String),

    /// The model arena is exhausted.
    Allocation(String),
}

impl CssdError {
    pub(crate) fn grammar(message: impl Into<String>) -> Self {
        CssdError::Grammar {
            message: message.into(),
            position: None,
        }
    }

    pub(crate) fn grammar_at(message: impl Into<String>, position: usize) -> Self {
        CssdError::Grammar {
            message: message.into(),
            position: Some(position),
        }
    }

    /// The 1-based source position the error points at, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            CssdError::Grammar { position, .. } => *position,
            _ => None,
        }
    }
}

impl fmt::Display for CssdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CssdError::Input(msg) => write!(f, "{msg}"),
            CssdError::Grammar { message, .. } => write!(f, "{message}"),
            CssdError::Capacity(msg) => write!(f, "capacity exceeded: {msg}"),
            CssdError::Inconsistency(msg) => write!(f, "internal inconsistency: {msg}"),
            CssdError::Allocation(msg) => write!(f, "allocation failure: {msg}"),
        }
    }
}

impl std::error::Error for CssdError {}

impl From<ModelError> for CssdError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Arena(msg) => CssdError::Allocation(msg),
            ModelError::Link(msg) => CssdError::Inconsistency(msg),
        }
    }
}
