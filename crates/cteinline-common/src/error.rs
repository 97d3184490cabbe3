use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by the inlining engine.
///
/// Declining to inline a CTE is never reported through this type; every
/// variant means the input or the engine itself is broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("could not find cte: {name} in the query")]
    CteNotFound { name: String },
    #[error("reference count mismatch for cte {name}: expected {expected}, found {actual}")]
    ReferenceCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Corrupt query tree: {0}")]
    CorruptTree(String),
    #[error("Invalid query tree: {0}")]
    InvalidQuery(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn cte_not_found(name: impl Into<String>) -> Self {
        Error::CteNotFound { name: name.into() }
    }

    pub fn reference_count_mismatch(
        name: impl Into<String>,
        expected: usize,
        actual: usize,
    ) -> Self {
        Error::ReferenceCountMismatch {
            name: name.into(),
            expected,
            actual,
        }
    }

    pub fn corrupt_tree(msg: impl Into<String>) -> Self {
        Error::CorruptTree(msg.into())
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Error::InvalidQuery(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    pub fn is_invariant_violation(&self) -> bool {
        match self {
            Error::CteNotFound { .. }
            | Error::ReferenceCountMismatch { .. }
            | Error::CorruptTree(_) => true,
            Error::InvalidQuery(_) | Error::Internal(_) => false,
        }
    }
}
