use thiserror::Error;

/// Errors surfaced by the counting engine and its persistence layer.
#[derive(Error, Debug)]
pub enum HnkError {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Reserved for allocator-exhaustion paths surfaced by fallible
    /// collection APIs; unreachable in a hosted test environment.
    #[error("allocation failure")]
    AllocationFailure,

    #[error("shape mismatch: {reason}")]
    ShapeMismatch { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },
}

pub type HnkResult<T> = Result<T, HnkError>;
