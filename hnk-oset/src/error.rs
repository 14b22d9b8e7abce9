use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsetError {
    #[error("depth {0} is empty or out of range")]
    EmptyDepth(i32),

    #[error("index {index} out of range for depth {depth} (count {count})")]
    IndexOutOfRange { depth: i32, index: usize, count: usize },

    #[error("max_depth must be >= 0, got {0}")]
    InvalidMaxDepth(i32),

    #[error("no candidate keys up to max_depth {0}")]
    NoCandidates(i32),
}

pub type OsetResult<T> = Result<T, OsetError>;
