/*
 * Runtime Errors
 *
 * The reference implementation signals failure with sentinel negative
 * integers; callers that want that contract can use
 * Runtime::create_raw, but the idiomatic surface returns these instead.
 */

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("thread table is full ({max} threads already created)")]
    CapacityExceeded { max: usize },

    #[error("failed to create a host stack for the new thread")]
    StackCreationFailed,

    #[error("unknown semaphore id {0}")]
    UnknownSemaphore(u32),

    /// Reserved for a richer disk-channel simulation than this core implements.
    #[error("invalid disk block id {0}")]
    InvalidBlockId(u64),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
