//! Coroutine errors

use thiserror::Error;

use super::state::CoroutineId;

/// Coroutine result
pub type CoroutineResult<T> = Result<T, CoroutineError>;

/// Coroutine errors
#[derive(Debug, Error)]
pub enum CoroutineError {
    #[error("new coroutine requires a body")]
    Construction,

    #[error("dead coroutine called: {0}")]
    Dead(CoroutineId),

    #[error("double resume: {0} is already being resumed")]
    DoubleResume(CoroutineId),

    #[error("not inside a coroutine")]
    NoCurrent,

    #[error("failed to spawn coroutine worker: {0}")]
    Spawn(#[from] std::io::Error),
}
