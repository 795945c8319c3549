//! Error taxonomy for the render pipeline core.
//!
//! Kinds, not exceptions: every fallible construction path returns one of
//! these variants, and the coordinator always converts them to a
//! [`crate::request::RenderResult`] error string rather than letting them
//! unwind or kill the engine (see the coordinator's request-processing loop).

use thiserror::Error;

/// Error taxonomy for the render pipeline core.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Shared-memory create/ftruncate/mmap or temp-file mkstemp/mmap failed.
    #[error("resource allocation failed: {0}")]
    ResourceFailure(String),

    /// The Parser capability failed to build a display list or draw a section.
    #[error("parser failure: {0}")]
    ParserFailure(String),

    /// A task was submitted to a worker pool that already began shutting down.
    #[error("worker pool is shutting down")]
    PoolShutdown,

    /// Engine construction was requested with an invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
