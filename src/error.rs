//! Crate-wide error taxonomy.

use thiserror::Error;

/// Everything that can go wrong emitting, buffering, or executing machine
/// code.
#[derive(Error, Debug)]
pub enum MachCodeError {
    /// A buffer grow or heap allocation failed because the system is out of
    /// memory.
    #[error("out of memory")]
    OutOfMemory,

    /// A memory-mapping syscall failed for a reason other than
    /// out-of-memory.
    #[error("system error: {0}")]
    SystemError(#[source] SystemErrorKind),

    /// A persistent-buffer write or offset query failed.
    #[error("io error: {0}")]
    Io(#[source] std::io::Error),

    /// A caller passed a value the API cannot accept: a null stream handle,
    /// or an unknown JIT target name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An encoder method whose target-specific encoding has not yet been
    /// implemented, or a target excluded at build time.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A caller misused the API in a way no input could make well-formed:
    /// e.g. requesting `data()` on a persistent buffer.
    #[error("logic error: {0}")]
    LogicError(&'static str),
}

/// The wrapped cause of a [`MachCodeError::SystemError`].
#[derive(Error, Debug)]
pub enum SystemErrorKind {
    /// The OS reported an error mapping, growing, or unmapping memory.
    #[error(transparent)]
    Os(#[from] std::io::Error),

    /// Neither in-place remap nor copy-and-reallocate grew the executable
    /// buffer on this platform.
    #[error("growth mechanism not implemented on this platform")]
    NotImplemented,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MachCodeError>;
