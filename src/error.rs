//! Error taxonomy for the shared-memory frame channel

use std::time::Duration;

use nix::errno::Errno;
use thiserror::Error;

/// Failure while creating or attaching the cross-process resources
#[derive(Debug, Error)]
pub enum InitError {
    #[error("shared region {name:?}: {source}")]
    Region { name: String, source: Errno },

    #[error("shared region {name:?} is {actual} bytes, expected at least {expected}")]
    RegionSize {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("mapping shared region: {0}")]
    Map(#[source] std::io::Error),

    #[error("semaphore {name:?}: {source}")]
    Semaphore { name: String, source: Errno },
}

/// Per-call failure kind for a frame send
#[derive(Debug, Error)]
pub enum SendError {
    #[error("channel initialization failed: {0}")]
    Init(#[from] InitError),

    #[error("invalid bitmap: expected {expected} bytes for {width}x{height}, got {actual}")]
    InvalidInput {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("{width}x{height} frame needs {payload} bytes, region holds {capacity}")]
    FrameTooLarge {
        width: u32,
        height: u32,
        payload: usize,
        capacity: usize,
    },

    #[error("write lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("synchronization failure: {0}")]
    Sync(#[source] Errno),
}

/// Umbrella error returned by `Channel::send` once teardown has run.
///
/// Always carries the original cause; the channel re-initializes
/// transparently on the next call.
#[derive(Debug, Error)]
#[error("failed to send frame: {cause}")]
pub struct SendFailure {
    #[from]
    pub cause: SendError,
}

impl SendFailure {
    /// The underlying failure kind
    pub fn kind(&self) -> &SendError {
        &self.cause
    }
}
