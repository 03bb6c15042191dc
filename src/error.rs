//! The error taxonomy shared by all runtime components.
//!
//! Every variant renders with its kind token first (`BadBundle: …`) and
//! carries its cause in the message, so a failed verb produces a single
//! greppable diagnostic line.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("NotFound: container {0} does not exist")]
    NotFound(String),

    #[error("AlreadyExists: container {0} already exists")]
    AlreadyExists(String),

    #[error("InvalidSpec: {0}")]
    InvalidSpec(String),

    #[error("BadBundle: cannot read {path:?}: {cause}")]
    BadBundle {
        path: PathBuf,
        cause: std::io::Error,
    },

    #[error("InvalidState: {0}")]
    InvalidState(String),

    #[error("SpawnFailed: {0}")]
    SpawnFailed(String),

    #[error("MappingFailed: {0}")]
    MappingFailed(String),

    #[error("SyncPipeBroken: {0}")]
    SyncPipeBroken(String),

    #[error("ChildDiedEarly: container process exited with status {status} before the start signal")]
    ChildDiedEarly { status: i32 },

    #[error("NotRootInUserNs: effective uid inside the user namespace is {euid}, expected 0")]
    NotRootInUserNs { euid: u32 },

    #[error("PivotFailed: {step}: {cause}")]
    PivotFailed {
        step: &'static str,
        cause: nix::Error,
    },

    #[error("MountFatal: mount of {destination:?} failed: {cause}")]
    MountFatal {
        destination: PathBuf,
        cause: nix::Error,
    },

    #[error("CommandNotFound: {0} not found in PATH")]
    CommandNotFound(String),

    #[error("SignalFailed: sending {signal} to pid {pid}: {cause}")]
    SignalFailed {
        signal: &'static str,
        pid: i32,
        cause: nix::Error,
    },

    #[error("StateIOFailed: {path:?}: {cause}")]
    StateIo {
        path: PathBuf,
        cause: std::io::Error,
    },

    #[error("UnsupportedPlatform: containers can only be started on Linux hosts")]
    UnsupportedPlatform,
}

impl Error {
    /// Exit code the child init process reports for this error. The parent's
    /// wait propagates it as the outcome of `start`.
    pub fn child_exit_code(&self) -> i32 {
        match self {
            Error::CommandNotFound(_) => 127,
            _ => 1,
        }
    }
}
