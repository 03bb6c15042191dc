//! The two-process bootstrap: a parent that spawns the container init into
//! fresh namespaces and grants it an identity from the outside, and the
//! child that takes over the rootfs and execs the entrypoint.

#[cfg(target_os = "linux")]
pub mod child;
#[cfg(target_os = "linux")]
pub mod fork;
#[cfg(target_os = "linux")]
pub mod parent;

use crate::error::Result;
use crate::state::StateStore;

/// Launches the recorded container and waits for it, returning the exit
/// code to report.
#[cfg(target_os = "linux")]
pub fn start(store: &StateStore, id: &str) -> Result<i32> {
    parent::start(store, id)
}

#[cfg(not(target_os = "linux"))]
pub fn start(_store: &StateStore, _id: &str) -> Result<i32> {
    Err(crate::error::Error::UnsupportedPlatform)
}

/// Entry point for the hidden `__child_init` subcommand. Never returns on
/// success; the process image is replaced by the container entrypoint.
#[cfg(target_os = "linux")]
pub fn child_init(store: &StateStore, id: &str) -> Result<()> {
    child::init(store, id, &*crate::syscall::create_syscall())
}

#[cfg(not(target_os = "linux"))]
pub fn child_init(_store: &StateStore, _id: &str) -> Result<()> {
    Err(crate::error::Error::UnsupportedPlatform)
}
