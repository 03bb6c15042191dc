//! Thin wrapper around the clone syscall used to spawn the container init
//! process into its new namespaces.

use nix::sched::{self, CloneFlags};
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::error::{Error, Result};

/// Clones a child running `cb` with the given namespace flags. SIGCHLD is
/// requested so the parent can wait on the child like a forked process.
pub fn clone_child(cb: sched::CloneCb, clone_flags: CloneFlags) -> Result<Pid> {
    // clone requires the caller to provide the child's stack; 1 MiB is
    // plenty for the short path from callback to exec.
    const STACK_SIZE: usize = 1024 * 1024;
    let mut stack = vec![0u8; STACK_SIZE];

    let pid = unsafe {
        sched::clone(cb, &mut stack, clone_flags, Some(Signal::SIGCHLD as i32))
    }
    .map_err(|e| Error::SpawnFailed(format!("clone failed: {}", e)))?;

    Ok(pid)
}
