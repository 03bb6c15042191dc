//! Container status as observed at listing time.
//!
//! Status is never stored; it is derived from the record's `pid` file and a
//! signal-0 liveness probe against the kernel.

use std::fmt;

use nix::sys::signal;
use nix::unistd::Pid;

use crate::error::Result;
use crate::state::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Stopped,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
        };
        s.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: String,
    pub status: ContainerStatus,
    /// Host PID of the init process while it is alive, 0 otherwise.
    pub pid: i32,
    pub bundle: String,
}

/// Kernel existence check: signal 0 delivers nothing but reports whether the
/// process is still known.
pub fn probe_liveness(pid: i32) -> bool {
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

/// Observes every record under the store. Records with unreadable state are
/// reported as `stopped` rather than dropped from the listing.
pub fn list(store: &StateStore) -> Result<Vec<ContainerInfo>> {
    let mut containers = Vec::new();

    for id in store.ids()? {
        let bundle = store
            .read_bundle_path(&id)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (status, pid) = match store.read_pid(&id) {
            Ok(None) => (ContainerStatus::Created, 0),
            Ok(Some(pid)) if probe_liveness(pid) => (ContainerStatus::Running, pid),
            Ok(Some(_)) => (ContainerStatus::Stopped, 0),
            Err(e) => {
                log::warn!("container {}: unreadable pid file: {}", id, e);
                (ContainerStatus::Stopped, 0)
            }
        };

        containers.push(ContainerInfo {
            id,
            status,
            pid,
            bundle,
        });
    }

    Ok(containers)
}
