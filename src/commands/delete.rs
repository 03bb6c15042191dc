//! Terminates a container's init process and removes its record.

use std::path::Path;

use clap::Parser;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::{Error, Result};
use crate::state::StateStore;

#[derive(Parser, Debug)]
pub struct Delete {
    /// Name of the container instance to delete
    pub container_id: String,
}

impl Delete {
    pub fn exec(&self, root_path: &Path) -> Result<()> {
        let store = StateStore::new(root_path);
        if !store.exists(&self.container_id) {
            return Err(Error::NotFound(self.container_id.clone()));
        }

        match store.read_pid(&self.container_id) {
            Ok(Some(pid)) => kill_container(pid)?,
            Ok(None) => {}
            // A record with a corrupt pid file is still deletable.
            Err(e) => log::warn!(
                "container {}: unreadable pid file: {}",
                self.container_id,
                e
            ),
        }

        store.remove(&self.container_id)?;
        log::info!("deleted container {}", self.container_id);
        Ok(())
    }
}

/// SIGKILL the init process. A process that is already gone counts as
/// success; anything else is a hard failure and keeps the record.
fn kill_container(pid: i32) -> Result<()> {
    match signal::kill(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(cause) => Err(Error::SignalFailed {
            signal: "SIGKILL",
            pid,
            cause,
        }),
    }
}
