//! Starts a created container and waits for it to exit.

use std::path::Path;

use clap::Parser;

use crate::error::Result;
use crate::process;
use crate::state::StateStore;

#[derive(Parser, Debug)]
pub struct Start {
    /// Name of the container instance to start
    pub container_id: String,
}

impl Start {
    /// Returns the container's exit code; the process exits with it so
    /// callers observe the entrypoint's own status.
    pub fn exec(&self, root_path: &Path) -> Result<i32> {
        let store = StateStore::new(root_path);
        process::start(&store, &self.container_id)
    }
}
