//! Handles the creation of a new container record.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use nix::unistd;

use crate::error::{Error, Result};
use crate::oci::Spec;
use crate::rootless;
use crate::state::{StateStore, CONFIG_FILE};

#[derive(Parser, Debug)]
pub struct Create {
    /// Name of the container instance to create
    pub container_id: String,
    /// Path to the bundle directory, containing config.json and the root
    /// filesystem
    #[arg(short, long, default_value = ".")]
    pub bundle: PathBuf,
    /// File to additionally write the container pid to at start
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}

impl Create {
    pub fn exec(&self, root_path: &Path) -> Result<()> {
        // Validation first: a bad id or bundle must not leave anything
        // behind under the state root.
        validate_id(&self.container_id)?;

        let bundle = fs::canonicalize(&self.bundle).map_err(|cause| Error::BadBundle {
            path: self.bundle.clone(),
            cause,
        })?;
        let mut spec = Spec::load(bundle.join(CONFIG_FILE))?;
        spec.validate()?;

        // An arbitrary bundle becomes launchable by this (unprivileged)
        // user: user namespace plus identity mappings onto ourselves.
        rootless::rewrite(
            &mut spec,
            unistd::geteuid().as_raw(),
            unistd::getegid().as_raw(),
        );

        let store = StateStore::new(root_path);
        store.put(&self.container_id, &spec, &bundle)?;
        if let Some(pid_file) = &self.pid_file {
            store.record_pid_file_path(&self.container_id, pid_file)?;
        }

        log::info!(
            "created container {} from bundle {:?}",
            self.container_id,
            bundle
        );
        Ok(())
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidSpec("container id required".to_string()));
    }
    if id == "." || id == ".." || id.contains('/') || id.contains('\0') {
        return Err(Error::InvalidSpec(format!(
            "container id {:?} is not a valid directory name",
            id
        )));
    }
    Ok(())
}
