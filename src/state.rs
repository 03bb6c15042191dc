//! On-disk container records.
//!
//! One directory per container under the base path:
//!
//! ```text
//! <base>/<id>/config.json    - possibly-rewritten OCI spec
//! <base>/<id>/bundle.path    - absolute bundle directory
//! <base>/<id>/pid            - decimal host PID, written once at start
//! <base>/<id>/pidfile.path   - optional user-requested pid-file path
//! ```
//!
//! There is no in-process locking; verbs touch disjoint record paths and
//! the filesystem is the arbiter for the races the design allows.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::oci::Spec;

pub const CONFIG_FILE: &str = "config.json";
pub const BUNDLE_PATH_FILE: &str = "bundle.path";
pub const PID_FILE: &str = "pid";
pub const PID_FILE_PATH_FILE: &str = "pidfile.path";

#[derive(Debug, Clone)]
pub struct StateStore {
    base: PathBuf,
}

impl StateStore {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn record_dir(&self, id: &str) -> PathBuf {
        self.base.join(id)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.record_dir(id).is_dir()
    }

    /// Creates the record for `id`. The record directory must not already
    /// exist; a lost creation race surfaces as `AlreadyExists` as well.
    pub fn put(&self, id: &str, spec: &Spec, bundle: &Path) -> Result<()> {
        fs::create_dir_all(&self.base).map_err(|cause| Error::StateIo {
            path: self.base.clone(),
            cause,
        })?;

        let dir = self.record_dir(id);
        if let Err(cause) = fs::create_dir(&dir) {
            if cause.kind() == io::ErrorKind::AlreadyExists {
                return Err(Error::AlreadyExists(id.to_string()));
            }
            return Err(Error::StateIo { path: dir, cause });
        }

        spec.save(dir.join(CONFIG_FILE))?;
        write_text(&dir.join(BUNDLE_PATH_FILE), &bundle.to_string_lossy())?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<(Spec, PathBuf)> {
        let dir = self.record_dir(id);
        if !dir.is_dir() {
            return Err(Error::NotFound(id.to_string()));
        }

        let spec = Spec::load(dir.join(CONFIG_FILE))?;
        let bundle = self.read_bundle_path(id)?;
        Ok((spec, bundle))
    }

    pub fn read_bundle_path(&self, id: &str) -> Result<PathBuf> {
        let path = self.record_dir(id).join(BUNDLE_PATH_FILE);
        let raw = fs::read_to_string(&path).map_err(|cause| Error::StateIo {
            path: path.clone(),
            cause,
        })?;
        Ok(PathBuf::from(raw.trim_end()))
    }

    pub fn record_pid(&self, id: &str, pid: i32) -> Result<()> {
        write_text(&self.record_dir(id).join(PID_FILE), &pid.to_string())
    }

    /// Reads the recorded PID. A missing file is `Ok(None)` (a legal
    /// `created` record); an unreadable or unparsable file is an error the
    /// caller decides how to downgrade.
    pub fn read_pid(&self, id: &str) -> Result<Option<i32>> {
        let path = self.record_dir(id).join(PID_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(cause) => return Err(Error::StateIo { path, cause }),
        };
        let pid = raw.trim().parse::<i32>().map_err(|e| Error::StateIo {
            path,
            cause: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        Ok(Some(pid))
    }

    pub fn remove_pid(&self, id: &str) -> Result<()> {
        let path = self.record_dir(id).join(PID_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(cause) => Err(Error::StateIo { path, cause }),
        }
    }

    pub fn record_pid_file_path(&self, id: &str, pid_file: &Path) -> Result<()> {
        write_text(
            &self.record_dir(id).join(PID_FILE_PATH_FILE),
            &pid_file.to_string_lossy(),
        )
    }

    pub fn read_pid_file_path(&self, id: &str) -> Option<PathBuf> {
        fs::read_to_string(self.record_dir(id).join(PID_FILE_PATH_FILE))
            .ok()
            .map(|raw| PathBuf::from(raw.trim_end()))
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let dir = self.record_dir(id);
        if !dir.is_dir() {
            return Err(Error::NotFound(id.to_string()));
        }
        fs::remove_dir_all(&dir).map_err(|cause| Error::StateIo { path: dir, cause })
    }

    /// Ids of all records, in directory order. A missing base path means no
    /// containers were ever created and yields an empty listing.
    pub fn ids(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(cause) => {
                return Err(Error::StateIo {
                    path: self.base.clone(),
                    cause,
                })
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|cause| Error::StateIo {
                path: self.base.clone(),
                cause,
            })?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|cause| Error::StateIo {
        path: path.to_path_buf(),
        cause,
    })
}
