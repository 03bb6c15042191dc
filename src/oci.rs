//! The subset of the [OCI runtime spec](https://github.com/opencontainers/runtime-spec)
//! this runtime consumes, deserialized from a bundle's `config.json`.
//!
//! Unknown fields are ignored on load; the persisted rewrite therefore only
//! carries the fields the runtime acts on.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    #[serde(default, rename = "ociVersion")]
    pub version: String,
    pub process: Process,
    pub root: Root,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<Linux>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cwd: String,
    #[serde(default)]
    pub no_new_privileges: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Root {
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default)]
    pub readonly: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    #[serde(default)]
    pub destination: PathBuf,
    #[serde(default, rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub source: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Linux {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uid_mappings: Vec<LinuxIdMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gid_mappings: Vec<LinuxIdMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<LinuxNamespace>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinuxIdMapping {
    #[serde(default, rename = "containerID")]
    pub container_id: u32,
    #[serde(default, rename = "hostID")]
    pub host_id: u32,
    #[serde(default)]
    pub size: u32,
}

/// Namespace kinds, with their discriminants chosen to match the kernel's
/// `CLONE_NEW*` bits so translation to clone flags is a cast.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinuxNamespaceType {
    Mount = 0x0002_0000,
    Cgroup = 0x0200_0000,
    Uts = 0x0400_0000,
    Ipc = 0x0800_0000,
    User = 0x1000_0000,
    Pid = 0x2000_0000,
    Network = 0x4000_0000,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinuxNamespace {
    #[serde(rename = "type")]
    pub typ: LinuxNamespaceType,
}

impl Spec {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|cause| Error::BadBundle {
            path: path.to_path_buf(),
            cause,
        })?;
        let spec: Spec = serde_json::from_reader(&file)
            .map_err(|e| Error::InvalidSpec(format!("{}: {}", path.display(), e)))?;
        Ok(spec)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|cause| Error::StateIo {
            path: path.to_path_buf(),
            cause,
        })?;
        serde_json::to_writer_pretty(&file, self)
            .map_err(|e| Error::InvalidSpec(format!("cannot serialize spec: {}", e)))?;
        Ok(())
    }

    /// Checks the properties every verb relies on. Runs at create time so a
    /// bad document never becomes a record.
    pub fn validate(&self) -> Result<()> {
        if self.process.args.is_empty() {
            return Err(Error::InvalidSpec(
                "process.args must contain at least the entrypoint".to_string(),
            ));
        }
        if self.root.path.as_os_str().is_empty() {
            return Err(Error::InvalidSpec("root.path must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn has_namespace(&self, kind: LinuxNamespaceType) -> bool {
        self.linux
            .as_ref()
            .map(|l| l.namespaces.iter().any(|ns| ns.typ == kind))
            .unwrap_or(false)
    }
}
