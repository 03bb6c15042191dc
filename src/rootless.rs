//! Rootless-mode spec handling: validation before any fork, the create-time
//! rewrite that makes an arbitrary bundle launchable by an unprivileged
//! user, and discovery of the setuid mapping helpers.

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::oci::{Linux, LinuxIdMapping, LinuxNamespace, LinuxNamespaceType, Spec};

#[derive(Debug, Clone)]
pub struct Rootless {
    /// Location of the newuidmap binary, when present on PATH.
    pub newuidmap: Option<PathBuf>,
    /// Location of the newgidmap binary, when present on PATH.
    pub newgidmap: Option<PathBuf>,
    pub uid_mappings: Vec<LinuxIdMapping>,
    pub gid_mappings: Vec<LinuxIdMapping>,
}

impl Rootless {
    /// Validates the spec and captures everything the bootstrap parent
    /// needs to install ID mappings from outside the child's namespace.
    pub fn detect(spec: &Spec) -> Result<Self> {
        validate(spec)?;
        let linux = spec
            .linux
            .as_ref()
            .ok_or_else(|| Error::InvalidState("spec has no linux block".to_string()))?;

        Ok(Self {
            newuidmap: lookup_map_binary("newuidmap"),
            newgidmap: lookup_map_binary("newgidmap"),
            uid_mappings: linux.uid_mappings.clone(),
            gid_mappings: linux.gid_mappings.clone(),
        })
    }

    /// Both helpers must be present to take the setuid-helper path; a lone
    /// one is useless.
    pub fn map_binaries(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.newuidmap, &self.newgidmap) {
            (Some(uid), Some(gid)) => Some((uid, gid)),
            _ => None,
        }
    }
}

/// A rootless launch requires a user namespace and at least one mapping on
/// each side; anything else would leave the child without a usable identity.
/// Runs before the parent forks anything.
pub fn validate(spec: &Spec) -> Result<()> {
    let linux = spec
        .linux
        .as_ref()
        .ok_or_else(|| Error::InvalidState("spec has no linux block".to_string()))?;

    if !spec.has_namespace(LinuxNamespaceType::User) {
        return Err(Error::InvalidState(
            "rootless containers require a user namespace in the spec".to_string(),
        ));
    }
    if linux.uid_mappings.is_empty() {
        return Err(Error::InvalidState(
            "rootless containers require at least one uid mapping".to_string(),
        ));
    }
    if linux.gid_mappings.is_empty() {
        return Err(Error::InvalidState(
            "rootless containers require at least one gid mapping".to_string(),
        ));
    }

    Ok(())
}

/// Create-time rewrite: appends a user namespace when the bundle does not
/// declare one and installs single-entry identity mappings onto the calling
/// user. Applying it to an already-rewritten spec changes nothing.
pub fn rewrite(spec: &mut Spec, host_uid: u32, host_gid: u32) {
    let linux = spec.linux.get_or_insert_with(Linux::default);

    if !linux
        .namespaces
        .iter()
        .any(|ns| ns.typ == LinuxNamespaceType::User)
    {
        log::debug!("appending user namespace for rootless mode");
        linux.namespaces.push(LinuxNamespace {
            typ: LinuxNamespaceType::User,
        });
    }

    if linux.uid_mappings.is_empty() {
        linux.uid_mappings.push(LinuxIdMapping {
            container_id: 0,
            host_id: host_uid,
            size: 1,
        });
        spec.process.no_new_privileges = false;
    }
    if linux.gid_mappings.is_empty() {
        linux.gid_mappings.push(LinuxIdMapping {
            container_id: 0,
            host_id: host_gid,
            size: 1,
        });
        spec.process.no_new_privileges = false;
    }
}

fn lookup_map_binary(binary: &str) -> Option<PathBuf> {
    let paths = env::var("PATH").ok()?;
    paths
        .split_terminator(':')
        .map(|p| PathBuf::from(p).join(binary))
        .find(|candidate| candidate.is_file())
}
