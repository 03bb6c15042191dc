//! Translation of the spec's namespace list into the clone flags handed to
//! the kernel when the container init process is spawned.

use nix::sched::CloneFlags;

use crate::oci::LinuxNamespace;

pub struct Namespaces {
    pub clone_flags: CloneFlags,
}

impl From<&[LinuxNamespace]> for Namespaces {
    fn from(namespaces: &[LinuxNamespace]) -> Self {
        // The namespace type discriminants are the kernel's CLONE_NEW* bits,
        // so the union is a fold over casts.
        let clone_flags = namespaces.iter().fold(CloneFlags::empty(), |mut cf, ns| {
            cf |= CloneFlags::from_bits_truncate(ns.typ as i32);
            cf
        });

        Namespaces { clone_flags }
    }
}
