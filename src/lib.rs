//! skiff is a rootless OCI-compatible container runtime: it takes a bundle
//! with a `config.json` and a root filesystem and runs the declared process
//! inside fresh kernel namespaces, without requiring any privileges on the
//! host. Isolation comes from a user namespace whose UID/GID maps are
//! installed by the launching process from the outside.

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod commands;
pub mod container;
pub mod error;
pub mod logger;
#[cfg(target_os = "linux")]
pub mod namespaces;
pub mod oci;
#[cfg(target_os = "linux")]
pub mod pipe;
pub mod process;
#[cfg(target_os = "linux")]
pub mod rootfs;
pub mod rootless;
pub mod state;
#[cfg(target_os = "linux")]
pub mod syscall;
pub mod utils;
