//! Data plane of the bootstrap: runs inside the fresh namespaces, parked on
//! the sync pipe until the parent has granted it an identity, then takes
//! over the rootfs and becomes the container entrypoint.

use std::path::Path;

use nix::unistd;

use crate::error::{Error, Result};
use crate::oci::{LinuxNamespaceType, Spec};
use crate::pipe;
use crate::rootfs;
use crate::state::StateStore;
use crate::syscall::Syscall;
use crate::utils;

/// PATH installed when the spec's environment does not provide one.
pub const DEFAULT_PATH: &str = "/bin:/usr/bin:/sbin:/usr/sbin";

/// The ordered init sequence. Every step must complete before the next one
/// starts; a successful exec never returns.
pub fn init(store: &StateStore, id: &str, syscall: &dyn Syscall) -> Result<()> {
    // Barrier: the parent writes the sentinel only once the ID maps and the
    // pid record are in place. Nothing ID-sensitive may run before this.
    pipe::wait_for_start()?;

    // The uid map must have made us root inside the user namespace;
    // anything else points at a mapping bug.
    let euid = unistd::geteuid();
    if !euid.is_root() {
        return Err(Error::NotRootInUserNs {
            euid: euid.as_raw(),
        });
    }

    // Re-read the record: create may have rewritten the bundle's spec with
    // rootless defaults, and the rootfs location derives from the recorded
    // bundle path.
    let (spec, bundle) = store.load(id)?;
    if spec.process.args.is_empty() {
        return Err(Error::InvalidSpec(
            "process.args must contain at least the entrypoint".to_string(),
        ));
    }

    set_hostname(&spec, syscall);

    let rootfs_path = bundle.join(&spec.root.path);
    log::debug!("changing root to {:?}", rootfs_path);
    rootfs::change_root(&rootfs_path, syscall)?;
    rootfs::apply_mounts(&spec.mounts, syscall)?;

    // The entrypoint sees exactly the spec's environment, nothing of the
    // host user's shell environment this process was started with.
    let env = assemble_env(&spec.process.env);
    if !spec.process.cwd.is_empty() {
        if let Err(e) = unistd::chdir(Path::new(&spec.process.cwd)) {
            log::warn!("cannot chdir to {:?}: {}", spec.process.cwd, e);
        }
    }

    let search_path = env
        .iter()
        .find_map(|entry| entry.strip_prefix("PATH="))
        .unwrap_or(DEFAULT_PATH);
    let entrypoint = utils::resolve_in_path(&spec.process.args[0], search_path)?;
    log::debug!("exec {:?} with argv {:?}", entrypoint, spec.process.args);
    utils::do_exec(&entrypoint, &spec.process.args, &env)
}

/// Best effort: a hostname is only settable with a UTS namespace, and a
/// refusal must not abort the bootstrap.
fn set_hostname(spec: &Spec, syscall: &dyn Syscall) {
    if spec.hostname.is_empty() || !spec.has_namespace(LinuxNamespaceType::Uts) {
        return;
    }
    if let Err(e) = syscall.set_hostname(&spec.hostname) {
        log::warn!("cannot set hostname to {:?}: {}", spec.hostname, e);
    }
}

/// The environment handed to the entrypoint: the spec's KEY=VALUE entries,
/// with a conservative PATH appended when the spec sets none.
pub fn assemble_env(env: &[String]) -> Vec<String> {
    let mut assembled = Vec::with_capacity(env.len() + 1);
    for entry in env {
        match entry.split_once('=') {
            Some((key, _)) if !key.is_empty() => assembled.push(entry.clone()),
            _ => log::warn!("ignoring malformed environment entry {:?}", entry),
        }
    }
    if !assembled.iter().any(|e| e.starts_with("PATH=")) {
        assembled.push(format!("PATH={}", DEFAULT_PATH));
    }
    assembled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::{Linux, LinuxNamespace, Process, Root};
    use crate::syscall::test::TestSyscall;
    use std::path::PathBuf;

    fn spec_with_hostname(hostname: &str, namespaces: Vec<LinuxNamespaceType>) -> Spec {
        Spec {
            version: "1.0.2".to_string(),
            process: Process {
                args: vec!["/bin/sh".to_string()],
                env: vec![],
                cwd: String::new(),
                no_new_privileges: false,
            },
            root: Root {
                path: PathBuf::from("rootfs"),
                readonly: false,
            },
            hostname: hostname.to_string(),
            mounts: vec![],
            linux: Some(Linux {
                namespaces: namespaces
                    .into_iter()
                    .map(|typ| LinuxNamespace { typ })
                    .collect(),
                ..Default::default()
            }),
        }
    }

    fn env(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hostname_set_under_uts_namespace() {
        let syscall = TestSyscall::default();
        let spec = spec_with_hostname("sandbox", vec![LinuxNamespaceType::Uts]);

        set_hostname(&spec, &syscall);

        assert_eq!(syscall.get_hostname_args(), vec!["sandbox".to_string()]);
    }

    #[test]
    fn test_hostname_skipped_without_uts_namespace() {
        let syscall = TestSyscall::default();
        let spec = spec_with_hostname("sandbox", vec![LinuxNamespaceType::User]);

        set_hostname(&spec, &syscall);

        assert!(syscall.get_hostname_args().is_empty());
    }

    #[test]
    fn test_hostname_skipped_when_unset() {
        let syscall = TestSyscall::default();
        let spec = spec_with_hostname("", vec![LinuxNamespaceType::Uts]);

        set_hostname(&spec, &syscall);

        assert!(syscall.get_hostname_args().is_empty());
    }

    #[test]
    fn test_assemble_env_keeps_spec_entries_only() {
        let assembled = assemble_env(&env(&[
            "TERM=xterm",
            "HOME=/root",
            "PATH=/custom/bin",
            "EMPTY=",
        ]));

        // Exactly the spec's entries, no inherited host variables.
        assert_eq!(
            assembled,
            vec!["TERM=xterm", "HOME=/root", "PATH=/custom/bin", "EMPTY="]
        );
    }

    #[test]
    fn test_assemble_env_installs_default_path() {
        let assembled = assemble_env(&env(&["TERM=xterm"]));

        assert_eq!(
            assembled,
            vec!["TERM=xterm".to_string(), format!("PATH={}", DEFAULT_PATH)]
        );
    }

    #[test]
    fn test_assemble_env_drops_malformed_entries() {
        let assembled = assemble_env(&env(&["no-equals-sign", "=nokey", "OK=yes"]));

        assert_eq!(
            assembled,
            vec!["OK=yes".to_string(), format!("PATH={}", DEFAULT_PATH)]
        );
    }
}
