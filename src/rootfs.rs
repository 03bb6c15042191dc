//! Root filesystem takeover and mount application inside the container's
//! namespaces.
//!
//! The preferred strategy is `pivot_root`; `chroot` is the documented
//! fallback for hosts whose mount namespace refuses the pivot, at the cost
//! of mount-event isolation.

use std::fs;
use std::path::Path;

use nix::errno::Errno;
use nix::mount::MsFlags;

use crate::error::{Error, Result};
use crate::oci::Mount;
use crate::syscall::Syscall;

/// Stash directory for the old root inside the new one, removed after the
/// detach unmount.
const PIVOT_OLD_ROOT: &str = ".pivot_root";

const STEP_PRIVATE: &str = "make host root private";
const STEP_BIND: &str = "bind rootfs onto itself";
const STEP_PUT_OLD: &str = "create old-root stash";
const STEP_PIVOT: &str = "pivot_root";
const STEP_CHDIR: &str = "chdir to new root";

/// Swaps the process root for `rootfs`. Falls back to `chroot` only when
/// the mount namespace denies the pivot; every other failure is surfaced
/// with the step that broke.
pub fn change_root(rootfs: &Path, syscall: &dyn Syscall) -> Result<()> {
    match pivot_root_sequence(rootfs, syscall) {
        Ok(()) => Ok(()),
        Err(Error::PivotFailed { step, cause })
            if pivot_unavailable(step, cause) =>
        {
            log::warn!(
                "pivot_root unavailable ({}: {}); falling back to chroot. \
                 Mount events will not be isolated from this mount namespace",
                step,
                cause
            );
            syscall.chroot(rootfs).map_err(|cause| Error::PivotFailed {
                step: "chroot fallback",
                cause,
            })?;
            syscall.chdir(Path::new("/")).map_err(|cause| Error::PivotFailed {
                step: STEP_CHDIR,
                cause,
            })
        }
        Err(e) => Err(e),
    }
}

fn pivot_root_sequence(rootfs: &Path, syscall: &dyn Syscall) -> Result<()> {
    // Recursively private so nothing that follows propagates to the host.
    syscall
        .mount(
            None,
            Path::new("/"),
            None,
            MsFlags::MS_PRIVATE | MsFlags::MS_REC,
            None,
        )
        .map_err(|cause| Error::PivotFailed {
            step: STEP_PRIVATE,
            cause,
        })?;

    // pivot_root requires the new root to be a mount point.
    syscall
        .mount(
            Some(rootfs),
            rootfs,
            None,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None,
        )
        .map_err(|cause| Error::PivotFailed {
            step: STEP_BIND,
            cause,
        })?;

    let put_old = rootfs.join(PIVOT_OLD_ROOT);
    if let Err(e) = fs::create_dir(&put_old) {
        if e.kind() != std::io::ErrorKind::AlreadyExists {
            return Err(Error::PivotFailed {
                step: STEP_PUT_OLD,
                cause: Errno::from_i32(e.raw_os_error().unwrap_or(libc::EIO)),
            });
        }
    }

    syscall
        .pivot_root(rootfs, &put_old)
        .map_err(|cause| Error::PivotFailed {
            step: STEP_PIVOT,
            cause,
        })?;

    syscall
        .chdir(Path::new("/"))
        .map_err(|cause| Error::PivotFailed {
            step: STEP_CHDIR,
            cause,
        })?;

    // The old root is only reachable inside this namespace; failing to drop
    // it weakens nothing on the host, so both steps are warn-only.
    let old_root = Path::new("/").join(PIVOT_OLD_ROOT);
    if let Err(e) = syscall.umount_detach(&old_root) {
        log::warn!("cannot unmount old root {:?}: {}", old_root, e);
    } else if let Err(e) = fs::remove_dir(&old_root) {
        log::warn!("cannot remove old root mount point {:?}: {}", old_root, e);
    }

    Ok(())
}

fn pivot_unavailable(step: &str, errno: Errno) -> bool {
    let mount_step = step == STEP_PRIVATE || step == STEP_BIND || step == STEP_PIVOT;
    mount_step && matches!(errno, Errno::EPERM | Errno::EACCES | Errno::EINVAL)
}

/// Applies the spec's mounts in order, skipping the ones a rootless
/// container cannot perform.
pub fn apply_mounts(mounts: &[Mount], syscall: &dyn Syscall) -> Result<()> {
    for mount in mounts {
        if rootless_incompatible(mount) {
            log::info!(
                "skipping mount of {:?} at {:?} (not permitted for rootless containers)",
                mount.typ,
                mount.destination
            );
            continue;
        }

        if let Err(e) = fs::create_dir_all(&mount.destination) {
            log::warn!(
                "cannot create mount destination {:?}: {}",
                mount.destination,
                e
            );
            continue;
        }

        let (flags, data) = parse_mount_options(&mount.options);
        log::debug!(
            "mounting {:?} at {:?} type {:?} flags {:?} data {:?}",
            mount.source,
            mount.destination,
            mount.typ,
            flags,
            data
        );

        let fstype = if mount.typ.is_empty() {
            None
        } else {
            Some(mount.typ.as_str())
        };
        if let Err(cause) = syscall.mount(
            Some(mount.source.as_path()),
            &mount.destination,
            fstype,
            flags,
            data.as_deref(),
        ) {
            // /sys is expected to refuse without the right capability.
            if under_sys(&mount.destination) {
                log::warn!("mount of {:?} failed: {}", mount.destination, cause);
                continue;
            }
            return Err(Error::MountFatal {
                destination: mount.destination.clone(),
                cause,
            });
        }
    }

    Ok(())
}

/// Mounts an unprivileged user namespace cannot satisfy: sysfs and cgroup
/// filesystems, and anything destined for the cgroup tree. Other mounts
/// under /sys (bind mounts, typically) are still attempted; their failures
/// are downgraded to warnings in [`apply_mounts`].
pub fn rootless_incompatible(mount: &Mount) -> bool {
    if matches!(mount.typ.as_str(), "sysfs" | "cgroup" | "cgroup2") {
        return true;
    }
    mount.destination == Path::new("/sys/fs/cgroup")
        || mount.destination.starts_with("/sys/fs/cgroup/")
}

fn under_sys(destination: &Path) -> bool {
    destination == Path::new("/sys") || destination.starts_with("/sys/")
}

/// Translates OCI mount option strings into mount flags; anything that is
/// not a flag becomes part of the comma-joined data string.
pub fn parse_mount_options(options: &[String]) -> (MsFlags, Option<String>) {
    let mut flags = MsFlags::empty();
    let mut data = Vec::new();

    for option in options {
        match option.as_str() {
            "ro" => flags |= MsFlags::MS_RDONLY,
            "nosuid" => flags |= MsFlags::MS_NOSUID,
            "noexec" => flags |= MsFlags::MS_NOEXEC,
            "nodev" => flags |= MsFlags::MS_NODEV,
            "bind" => flags |= MsFlags::MS_BIND,
            "rbind" => flags |= MsFlags::MS_BIND | MsFlags::MS_REC,
            "strictatime" => flags |= MsFlags::MS_STRICTATIME,
            "relatime" => flags |= MsFlags::MS_RELATIME,
            other => data.push(other.to_string()),
        }
    }

    let data = if data.is_empty() {
        None
    } else {
        Some(data.join(","))
    };
    (flags, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::test::TestSyscall;
    use std::path::PathBuf;

    fn opts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn mount(dest: &str, typ: &str, source: &str, options: &[&str]) -> Mount {
        Mount {
            destination: PathBuf::from(dest),
            typ: typ.to_string(),
            source: PathBuf::from(source),
            options: opts(options),
        }
    }

    #[test]
    fn test_parse_mount_options_flags_and_data() {
        let (flags, data) = parse_mount_options(&opts(&["nosuid", "noexec", "mode=755", "ro"]));

        assert_eq!(
            flags,
            MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC | MsFlags::MS_RDONLY
        );
        assert_eq!(data.as_deref(), Some("mode=755"));
    }

    #[test]
    fn test_parse_mount_options_rbind_is_recursive() {
        let (flags, data) = parse_mount_options(&opts(&["rbind"]));
        assert_eq!(flags, MsFlags::MS_BIND | MsFlags::MS_REC);
        assert_eq!(data, None);
    }

    #[test]
    fn test_parse_mount_options_empty() {
        let (flags, data) = parse_mount_options(&[]);
        assert!(flags.is_empty());
        assert_eq!(data, None);
    }

    #[test]
    fn test_rootless_incompatible_filter() {
        assert!(rootless_incompatible(&mount("/sys", "sysfs", "sysfs", &[])));
        assert!(rootless_incompatible(&mount(
            "/sys/fs/cgroup",
            "cgroup2",
            "cgroup2",
            &[]
        )));
        // cgroup filesystems are filtered regardless of destination, and
        // the cgroup tree regardless of type.
        assert!(rootless_incompatible(&mount("/cg", "cgroup", "cgroup", &[])));
        assert!(rootless_incompatible(&mount(
            "/sys/fs/cgroup/unified",
            "bind",
            "/sys/fs/cgroup/unified",
            &[]
        )));

        assert!(!rootless_incompatible(&mount("/proc", "proc", "proc", &[])));
        assert!(!rootless_incompatible(&mount("/dev", "tmpfs", "tmpfs", &[])));
        // Non-cgroup mounts under /sys are attempted (their failures are
        // downgraded), not filtered.
        assert!(!rootless_incompatible(&mount(
            "/sys",
            "bind",
            "/sys",
            &["rbind"]
        )));
        assert!(!rootless_incompatible(&mount(
            "/sys/kernel/debug",
            "tmpfs",
            "tmpfs",
            &[]
        )));
        // A destination merely sharing the /sys prefix is not under /sys.
        assert!(!rootless_incompatible(&mount(
            "/sysroot",
            "tmpfs",
            "tmpfs",
            &[]
        )));
    }

    #[test]
    fn test_apply_mounts_skips_incompatible_entries() {
        let syscall = TestSyscall::default();
        let mounts = vec![
            mount("/proc", "proc", "proc", &[]),
            mount("/sys", "sysfs", "sysfs", &["nosuid"]),
            mount("/sys/fs/cgroup", "cgroup2", "cgroup2", &[]),
        ];

        apply_mounts(&mounts, &syscall).unwrap();

        let calls = syscall.get_mount_args();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, PathBuf::from("/proc"));
        assert_eq!(calls[0].fstype.as_deref(), Some("proc"));
    }

    #[test]
    fn test_sys_mount_failure_is_downgraded() {
        let syscall = TestSyscall::default();
        syscall.deny_mount_target("/sys");
        let mounts = vec![
            mount("/sys", "bind", "/sys", &["rbind"]),
            mount("/dev", "tmpfs", "tmpfs", &[]),
        ];

        // The refused /sys mount is a warning; the rest still applies.
        apply_mounts(&mounts, &syscall).unwrap();

        let calls = syscall.get_mount_args();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, PathBuf::from("/dev"));
    }

    #[test]
    fn test_other_mount_failure_is_fatal() {
        let syscall = TestSyscall::default();
        syscall.deny_mount_target("/dev");
        let mounts = vec![mount("/dev", "tmpfs", "tmpfs", &[])];

        let err = apply_mounts(&mounts, &syscall).unwrap_err();
        assert!(matches!(
            err,
            Error::MountFatal { destination, .. } if destination == PathBuf::from("/dev")
        ));
    }

    #[test]
    fn test_apply_mounts_translates_options() {
        let syscall = TestSyscall::default();
        let mounts = vec![mount(
            "/dev",
            "tmpfs",
            "tmpfs",
            &["nosuid", "strictatime", "mode=755", "size=65536k"],
        )];

        apply_mounts(&mounts, &syscall).unwrap();

        let calls = syscall.get_mount_args();
        assert_eq!(calls[0].flags, MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME);
        assert_eq!(calls[0].data.as_deref(), Some("mode=755,size=65536k"));
    }

    #[test]
    fn test_change_root_pivots_through_stash_dir() {
        let dir = tempfile::tempdir().unwrap();
        let rootfs = dir.path().join("rootfs");
        fs::create_dir(&rootfs).unwrap();

        let syscall = TestSyscall::default();
        change_root(&rootfs, &syscall).unwrap();

        // Host root went private, then the rootfs was bound onto itself.
        let mounts = syscall.get_mount_args();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].target, PathBuf::from("/"));
        assert_eq!(mounts[0].flags, MsFlags::MS_PRIVATE | MsFlags::MS_REC);
        assert_eq!(mounts[1].source.as_deref(), Some(rootfs.as_path()));
        assert_eq!(mounts[1].flags, MsFlags::MS_BIND | MsFlags::MS_REC);

        let pivots = syscall.get_pivot_args();
        assert_eq!(pivots.len(), 1);
        assert_eq!(pivots[0].0, rootfs);
        assert_eq!(pivots[0].1, rootfs.join(PIVOT_OLD_ROOT));
        assert!(rootfs.join(PIVOT_OLD_ROOT).is_dir());

        // Old root detached, no chroot taken.
        assert_eq!(syscall.get_umount_args(), vec![PathBuf::from("/.pivot_root")]);
        assert!(syscall.get_chroot_args().is_empty());
        assert_eq!(syscall.get_chdir_args(), vec![PathBuf::from("/")]);
    }

    #[test]
    fn test_change_root_falls_back_to_chroot_on_eperm() {
        let dir = tempfile::tempdir().unwrap();
        let rootfs = dir.path().join("rootfs");
        fs::create_dir(&rootfs).unwrap();

        let syscall = TestSyscall::default();
        syscall.deny_pivot.set(true);

        change_root(&rootfs, &syscall).unwrap();

        assert_eq!(syscall.get_chroot_args(), vec![rootfs.clone()]);
        assert_eq!(syscall.get_chdir_args(), vec![PathBuf::from("/")]);
        assert!(syscall.get_pivot_args().is_empty());
    }
}
