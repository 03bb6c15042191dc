use std::any::Any;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::mount::MsFlags;

use super::Syscall;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountArgs {
    pub source: Option<PathBuf>,
    pub target: PathBuf,
    pub fstype: Option<String>,
    pub flags: MsFlags,
    pub data: Option<String>,
}

/// Records every call instead of touching the kernel. `deny_pivot` makes
/// pivot_root (and the mount calls leading up to it) report `EPERM`, the
/// shape of a host that does not allow re-rooting the mount namespace;
/// `deny_mount_target` refuses individual mount destinations the same way.
#[derive(Default)]
pub struct TestSyscall {
    pub deny_pivot: Cell<bool>,
    denied_mount_targets: RefCell<Vec<PathBuf>>,
    mount_args: RefCell<Vec<MountArgs>>,
    umount_args: RefCell<Vec<PathBuf>>,
    pivot_args: RefCell<Vec<(PathBuf, PathBuf)>>,
    chroot_args: RefCell<Vec<PathBuf>>,
    chdir_args: RefCell<Vec<PathBuf>>,
    hostname_args: RefCell<Vec<String>>,
}

impl Syscall for TestSyscall {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<(), Errno> {
        if self.deny_pivot.get() && target == Path::new("/") {
            return Err(Errno::EPERM);
        }
        if self.denied_mount_targets.borrow().iter().any(|t| t == target) {
            return Err(Errno::EPERM);
        }
        self.mount_args.borrow_mut().push(MountArgs {
            source: source.map(|p| p.to_owned()),
            target: target.to_owned(),
            fstype: fstype.map(|s| s.to_owned()),
            flags,
            data: data.map(|s| s.to_owned()),
        });
        Ok(())
    }

    fn umount_detach(&self, target: &Path) -> Result<(), Errno> {
        self.umount_args.borrow_mut().push(target.to_owned());
        Ok(())
    }

    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<(), Errno> {
        if self.deny_pivot.get() {
            return Err(Errno::EPERM);
        }
        self.pivot_args
            .borrow_mut()
            .push((new_root.to_owned(), put_old.to_owned()));
        Ok(())
    }

    fn chroot(&self, path: &Path) -> Result<(), Errno> {
        self.chroot_args.borrow_mut().push(path.to_owned());
        Ok(())
    }

    fn chdir(&self, path: &Path) -> Result<(), Errno> {
        self.chdir_args.borrow_mut().push(path.to_owned());
        Ok(())
    }

    fn set_hostname(&self, hostname: &str) -> Result<(), Errno> {
        self.hostname_args.borrow_mut().push(hostname.to_owned());
        Ok(())
    }
}

impl TestSyscall {
    pub fn deny_mount_target<P: Into<PathBuf>>(&self, target: P) {
        self.denied_mount_targets.borrow_mut().push(target.into());
    }

    pub fn get_mount_args(&self) -> Vec<MountArgs> {
        self.mount_args.borrow().clone()
    }

    pub fn get_umount_args(&self) -> Vec<PathBuf> {
        self.umount_args.borrow().clone()
    }

    pub fn get_pivot_args(&self) -> Vec<(PathBuf, PathBuf)> {
        self.pivot_args.borrow().clone()
    }

    pub fn get_chroot_args(&self) -> Vec<PathBuf> {
        self.chroot_args.borrow().clone()
    }

    pub fn get_chdir_args(&self) -> Vec<PathBuf> {
        self.chdir_args.borrow().clone()
    }

    pub fn get_hostname_args(&self) -> Vec<String> {
        self.hostname_args.borrow().clone()
    }
}
