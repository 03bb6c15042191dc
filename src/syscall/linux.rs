use std::any::Any;
use std::path::Path;

use nix::errno::Errno;
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::unistd;

use super::Syscall;

#[derive(Clone)]
pub struct LinuxSyscall;

impl Syscall for LinuxSyscall {
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
        mount(source, target, fstype, flags, data)
    }

    fn umount_detach(&self, target: &Path) -> Result<(), Errno> {
        umount2(target, MntFlags::MNT_DETACH)
    }

    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<(), Errno> {
        unistd::pivot_root(new_root, put_old)
    }

    fn chroot(&self, path: &Path) -> Result<(), Errno> {
        unistd::chroot(path)
    }

    fn chdir(&self, path: &Path) -> Result<(), Errno> {
        unistd::chdir(path)
    }

    fn set_hostname(&self, hostname: &str) -> Result<(), Errno> {
        unistd::sethostname(hostname)
    }
}
