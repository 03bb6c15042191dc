//! A thin interface over the kernel calls the bootstrap child performs, so
//! the pivot and mount sequences can be exercised in unit tests without
//! privileges or a scratch namespace.

pub mod linux;
#[cfg(test)]
pub mod test;

use std::any::Any;
use std::path::Path;

use nix::errno::Errno;
use nix::mount::MsFlags;

pub trait Syscall {
    fn as_any(&self) -> &dyn Any;
    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<(), Errno>;
    fn umount_detach(&self, target: &Path) -> Result<(), Errno>;
    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<(), Errno>;
    fn chroot(&self, path: &Path) -> Result<(), Errno>;
    fn chdir(&self, path: &Path) -> Result<(), Errno>;
    fn set_hostname(&self, hostname: &str) -> Result<(), Errno>;
}

pub fn create_syscall() -> Box<dyn Syscall> {
    Box::new(linux::LinuxSyscall)
}
