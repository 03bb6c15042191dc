//! The parent/child synchronization pipe.
//!
//! The pipe is used purely as a barrier: the child parks on the read end at
//! a well-known descriptor until the parent has installed its ID mappings
//! and recorded the PID, then the parent writes a short sentinel and closes.

use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::unistd::{close, dup2, pipe2, read, write};

use crate::error::{Error, Result};

/// Descriptor at which the child inherits the read end, directly after the
/// stdio triple.
pub const SYNC_FD: RawFd = 3;

/// Sentinel written by the parent to release the child.
const GO: &[u8] = b"go";

pub struct SyncPipe {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl SyncPipe {
    pub fn new() -> Result<Self> {
        // Close-on-exec so no descriptor other than the deliberately
        // re-wired SYNC_FD survives into the container entrypoint.
        let (read_fd, write_fd) = pipe2(OFlag::O_CLOEXEC)
            .map_err(|e| Error::SpawnFailed(format!("cannot create sync pipe: {}", e)))?;
        Ok(Self { read_fd, write_fd })
    }

    /// Runs in the cloned child before exec: places the read end at
    /// [`SYNC_FD`] and strips close-on-exec from it. dup2 clears the flag on
    /// the duplicate; when the read end already landed on SYNC_FD the flag
    /// has to be cleared in place.
    pub fn attach_child_end(&self) -> std::result::Result<(), Errno> {
        if self.read_fd == SYNC_FD {
            fcntl(SYNC_FD, FcntlArg::F_SETFD(FdFlag::empty()))?;
        } else {
            dup2(self.read_fd, SYNC_FD)?;
        }
        Ok(())
    }

    /// Parent side, immediately after spawn: drop the read end so the only
    /// reader is the child.
    pub fn close_read(&mut self) {
        if self.read_fd >= 0 {
            let _ = close(self.read_fd);
            self.read_fd = -1;
        }
    }

    /// Writes the sentinel and closes the write end. An `EPIPE` here means
    /// the child is already gone.
    pub fn signal_start(&mut self) -> std::result::Result<(), Errno> {
        let result = write(self.write_fd, GO);
        let _ = close(self.write_fd);
        self.write_fd = -1;
        result.map(|_| ())
    }
}

impl Drop for SyncPipe {
    fn drop(&mut self) {
        if self.read_fd >= 0 {
            let _ = close(self.read_fd);
        }
        if self.write_fd >= 0 {
            let _ = close(self.write_fd);
        }
    }
}

/// Child side of the barrier: blocks until the parent's sentinel arrives.
/// EOF without a byte means the parent died or gave up.
pub fn wait_for_start() -> Result<()> {
    let mut buf = [0u8; 8];
    loop {
        match read(SYNC_FD, &mut buf) {
            Ok(0) => {
                return Err(Error::SyncPipeBroken(
                    "eof on the sync pipe before the start signal".to_string(),
                ))
            }
            Ok(_) => break,
            Err(Errno::EINTR) => continue,
            Err(e) => {
                return Err(Error::SyncPipeBroken(format!(
                    "cannot read the sync pipe: {}",
                    e
                )))
            }
        }
    }
    let _ = close(SYNC_FD);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_start_writes_sentinel() {
        let mut pipe = SyncPipe::new().unwrap();
        let read_fd = pipe.read_fd;

        pipe.signal_start().unwrap();

        let mut buf = [0u8; 8];
        let n = read(read_fd, &mut buf).unwrap();
        assert_eq!(&buf[..n], GO);

        // Write end closed, so the next read sees EOF.
        assert_eq!(read(read_fd, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_signal_after_reader_gone_is_epipe() {
        // Writing into a pipe with no readers raises SIGPIPE unless ignored;
        // the bootstrap parent ignores it before signaling.
        unsafe {
            use nix::sys::signal::{signal, SigHandler, Signal};
            signal(Signal::SIGPIPE, SigHandler::SigIgn).unwrap();
        }

        let mut pipe = SyncPipe::new().unwrap();
        pipe.close_read();

        assert_eq!(pipe.signal_start(), Err(Errno::EPIPE));
    }
}
