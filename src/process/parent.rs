//! Control plane of the bootstrap: spawns the container init into its
//! namespaces, installs the UID/GID maps from outside, records the PID and
//! only then releases the child through the sync pipe.

use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicI32, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, Pid};

use crate::error::{Error, Result};
use crate::namespaces::Namespaces;
use crate::oci::LinuxIdMapping;
use crate::pipe::SyncPipe;
use crate::process::fork;
use crate::rootless::Rootless;
use crate::state::StateStore;
use crate::utils;

/// Hidden subcommand the spawned child re-executes itself with.
pub const CHILD_INIT_COMMAND: &str = "__child_init";

pub fn start(store: &StateStore, id: &str) -> Result<i32> {
    let (spec, _bundle) = store.load(id)?;

    // Everything that can rule out a launch happens before any fork.
    let rootless = Rootless::detect(&spec)?;
    let linux = spec
        .linux
        .as_ref()
        .ok_or_else(|| Error::InvalidState("spec has no linux block".to_string()))?;
    let namespaces = Namespaces::from(linux.namespaces.as_slice());

    let exe = std::env::current_exe()
        .map_err(|e| Error::SpawnFailed(format!("cannot determine own executable: {}", e)))?;
    let exe_c = cstring(exe.as_os_str().as_bytes())?;
    let exe_str = exe.to_string_lossy();
    let root_str = store.base().to_string_lossy();
    let argv: Vec<CString> = [
        exe_str.as_ref(),
        "--root",
        root_str.as_ref(),
        CHILD_INIT_COMMAND,
        id,
    ]
    .iter()
    .map(|arg| cstring(arg.as_bytes()))
    .collect::<Result<Vec<_>>>()?;

    let mut pipe = SyncPipe::new()?;

    // A child that dies while we hold the write end must surface as EPIPE,
    // not as a fatal SIGPIPE to the runtime itself.
    unsafe {
        let _ = signal::signal(Signal::SIGPIPE, SigHandler::SigIgn);
    }

    let child_pid = fork::clone_child(
        Box::new(|| {
            // Runs in the cloned address space: wire the sync pipe to its
            // fixed descriptor, then become the init image. The pipe read
            // blocks in the exec'd child, so nothing ID-sensitive can run
            // before the parent releases it.
            if pipe.attach_child_end().is_err() {
                return -1;
            }
            let argv_ref: Vec<&CStr> = argv.iter().map(|a| a.as_c_str()).collect();
            let _ = unistd::execv(&exe_c, &argv_ref);
            -1
        }),
        namespaces.clone_flags,
    )?;
    log::debug!("container init spawned with pid {}", child_pid);

    pipe.close_read();
    arm_cancellation(child_pid);

    if let Err(e) = install_id_maps(child_pid, &rootless) {
        disarm_cancellation();
        abort_child(store, id, child_pid);
        return Err(e);
    }

    if let Err(e) = store.record_pid(id, child_pid.as_raw()) {
        disarm_cancellation();
        abort_child(store, id, child_pid);
        return Err(e);
    }
    if let Some(path) = store.read_pid_file_path(id) {
        if let Err(e) = utils::write_file(&path, child_pid.as_raw().to_string()) {
            log::warn!("cannot write pid file {:?}: {}", path, e);
        }
    }

    // Maps installed, pid recorded: release the barrier. EPIPE means the
    // child died first; reap it and report. The pid file stays behind for
    // delete to clean up.
    if let Err(errno) = pipe.signal_start() {
        disarm_cancellation();
        log::debug!("start signal failed with {}, reaping child", errno);
        let status = wait_for_exit(child_pid).unwrap_or(1);
        return Err(Error::ChildDiedEarly { status });
    }
    disarm_cancellation();

    wait_for_exit(child_pid)
}

fn wait_for_exit(pid: Pid) -> Result<i32> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(128 + sig as i32),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(Error::SpawnFailed(format!("waitpid: {}", e))),
        }
    }
}

/// Installs the UID then GID mappings for the parked child. With the setuid
/// helpers available they do the privileged write; otherwise the map files
/// are written directly, which requires denying setgroups first.
fn install_id_maps(pid: Pid, rootless: &Rootless) -> Result<()> {
    if let Some((newuidmap, newgidmap)) = rootless.map_binaries() {
        log::debug!("writing id maps for {} via {:?}", pid, newuidmap);
        run_map_helper(newuidmap, pid, &rootless.uid_mappings)?;
        run_map_helper(newgidmap, pid, &rootless.gid_mappings)?;
        return Ok(());
    }

    log::debug!("writing id maps for {} directly", pid);
    write_map_file(
        &format!("/proc/{}/uid_map", pid),
        &format_id_mappings(&rootless.uid_mappings),
    )?;
    write_map_file(&format!("/proc/{}/setgroups", pid), "deny")?;
    write_map_file(
        &format!("/proc/{}/gid_map", pid),
        &format_id_mappings(&rootless.gid_mappings),
    )
}

fn write_map_file(path: &str, contents: &str) -> Result<()> {
    utils::write_file(path, contents)
        .map_err(|e| Error::MappingFailed(format!("writing {}: {}", path, e)))
}

/// One `container host size` triple per line, the format both the kernel
/// map files and the shadow-utils helpers consume.
pub fn format_id_mappings(mappings: &[LinuxIdMapping]) -> String {
    mappings
        .iter()
        .map(|m| format!("{} {} {}\n", m.container_id, m.host_id, m.size))
        .collect()
}

fn run_map_helper(binary: &Path, pid: Pid, mappings: &[LinuxIdMapping]) -> Result<()> {
    let mut command = Command::new(binary);
    command.arg(pid.to_string());
    for mapping in mappings {
        command.args([
            mapping.container_id.to_string(),
            mapping.host_id.to_string(),
            mapping.size.to_string(),
        ]);
    }

    let output = command
        .output()
        .map_err(|e| Error::MappingFailed(format!("cannot run {:?}: {}", binary, e)))?;
    if !output.status.success() {
        return Err(Error::MappingFailed(format!(
            "{:?} exited with {}: {}",
            binary,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

/// Failure cleanup: SIGKILL (a child that already exited counts as
/// success), reap, and drop the pid record.
fn abort_child(store: &StateStore, id: &str, pid: Pid) {
    match signal::kill(pid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("cannot kill container init {}: {}", pid, e),
    }
    let _ = waitpid(pid, None);
    let _ = store.remove_pid(id);
}

// A SIGINT/SIGTERM between spawn and release must not leave an orphan
// parked on the sync pipe forever. The handler may only use
// async-signal-safe calls, hence raw libc.
static CHILD_PID: AtomicI32 = AtomicI32::new(0);

extern "C" fn kill_child_and_exit(_sig: libc::c_int) {
    let pid = CHILD_PID.load(Ordering::SeqCst);
    if pid > 0 {
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
    }
    unsafe { libc::_exit(1) }
}

fn arm_cancellation(pid: Pid) {
    CHILD_PID.store(pid.as_raw(), Ordering::SeqCst);
    let action = SigAction::new(
        SigHandler::Handler(kill_child_and_exit),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        let _ = signal::sigaction(Signal::SIGINT, &action);
        let _ = signal::sigaction(Signal::SIGTERM, &action);
    }
}

fn disarm_cancellation() {
    CHILD_PID.store(0, Ordering::SeqCst);
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe {
        let _ = signal::sigaction(Signal::SIGINT, &action);
        let _ = signal::sigaction(Signal::SIGTERM, &action);
    }
}

fn cstring(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes)
        .map_err(|_| Error::SpawnFailed("argument contains a NUL byte".to_string()))
}
