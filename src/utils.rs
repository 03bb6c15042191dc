use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::unistd::execve;

use crate::error::{Error, Result};

pub fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<()> {
    fs::write(path, contents)
}

/// Looks up `command` the way a shell would: an explicit path is taken as
/// is, anything else is searched along the given colon-separated
/// `search_path` (the container's PATH, not this process's).
pub fn resolve_in_path(command: &str, search_path: &str) -> Result<PathBuf> {
    if command.contains('/') {
        let path = PathBuf::from(command);
        if is_executable(&path) {
            return Ok(path);
        }
        return Err(Error::CommandNotFound(command.to_string()));
    }

    for dir in search_path.split_terminator(':') {
        let candidate = Path::new(dir).join(command);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }

    Err(Error::CommandNotFound(command.to_string()))
}

fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Replaces the current image with `path`, passing `args` as the full argv
/// and exactly `env` as the environment. Nothing from this process's own
/// environment crosses over. Returns only on failure.
pub fn do_exec(path: &Path, args: &[String], env: &[String]) -> Result<()> {
    let path_c = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::InvalidSpec("entrypoint path contains a NUL byte".to_string()))?;
    let args_c = args
        .iter()
        .map(|s| CString::new(s.as_str()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::InvalidSpec("process.args contains a NUL byte".to_string()))?;
    let env_c = env
        .iter()
        .map(|s| CString::new(s.as_str()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::InvalidSpec("process.env contains a NUL byte".to_string()))?;

    execve(&path_c, &args_c, &env_c)
        .map_err(|e| Error::SpawnFailed(format!("exec of {:?} failed: {}", path, e)))?;
    Ok(())
}
