//! Resource limits and process-group control for renderer processes.

use tokio::process::Command;

use crate::config::ResourceLimits;

#[cfg(unix)]
pub(crate) fn apply(command: &mut Command, limits: ResourceLimits) {
  if limits.is_unlimited() {
    return;
  }

  // SAFETY: the closure runs in the forked child before exec. It only calls
  // setrlimit, which is async-signal-safe, and does not allocate.
  unsafe {
    command.pre_exec(move || {
      if let Some(secs) = limits.cpu_seconds {
        let limit = libc::rlimit {
          rlim_cur: secs as libc::rlim_t,
          rlim_max: secs as libc::rlim_t,
        };
        if libc::setrlimit(libc::RLIMIT_CPU, &limit) != 0 {
          return Err(std::io::Error::last_os_error());
        }
      }
      if let Some(bytes) = limits.address_space {
        let limit = libc::rlimit {
          rlim_cur: bytes as libc::rlim_t,
          rlim_max: bytes as libc::rlim_t,
        };
        if libc::setrlimit(libc::RLIMIT_AS, &limit) != 0 {
          return Err(std::io::Error::last_os_error());
        }
      }
      Ok(())
    });
  }
}

#[cfg(not(unix))]
pub(crate) fn apply(_command: &mut Command, limits: ResourceLimits) {
  if !limits.is_unlimited() {
    log::debug!("resource limits are not supported on this platform");
  }
}

/// Make the renderer the leader of a new process group, so everything it
/// forks can be killed together with it.
#[cfg(unix)]
pub(crate) fn isolate(command: &mut Command) {
  command.process_group(0);
}

#[cfg(not(unix))]
pub(crate) fn isolate(_command: &mut Command) {}

/// SIGKILL every process in the group led by `leader`.
#[cfg(unix)]
pub(crate) fn kill_group(leader: u32) {
  let Ok(pgid) = libc::pid_t::try_from(leader) else {
    return;
  };
  // SAFETY: killpg only sends a signal, it touches no memory.
  if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
    let err = std::io::Error::last_os_error();
    // ESRCH: the whole group is already gone
    if err.raw_os_error() != Some(libc::ESRCH) {
      log::warn!("failed to kill process group {pgid}: {err}");
    }
  }
}

#[cfg(not(unix))]
pub(crate) fn kill_group(_leader: u32) {}
