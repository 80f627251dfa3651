//! Native PTY implementation using portable-pty.

use std::io::{Read, Write};
use std::time::Duration;

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, ExitStatus, MasterPty};
use tracing::{debug, info, trace, warn};

use super::PtySize;
use crate::error::RelayError;
use crate::Result;

/// Get the default shell for the current platform.
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
    #[cfg(windows)]
    {
        "powershell.exe".to_string()
    }
}

/// Options for spawning a shell under a PTY.
#[derive(Debug, Clone)]
pub struct ShellSpec {
    /// Shell program.
    pub program: String,
    /// Extra arguments for the shell.
    pub args: Vec<String>,
    /// Working directory, inherited from the host when `None`.
    pub working_dir: Option<std::path::PathBuf>,
    /// Terminal size.
    pub size: PtySize,
}

impl Default for ShellSpec {
    fn default() -> Self {
        Self {
            program: default_shell(),
            args: Vec::new(),
            working_dir: None,
            size: PtySize::default(),
        }
    }
}

/// Wrapper around the native PTY system.
pub struct NativePty {
    pty_system: Box<dyn portable_pty::PtySystem + Send>,
}

impl NativePty {
    /// Create a new NativePty instance.
    pub fn new() -> Self {
        Self {
            pty_system: native_pty_system(),
        }
    }

    /// Spawn a shell process attached to a new PTY.
    pub fn spawn(&self, spec: &ShellSpec) -> Result<PtyProcess> {
        let pair = self
            .pty_system
            .openpty(spec.size.into())
            .map_err(|e| RelayError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&spec.program);
        cmd.args(&spec.args);
        cmd.env("TERM", "xterm-256color");
        if let Some(dir) = spec.working_dir.as_deref() {
            cmd.cwd(dir);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| RelayError::Pty(e.to_string()))?;
        // The slave end must not stay open in this process, otherwise the
        // master never reports end-of-stream when the shell exits.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| RelayError::Pty(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| RelayError::Pty(e.to_string()))?;

        let pid = child.process_id().unwrap_or(0);
        info!(pid, shell = %spec.program, "spawned PTY shell");

        Ok(PtyProcess {
            pid,
            reaped: false,
            master: Some(pair.master),
            child: Some(child),
            reader: Some(reader),
            writer: Some(writer),
        })
    }
}

impl Default for NativePty {
    fn default() -> Self {
        Self::new()
    }
}

/// A shell process attached to a PTY.
///
/// Owned by exactly one session. If it is dropped while the child is still
/// running, the child is killed.
pub struct PtyProcess {
    pid: u32,
    /// Set once the child has been reaped; its pid may be reused after that.
    reaped: bool,
    master: Option<Box<dyn MasterPty + Send>>,
    child: Option<Box<dyn Child + Send + Sync>>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
}

impl PtyProcess {
    /// Process ID of the shell (0 if the platform did not report one).
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Take the output reader (can only be called once).
    pub fn take_reader(&mut self) -> Result<Box<dyn Read + Send>> {
        self.reader
            .take()
            .ok_or_else(|| RelayError::Pty("reader already taken".into()))
    }

    /// Take the input writer (can only be called once).
    pub fn take_writer(&mut self) -> Result<Box<dyn Write + Send>> {
        self.writer
            .take()
            .ok_or_else(|| RelayError::Pty("writer already taken".into()))
    }

    /// Whether the child is still running.
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(_)) => {
                    self.reaped = true;
                    false
                }
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Forcibly end the shell and everything it started, then reap the shell.
    ///
    /// The shell leads its own session, so background jobs live in other
    /// process groups of that session; all of them are killed before the
    /// shell is reaped, while its pid cannot have been reused. Without this
    /// a job such as `sleep 300 &` keeps the PTY slave open and the output
    /// reader never sees end-of-file.
    ///
    /// Kill failures are logged and swallowed. The wait is bounded by
    /// `timeout`; on expiry the reap continues on a worker thread and `None`
    /// is returned. The PTY master is released before returning.
    pub async fn terminate(mut self, timeout: Duration) -> Option<ExitStatus> {
        let pid = self.pid;
        let reaped = self.reaped;
        let child = self.child.take();
        let master = self.master.take();
        drop(self.writer.take());

        let Some(mut child) = child else {
            return None;
        };

        let reap = tokio::task::spawn_blocking(move || {
            #[cfg(unix)]
            if !reaped {
                kill_session(pid);
            }

            let status = match child.try_wait() {
                Ok(Some(status)) => Ok(status),
                _ => {
                    debug!(pid, "terminating PTY shell");
                    if let Err(e) = child.kill() {
                        warn!(pid, "failed to kill PTY shell: {}", e);
                    }
                    child.wait()
                }
            };
            drop(master);
            status
        });

        match tokio::time::timeout(timeout, reap).await {
            Ok(Ok(Ok(status))) => {
                info!(pid, code = status.exit_code(), "PTY shell exited");
                Some(status)
            }
            Ok(Ok(Err(e))) => {
                warn!(pid, "failed to reap PTY shell: {}", e);
                None
            }
            Ok(Err(e)) => {
                warn!(pid, "PTY reap task failed: {}", e);
                None
            }
            Err(_) => {
                warn!(pid, ?timeout, "PTY shell did not exit in time");
                None
            }
        }
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            #[cfg(unix)]
            if !self.reaped {
                kill_session(self.pid);
            }

            if let Ok(None) = child.try_wait() {
                warn!(pid = self.pid, "PTY process dropped while running, killing");
                if let Err(e) = child.kill() {
                    warn!(pid = self.pid, "failed to kill PTY shell: {}", e);
                }
            }
        }
    }
}

/// Hang up the shell's process group and kill every other member of the
/// session it leads.
///
/// Must run before the leader is reaped: until then its pid, and so its
/// process group and session ids, cannot be reused.
#[cfg(unix)]
fn kill_session(leader: u32) {
    let Ok(leader) = libc::pid_t::try_from(leader) else {
        return;
    };
    if leader <= 1 {
        return;
    }

    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe {
        libc::kill(-leader, libc::SIGHUP);
    }

    let members = session_members(leader);
    if !members.is_empty() {
        debug!(pid = leader, jobs = members.len(), "killing remaining session members");
    }
    for member in members {
        // SAFETY: as above.
        if unsafe { libc::kill(member, libc::SIGKILL) } != 0 {
            trace!(pid = member, "session member already gone");
        }
    }

    // SAFETY: as above.
    unsafe {
        libc::kill(-leader, libc::SIGKILL);
    }
}

/// Processes other than `leader` whose session id is `leader`.
#[cfg(target_os = "linux")]
fn session_members(leader: libc::pid_t) -> Vec<libc::pid_t> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse::<libc::pid_t>().ok())
        .filter(|&pid| pid != leader)
        // SAFETY: getsid(2) has no memory-safety preconditions.
        .filter(|&pid| unsafe { libc::getsid(pid) } == leader)
        .collect()
}

/// Without `/proc` only the shell's own process group can be reached.
#[cfg(all(unix, not(target_os = "linux")))]
fn session_members(_leader: libc::pid_t) -> Vec<libc::pid_t> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shell() {
        let shell = default_shell();
        assert!(!shell.is_empty());

        #[cfg(unix)]
        assert!(shell.starts_with('/') || !shell.contains('/'));

        #[cfg(windows)]
        assert!(shell.ends_with(".exe"));
    }

    #[test]
    #[cfg(unix)]
    fn test_spawn_shell() {
        let pty = NativePty::new();
        let mut process = pty
            .spawn(&ShellSpec {
                program: "/bin/sh".into(),
                ..ShellSpec::default()
            })
            .expect("spawn /bin/sh");

        assert!(process.pid() > 0);
        assert!(process.is_alive());
        assert!(process.take_reader().is_ok());
        assert!(process.take_reader().is_err());
        assert!(process.take_writer().is_ok());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_terminate_running_shell() {
        let pty = NativePty::new();
        let process = pty
            .spawn(&ShellSpec {
                program: "/bin/sh".into(),
                ..ShellSpec::default()
            })
            .unwrap();

        let status = process.terminate(Duration::from_secs(5)).await;
        let status = status.expect("shell should be reaped");
        assert!(!status.success());
    }

    #[test]
    fn test_spawn_missing_program() {
        let pty = NativePty::new();
        let result = pty.spawn(&ShellSpec {
            program: "/definitely/not/a/shell".into(),
            ..ShellSpec::default()
        });
        assert!(matches!(result, Err(RelayError::Pty(_))));
    }
}
