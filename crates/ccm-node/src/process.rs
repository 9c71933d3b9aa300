//! OS-backed process control.
//!
//! Server processes are spawned in their own process group so they outlive
//! the invoking `ccm` and ignore its terminal signals. Children spawned by
//! this instance are kept so they can be reaped; processes started by
//! earlier invocations are probed with a null signal.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use ccm_core::{Error, ProcessControl, ProcessSpec, Result, SignalKind, WaitStatus};

const EXIT_POLL: Duration = Duration::from_millis(100);

/// [`ProcessControl`] over the host's process table.
#[derive(Default)]
pub struct OsProcessControl {
    children: Mutex<HashMap<u32, Child>>,
}

impl OsProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn children(&self) -> MutexGuard<'_, HashMap<u32, Child>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Liveness of a child we spawned, reaping it if it has exited.
    fn owned_child_alive(&self, pid: u32) -> Option<bool> {
        let mut children = self.children();
        let child = children.get_mut(&pid)?;
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid, %status, "Reaped server process");
                children.remove(&pid);
                Some(false)
            }
            Ok(None) => Some(true),
            Err(_) => None,
        }
    }
}

fn output_file(path: &Path) -> Result<Stdio> {
    let file = File::create(path).map_err(|e| Error::io_with_path(e, path))?;
    Ok(Stdio::from(file))
}

#[async_trait]
impl ProcessControl for OsProcessControl {
    fn spawn(&self, spec: &ProcessSpec) -> Result<u32> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).stdin(Stdio::null());
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        command.stdout(match &spec.stdout {
            Some(path) => output_file(path)?,
            None => Stdio::inherit(),
        });
        command.stderr(match &spec.stderr {
            Some(path) => output_file(path)?,
            None => Stdio::inherit(),
        });
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(|e| {
            Error::tool(
                spec.program.display().to_string(),
                format!("failed to launch: {e}"),
            )
        })?;
        let pid = child.id();
        debug!(pid, program = %spec.program.display(), "Spawned process");
        self.children().insert(pid, child);
        Ok(pid)
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> Result<()> {
        debug!(pid, ?kind, "Delivering signal");
        os::signal(pid, kind)
    }

    fn is_alive(&self, pid: u32) -> bool {
        match self.owned_child_alive(pid) {
            Some(alive) => alive,
            None => os::probe(pid),
        }
    }

    async fn wait(&self, pid: u32, timeout: Duration) -> Result<WaitStatus> {
        let started = Instant::now();
        loop {
            if !self.is_alive(pid) {
                return Ok(WaitStatus::Exited);
            }
            if started.elapsed() >= timeout {
                return Ok(WaitStatus::TimedOut);
            }
            tokio::time::sleep(EXIT_POLL).await;
        }
    }
}

#[cfg(unix)]
mod os {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    use ccm_core::{Error, Result, SignalKind};

    fn to_pid(pid: u32) -> Result<Pid> {
        i32::try_from(pid)
            .map(Pid::from_raw)
            .map_err(|_| Error::NoSuchProcess(pid.to_string()))
    }

    pub(super) fn signal(pid: u32, kind: SignalKind) -> Result<()> {
        let signal = match kind {
            SignalKind::Terminate => Signal::SIGTERM,
            SignalKind::HangUp => Signal::SIGHUP,
            SignalKind::Kill => Signal::SIGKILL,
            SignalKind::Stop => Signal::SIGSTOP,
            SignalKind::Continue => Signal::SIGCONT,
        };
        kill(to_pid(pid)?, signal).map_err(|errno| match errno {
            Errno::ESRCH => Error::NoSuchProcess(pid.to_string()),
            other => Error::Io(std::io::Error::from(other)),
        })
    }

    pub(super) fn probe(pid: u32) -> bool {
        let Ok(pid) = to_pid(pid) else {
            return false;
        };
        match kill(pid, None::<Signal>) {
            Ok(()) => true,
            // Exists, but owned by someone else.
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

#[cfg(not(unix))]
mod os {
    use std::process::Command;

    use ccm_core::{Error, Result, SignalKind};

    pub(super) fn signal(pid: u32, kind: SignalKind) -> Result<()> {
        let mut command = Command::new("taskkill");
        command.args(["/PID", &pid.to_string()]);
        match kind {
            SignalKind::Terminate => {}
            SignalKind::Kill | SignalKind::HangUp => {
                command.arg("/F");
            }
            SignalKind::Stop | SignalKind::Continue => {
                return Err(Error::tool(
                    "taskkill",
                    "suspending processes is not supported on this platform",
                ));
            }
        }
        let status = command
            .status()
            .map_err(|e| Error::tool("taskkill", e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::NoSuchProcess(pid.to_string()))
        }
    }

    pub(super) fn probe(pid: u32) -> bool {
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/FO", "CSV", "/NH"])
            .output()
            .map(|out| super::tasklist_lists(&String::from_utf8_lossy(&out.stdout), pid))
            .unwrap_or(false)
    }
}

/// Whether CSV `tasklist` output has a row whose PID column is exactly `pid`.
#[cfg(any(not(unix), test))]
fn tasklist_lists(output: &str, pid: u32) -> bool {
    let pid = pid.to_string();
    output
        .lines()
        .any(|row| row.trim().split("\",\"").nth(1) == Some(pid.as_str()))
}


#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sleeper(seconds: &str) -> ProcessSpec {
        let mut spec = ProcessSpec::new("sleep");
        spec.args.push(seconds.to_string());
        spec
    }

    #[tokio::test]
    async fn test_spawn_signal_wait() {
        let control = OsProcessControl::new();
        let pid = control.spawn(&sleeper("30")).unwrap();
        assert!(control.is_alive(pid));

        control.signal(pid, SignalKind::Terminate).unwrap();
        let status = control.wait(pid, Duration::from_secs(5)).await.unwrap();
        assert_eq!(status, WaitStatus::Exited);
        assert!(!control.is_alive(pid));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let control = OsProcessControl::new();
        let pid = control.spawn(&sleeper("30")).unwrap();
        let status = control
            .wait(pid, Duration::from_millis(150))
            .await
            .unwrap();
        assert_eq!(status, WaitStatus::TimedOut);
        control.signal(pid, SignalKind::Kill).unwrap();
        control.wait(pid, Duration::from_secs(5)).await.unwrap();
    }

    #[test]
    fn test_spawn_missing_program() {
        let control = OsProcessControl::new();
        let err = control
            .spawn(&ProcessSpec::new("/nonexistent/bin/cassandra"))
            .unwrap_err();
        assert!(matches!(err, Error::ToolInvocationFailed { .. }));
    }

    #[test]
    fn test_spawn_redirects_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let stderr = dir.path().join("startup.err");
        let mut spec = ProcessSpec::new("sh");
        spec.args = vec!["-c".into(), "echo boom >&2".into()];
        spec.stderr = Some(stderr.clone());

        let control = OsProcessControl::new();
        let pid = control.spawn(&spec).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while control.is_alive(pid) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(std::fs::read_to_string(stderr).unwrap().trim(), "boom");
    }

    #[test]
    fn test_signal_unknown_pid() {
        let control = OsProcessControl::new();
        // Far above any default pid_max.
        let err = control.signal(999_999_999, SignalKind::Terminate).unwrap_err();
        assert!(matches!(err, Error::NoSuchProcess(_)));
        assert!(!control.is_alive(999_999_999));
    }
}
