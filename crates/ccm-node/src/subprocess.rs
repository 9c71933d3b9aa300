//! Scoped tool subprocesses.
//!
//! Every tool runs under a child handle spawned with `kill_on_drop`, so an
//! early return or a dropped future never leaves the tool behind. Pipes are
//! owned by the handle and closed when it completes or is dropped.
//!
//! An attached session owns the terminal. While it runs, `ccm` ignores the
//! terminal's interrupt and quit signals so a Ctrl-C meant for the tool
//! cannot kill `ccm` and orphan the tool.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, warn};

use ccm_core::{Error, InvocationMode, Outcome, Result, ToolInvocation, ToolInvoker};

/// [`ToolInvoker`] that runs tools as child processes of `ccm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subprocess;

impl Subprocess {
    pub fn new() -> Self {
        Self
    }
}

fn command_for(invocation: &ToolInvocation) -> Command {
    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args).kill_on_drop(true);
    for (key, value) in &invocation.env {
        command.env(key, value);
    }
    if let Some(cwd) = &invocation.cwd {
        command.current_dir(cwd);
    }
    command
}

/// Exit status as an integer; signal deaths map to 128 + signal on Unix.
fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(unix)]
type SavedActions = Vec<(nix::sys::signal::Signal, nix::sys::signal::SigAction)>;

/// Number of live attached sessions and the dispositions to restore when the
/// last one ends.
#[cfg(unix)]
static TERMINAL_SIGNALS: std::sync::Mutex<(usize, SavedActions)> =
    std::sync::Mutex::new((0, Vec::new()));

/// Ignores SIGINT and SIGQUIT while any instance is alive. Dropping the last
/// instance restores the previous dispositions.
#[cfg(unix)]
struct TerminalSignalsIgnored;

#[cfg(unix)]
impl TerminalSignalsIgnored {
    fn install() -> Self {
        use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

        let mut state = TERMINAL_SIGNALS
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.0 == 0 {
            let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
            state.1 = [Signal::SIGINT, Signal::SIGQUIT]
                .into_iter()
                .filter_map(|sig| {
                    // SAFETY: SIG_IGN runs no handler code in this process.
                    match unsafe { sigaction(sig, &ignore) } {
                        Ok(previous) => Some((sig, previous)),
                        Err(e) => {
                            warn!(?sig, error = %e, "Could not ignore terminal signal");
                            None
                        }
                    }
                })
                .collect();
        }
        state.0 += 1;
        Self
    }
}

#[cfg(unix)]
impl Drop for TerminalSignalsIgnored {
    fn drop(&mut self) {
        let mut state = TERMINAL_SIGNALS
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.0 = state.0.saturating_sub(1);
        if state.0 == 0 {
            for (sig, previous) in state.1.drain(..) {
                // SAFETY: reinstates the disposition that was in place before.
                let _ = unsafe { nix::sys::signal::sigaction(sig, &previous) };
            }
        }
    }
}

/// Run an attached session to completion.
///
/// The child is spawned before the signals are ignored so it starts with the
/// terminal defaults.
async fn run_attached(mut command: Command) -> std::io::Result<ExitStatus> {
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    let mut child = command.spawn()?;
    #[cfg(unix)]
    let _ignored = TerminalSignalsIgnored::install();
    child.wait().await
}

/// Feed `input` to the child's stdin, closing it afterwards. A tool that
/// exits without reading everything is not an error.
async fn feed_stdin(stdin: Option<ChildStdin>, input: Option<String>) -> std::io::Result<()> {
    let (Some(mut stdin), Some(input)) = (stdin, input) else {
        return Ok(());
    };
    match stdin.write_all(input.as_bytes()).await {
        Ok(()) => stdin.shutdown().await,
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ToolInvoker for Subprocess {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<Outcome> {
        let spawn_error = |e: std::io::Error| {
            Error::tool(
                &invocation.tool,
                format!("failed to run {}: {e}", invocation.program.display()),
            )
        };
        let mut command = command_for(&invocation);

        debug!(
            tool = %invocation.tool,
            program = %invocation.program.display(),
            args = ?invocation.args,
            mode = ?invocation.mode,
            "Invoking tool"
        );

        match invocation.mode {
            InvocationMode::Attach => {
                let status = run_attached(command).await.map_err(spawn_error)?;
                info!(tool = %invocation.tool, %status, "Tool session ended");
                Ok(Outcome::from_status(status_code(status)))
            }
            InvocationMode::Capture => {
                command
                    .stdin(if invocation.stdin.is_some() {
                        Stdio::piped()
                    } else {
                        Stdio::null()
                    })
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
                let mut child = command.spawn().map_err(spawn_error)?;
                let stdin = child.stdin.take();
                let (fed, output) = tokio::join!(
                    feed_stdin(stdin, invocation.stdin.clone()),
                    child.wait_with_output()
                );
                let output = output?;
                fed?;
                let outcome = Outcome {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    status: status_code(output.status),
                };
                debug!(tool = %invocation.tool, status = outcome.status, "Tool finished");
                Ok(outcome)
            }
        }
    }
}
