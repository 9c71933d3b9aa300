//! Collaborator traits.
//!
//! The orchestrator and the command set never touch cluster storage,
//! configuration files or the OS process table directly. They go through
//! these four traits, which the binary wires to real implementations and
//! tests wire to the mocks in [`crate::mock`]:
//!
//! - [`Topology`]: which nodes exist and what peers think of them
//! - [`Installation`]: install directories and config file rewriting
//! - [`ProcessControl`]: spawning, signalling and watching server processes
//! - [`ToolInvoker`]: running external administrative tools

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::node::NodeHandle;
use crate::outcome::Outcome;
use crate::settings::{LogLevel, Settings, Workload};
use crate::version::ServerVersion;
use crate::Result;

// ============================================================================
// Topology
// ============================================================================

/// Cluster membership and cross-node observations.
pub trait Topology: Send + Sync {
    /// Load the handle for a node of the active cluster.
    ///
    /// # Errors
    ///
    /// [`crate::Error::UnknownNode`] if the cluster has no such node.
    fn resolve_node(&self, name: &str) -> Result<NodeHandle>;

    /// Whether every other live node has marked `node` as up.
    fn peers_report_up(&self, node: &NodeHandle) -> Result<bool>;

    /// Version of the server build the cluster runs.
    fn server_version(&self) -> Result<ServerVersion>;

    /// Remove a node (its process must already be stopped).
    fn remove_node(&self, node: &NodeHandle) -> Result<()>;

    /// Record the node's process id and state for later invocations.
    fn persist_node(&self, node: &NodeHandle) -> Result<()>;

    /// Remember where peer logs end, so only newer lines count as evidence
    /// for [`Topology::peers_report_up`].
    fn mark_peer_logs(&self, _node: &NodeHandle) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Installation
// ============================================================================

/// Install directories and node configuration files.
pub trait Installation: Send + Sync {
    /// Server install directory used by this node.
    fn install_directory(&self, node: &NodeHandle) -> Result<PathBuf>;

    /// Merge settings into the server configuration.
    fn rewrite_config(&self, node: &NodeHandle, settings: &Settings) -> Result<()>;

    /// Merge settings into the DSE configuration.
    fn rewrite_dse_config(&self, node: &NodeHandle, settings: &Settings) -> Result<()>;

    /// Replace the node's log configuration with the file at `path`.
    fn rewrite_log_config(&self, node: &NodeHandle, path: &Path) -> Result<()>;

    /// Switch the commit log between batch and periodic sync.
    fn set_commit_log_mode(&self, node: &NodeHandle, batch: bool) -> Result<()>;

    /// Set the root log level, or the level of one class/package.
    fn set_log_level(&self, node: &NodeHandle, level: LogLevel, class: Option<&str>)
    -> Result<()>;

    /// Point the node at another install directory or server version.
    fn set_install_dir(
        &self,
        node: &mut NodeHandle,
        install_dir: &Path,
        version: Option<&str>,
    ) -> Result<()>;

    /// Set the DSE workloads of the node.
    fn set_workloads(&self, node: &mut NodeHandle, workloads: &[Workload]) -> Result<()>;

    /// Delete data, commit logs and caches; also logs when `all`.
    fn clear(&self, node: &NodeHandle, all: bool) -> Result<()>;
}

// ============================================================================
// ProcessControl
// ============================================================================

/// Signals the orchestrator can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Polite termination request (SIGTERM).
    Terminate,
    /// Hang-up (SIGHUP).
    HangUp,
    /// Immediate, uncatchable termination (SIGKILL / forced kill).
    Kill,
    /// Suspend (SIGSTOP).
    Stop,
    /// Continue a suspended process (SIGCONT).
    Continue,
}

/// Result of waiting for a process to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Exited,
    TimedOut,
}

/// How to launch a server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// File receiving standard output; `None` inherits the terminal.
    pub stdout: Option<PathBuf>,
    /// File receiving standard error; `None` inherits the terminal.
    pub stderr: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            stdout: None,
            stderr: None,
        }
    }
}

/// Access to the OS process table.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Launch a detached server process and return its pid.
    fn spawn(&self, spec: &ProcessSpec) -> Result<u32>;

    /// Deliver a signal.
    fn signal(&self, pid: u32, kind: SignalKind) -> Result<()>;

    /// Whether the process still exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Wait until the process is gone or `timeout` elapses.
    async fn wait(&self, pid: u32, timeout: Duration) -> Result<WaitStatus>;
}

// ============================================================================
// ToolInvoker
// ============================================================================

/// Whether a tool runs with captured pipes or on the caller's terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Pipes captured; the outcome carries stdout and stderr.
    Capture,
    /// Terminal attached; the outcome carries only the status.
    Attach,
}

/// One run of an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Short tool name for diagnostics.
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub mode: InvocationMode,
    /// Text written to the tool's standard input (capture mode only).
    pub stdin: Option<String>,
}

impl ToolInvocation {
    /// Captured invocation with no extra environment.
    pub fn capture(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            mode: InvocationMode::Capture,
            stdin: None,
        }
    }

    /// Terminal-attached invocation with no extra environment.
    pub fn attach(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            mode: InvocationMode::Attach,
            ..Self::capture(tool, program)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

/// Runs external tools.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run the tool to completion.
    ///
    /// # Errors
    ///
    /// [`crate::Error::ToolInvocationFailed`] when the tool cannot be
    /// launched. A tool that runs and exits non-zero is *not* an error; its
    /// status is returned in the [`Outcome`].
    async fn invoke(&self, invocation: ToolInvocation) -> Result<Outcome>;
}
