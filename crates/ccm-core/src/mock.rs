//! In-memory collaborators for testing.
//!
//! Useful for exercising the orchestrator and the command set without
//! touching the filesystem layout of a real cluster or the OS process table.
//! Every mock is `Clone`; clones share state, so a test can keep one copy
//! for assertions while another is wired into the code under test.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::node::NodeHandle;
use crate::outcome::Outcome;
use crate::settings::{LogLevel, Settings, Workload};
use crate::traits::{
    Installation, ProcessControl, ProcessSpec, SignalKind, ToolInvocation, ToolInvoker,
    Topology, WaitStatus,
};
use crate::version::ServerVersion;
use crate::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MockTopology
// ============================================================================

/// Topology backed by a map of node handles.
#[derive(Clone)]
pub struct MockTopology {
    inner: Arc<Mutex<TopologyState>>,
}

struct TopologyState {
    nodes: BTreeMap<String, NodeHandle>,
    peers_up: bool,
    version: ServerVersion,
    removed: Vec<String>,
    marks: usize,
}

impl MockTopology {
    /// Empty cluster running 4.0.0 whose peers always report up.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TopologyState {
                nodes: BTreeMap::new(),
                peers_up: true,
                version: ServerVersion::new(4, 0, 0),
                removed: Vec::new(),
                marks: 0,
            })),
        }
    }

    pub fn with_node(self, node: NodeHandle) -> Self {
        lock(&self.inner).nodes.insert(node.name.clone(), node);
        self
    }

    pub fn with_peers_up(self, up: bool) -> Self {
        self.set_peers_up(up);
        self
    }

    pub fn with_version(self, version: ServerVersion) -> Self {
        lock(&self.inner).version = version;
        self
    }

    pub fn set_peers_up(&self, up: bool) {
        lock(&self.inner).peers_up = up;
    }

    /// Last persisted copy of a node.
    pub fn node(&self, name: &str) -> Option<NodeHandle> {
        lock(&self.inner).nodes.get(name).cloned()
    }

    /// Names of removed nodes, in removal order.
    pub fn removed(&self) -> Vec<String> {
        lock(&self.inner).removed.clone()
    }

    /// How many times peer logs were marked.
    pub fn marks(&self) -> usize {
        lock(&self.inner).marks
    }
}

impl Default for MockTopology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology for MockTopology {
    fn resolve_node(&self, name: &str) -> Result<NodeHandle> {
        lock(&self.inner)
            .nodes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownNode(name.to_string()))
    }

    fn peers_report_up(&self, _node: &NodeHandle) -> Result<bool> {
        Ok(lock(&self.inner).peers_up)
    }

    fn server_version(&self) -> Result<ServerVersion> {
        Ok(lock(&self.inner).version.clone())
    }

    fn remove_node(&self, node: &NodeHandle) -> Result<()> {
        let mut state = lock(&self.inner);
        state.nodes.remove(&node.name);
        state.removed.push(node.name.clone());
        Ok(())
    }

    fn persist_node(&self, node: &NodeHandle) -> Result<()> {
        lock(&self.inner)
            .nodes
            .insert(node.name.clone(), node.clone());
        Ok(())
    }

    fn mark_peer_logs(&self, _node: &NodeHandle) -> Result<()> {
        lock(&self.inner).marks += 1;
        Ok(())
    }
}

// ============================================================================
// MockInstallation
// ============================================================================

/// A call recorded by [`MockInstallation`].
#[derive(Debug, Clone, PartialEq)]
pub enum InstallCall {
    RewriteConfig { node: String, settings: Settings },
    RewriteDseConfig { node: String, settings: Settings },
    RewriteLogConfig { node: String, path: PathBuf },
    CommitLogMode { node: String, batch: bool },
    LogLevel { node: String, level: LogLevel, class: Option<String> },
    InstallDir { node: String, dir: PathBuf, version: Option<String> },
    Workloads { node: String, workloads: Vec<Workload> },
    Clear { node: String, all: bool },
}

/// Installation that records every call and touches nothing.
#[derive(Clone)]
pub struct MockInstallation {
    install_dir: PathBuf,
    calls: Arc<Mutex<Vec<InstallCall>>>,
}

impl MockInstallation {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<InstallCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: InstallCall) {
        lock(&self.calls).push(call);
    }
}

impl Installation for MockInstallation {
    fn install_directory(&self, node: &NodeHandle) -> Result<PathBuf> {
        Ok(node
            .install_dir
            .clone()
            .unwrap_or_else(|| self.install_dir.clone()))
    }

    fn rewrite_config(&self, node: &NodeHandle, settings: &Settings) -> Result<()> {
        self.record(InstallCall::RewriteConfig {
            node: node.name.clone(),
            settings: settings.clone(),
        });
        Ok(())
    }

    fn rewrite_dse_config(&self, node: &NodeHandle, settings: &Settings) -> Result<()> {
        self.record(InstallCall::RewriteDseConfig {
            node: node.name.clone(),
            settings: settings.clone(),
        });
        Ok(())
    }

    fn rewrite_log_config(&self, node: &NodeHandle, path: &Path) -> Result<()> {
        self.record(InstallCall::RewriteLogConfig {
            node: node.name.clone(),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn set_commit_log_mode(&self, node: &NodeHandle, batch: bool) -> Result<()> {
        self.record(InstallCall::CommitLogMode {
            node: node.name.clone(),
            batch,
        });
        Ok(())
    }

    fn set_log_level(
        &self,
        node: &NodeHandle,
        level: LogLevel,
        class: Option<&str>,
    ) -> Result<()> {
        self.record(InstallCall::LogLevel {
            node: node.name.clone(),
            level,
            class: class.map(str::to_string),
        });
        Ok(())
    }

    fn set_install_dir(
        &self,
        node: &mut NodeHandle,
        install_dir: &Path,
        version: Option<&str>,
    ) -> Result<()> {
        node.install_dir = Some(install_dir.to_path_buf());
        self.record(InstallCall::InstallDir {
            node: node.name.clone(),
            dir: install_dir.to_path_buf(),
            version: version.map(str::to_string),
        });
        Ok(())
    }

    fn set_workloads(&self, node: &mut NodeHandle, workloads: &[Workload]) -> Result<()> {
        node.workloads = workloads.iter().map(|w| w.to_string()).collect();
        self.record(InstallCall::Workloads {
            node: node.name.clone(),
            workloads: workloads.to_vec(),
        });
        Ok(())
    }

    fn clear(&self, node: &NodeHandle, all: bool) -> Result<()> {
        self.record(InstallCall::Clear {
            node: node.name.clone(),
            all,
        });
        Ok(())
    }
}

// ============================================================================
// MockProcesses
// ============================================================================

/// Simulated process table.
///
/// Spawned processes stay alive until a terminating signal arrives (unless
/// [`MockProcesses::ignore_termination`] was called, in which case only
/// [`SignalKind::Kill`] works).
#[derive(Clone)]
pub struct MockProcesses {
    inner: Arc<Mutex<ProcessTable>>,
}

struct ProcessTable {
    next_pid: u32,
    processes: BTreeMap<u32, MockProcess>,
    spawned: Vec<ProcessSpec>,
    signals: Vec<(u32, SignalKind)>,
    crash_stderr: Option<String>,
    ignore_termination: bool,
    exit_on_continue: bool,
}

#[derive(Debug, Clone, Copy)]
struct MockProcess {
    alive: bool,
    paused: bool,
}

impl MockProcesses {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProcessTable {
                next_pid: 1000,
                processes: BTreeMap::new(),
                spawned: Vec::new(),
                signals: Vec::new(),
                crash_stderr: None,
                ignore_termination: false,
                exit_on_continue: false,
            })),
        }
    }

    /// Spawned processes die immediately, writing `stderr` to the `ProcessSpec`
    /// stderr file when one is given.
    pub fn crash_on_spawn(self, stderr: impl Into<String>) -> Self {
        lock(&self.inner).crash_stderr = Some(stderr.into());
        self
    }

    /// Terminate and hang-up signals are recorded but have no effect.
    pub fn ignore_termination(self) -> Self {
        lock(&self.inner).ignore_termination = true;
        self
    }

    /// A continue signal finds the process already gone: it exits and the
    /// signal fails with [`Error::NoSuchProcess`].
    pub fn exit_on_continue(self) -> Self {
        lock(&self.inner).exit_on_continue = true;
        self
    }

    /// Register an already running process.
    pub fn with_alive(self, pid: u32) -> Self {
        lock(&self.inner).processes.insert(
            pid,
            MockProcess {
                alive: true,
                paused: false,
            },
        );
        self
    }

    /// Make a process disappear as if it crashed.
    pub fn kill_externally(&self, pid: u32) {
        if let Some(p) = lock(&self.inner).processes.get_mut(&pid) {
            p.alive = false;
        }
    }

    pub fn spawned(&self) -> Vec<ProcessSpec> {
        lock(&self.inner).spawned.clone()
    }

    pub fn signals(&self) -> Vec<(u32, SignalKind)> {
        lock(&self.inner).signals.clone()
    }

    pub fn is_paused(&self, pid: u32) -> bool {
        lock(&self.inner)
            .processes
            .get(&pid)
            .is_some_and(|p| p.paused)
    }
}

impl Default for MockProcesses {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessControl for MockProcesses {
    fn spawn(&self, spec: &ProcessSpec) -> Result<u32> {
        let mut table = lock(&self.inner);
        let pid = table.next_pid;
        table.next_pid += 1;
        table.spawned.push(spec.clone());

        let alive = match &table.crash_stderr {
            Some(stderr) => {
                if let Some(path) = &spec.stderr {
                    std::fs::write(path, stderr).map_err(|e| Error::io_with_path(e, path))?;
                }
                false
            }
            None => true,
        };
        table.processes.insert(
            pid,
            MockProcess {
                alive,
                paused: false,
            },
        );
        Ok(pid)
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> Result<()> {
        let mut table = lock(&self.inner);
        table.signals.push((pid, kind));
        let ignore = table.ignore_termination;
        let exit_on_continue = table.exit_on_continue;
        let process = table
            .processes
            .get_mut(&pid)
            .filter(|p| p.alive)
            .ok_or_else(|| Error::NoSuchProcess(pid.to_string()))?;
        match kind {
            SignalKind::Kill => process.alive = false,
            SignalKind::Terminate | SignalKind::HangUp if !ignore => process.alive = false,
            SignalKind::Terminate | SignalKind::HangUp => {}
            SignalKind::Stop => process.paused = true,
            SignalKind::Continue if exit_on_continue => {
                process.alive = false;
                return Err(Error::NoSuchProcess(pid.to_string()));
            }
            SignalKind::Continue => process.paused = false,
        }
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        lock(&self.inner)
            .processes
            .get(&pid)
            .is_some_and(|p| p.alive)
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
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

// ============================================================================
// RecordingInvoker
// ============================================================================

/// Tool invoker that records invocations and returns canned outcomes.
#[derive(Clone, Default)]
pub struct RecordingInvoker {
    inner: Arc<Mutex<InvokerState>>,
}

#[derive(Default)]
struct InvokerState {
    calls: Vec<ToolInvocation>,
    responses: BTreeMap<String, Outcome>,
    missing: Vec<String>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `outcome` whenever `tool` is invoked.
    pub fn with_response(self, tool: impl Into<String>, outcome: Outcome) -> Self {
        lock(&self.inner).responses.insert(tool.into(), outcome);
        self
    }

    /// Fail invocations of `tool` as if it were not installed.
    pub fn with_missing(self, tool: impl Into<String>) -> Self {
        lock(&self.inner).missing.push(tool.into());
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        lock(&self.inner).calls.clone()
    }
}

#[async_trait]
impl ToolInvoker for RecordingInvoker {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<Outcome> {
        let mut state = lock(&self.inner);
        if state.missing.contains(&invocation.tool) {
            return Err(Error::tool(&invocation.tool, "not found"));
        }
        let outcome = state
            .responses
            .get(&invocation.tool)
            .cloned()
            .unwrap_or_default();
        state.calls.push(invocation);
        Ok(outcome)
    }
}
