//! The node handle and its lifecycle state.
//!
//! A [`NodeHandle`] describes one locally-run server process: where it lives
//! on disk, which ports it answers on, which administrative tools its build
//! ships, and (when running) its process id.
//!
//! The pid and [`NodeState`] are private and only change through the
//! transition methods, which keep the invariant that every state other than
//! [`NodeState::Stopped`] carries a pid.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[default]
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
}

impl NodeState {
    /// Whether this state requires a tracked process id.
    pub fn has_process(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// One addressable node of a local test cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeHandle {
    /// Node name, unique within its cluster.
    pub name: String,
    /// Name of the owning cluster.
    pub cluster: String,
    /// Node directory (conf, logs, data).
    pub directory: PathBuf,
    /// Listen address for every interface.
    pub address: String,
    /// Administrative (JMX) port.
    pub jmx_port: u16,
    /// Native client protocol port.
    pub binary_port: u16,
    /// Thrift RPC port, used by the legacy cli.
    pub rpc_port: u16,
    /// Byteman agent port, when the agent is enabled.
    pub byteman_port: Option<u16>,
    /// Per-node install directory override.
    pub install_dir: Option<PathBuf>,
    /// DSE workloads enabled on this node.
    pub workloads: Vec<String>,
    /// Main server log.
    pub log_file: PathBuf,
    /// Administrative tools shipped by this node's server build.
    pub tools: BTreeMap<String, PathBuf>,
    pid: Option<u32>,
    state: NodeState,
}

impl NodeHandle {
    /// Create a stopped node with default loopback ports.
    pub fn new(
        name: impl Into<String>,
        cluster: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        let directory = directory.into();
        Self {
            name: name.into(),
            cluster: cluster.into(),
            log_file: directory.join("logs").join("system.log"),
            directory,
            address: "127.0.0.1".to_string(),
            jmx_port: 7199,
            binary_port: 9042,
            rpc_port: 9160,
            byteman_port: None,
            install_dir: None,
            workloads: Vec::new(),
            tools: BTreeMap::new(),
            pid: None,
            state: NodeState::Stopped,
        }
    }

    /// Set the listen address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the JMX, native protocol and RPC ports.
    pub fn with_ports(mut self, jmx: u16, binary: u16, rpc: u16) -> Self {
        self.jmx_port = jmx;
        self.binary_port = binary;
        self.rpc_port = rpc;
        self
    }

    /// Register an administrative tool.
    pub fn with_tool(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(name.into(), path.into());
        self
    }

    /// Restore persisted process bookkeeping.
    ///
    /// A missing pid always means [`NodeState::Stopped`]; a pid recorded
    /// against a stopped state is treated as running.
    pub fn with_process(mut self, pid: Option<u32>, state: NodeState) -> Self {
        match pid {
            None => {
                self.pid = None;
                self.state = NodeState::Stopped;
            }
            Some(pid) => {
                self.pid = Some(pid);
                self.state = if state == NodeState::Stopped {
                    NodeState::Running
                } else {
                    state
                };
            }
        }
        self
    }

    /// Tracked process id.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// `Stopped → Starting`, recording the new pid.
    pub fn begin_start(&mut self, pid: u32) -> Result<()> {
        self.require(&[NodeState::Stopped], NodeState::Starting)?;
        self.pid = Some(pid);
        self.state = NodeState::Starting;
        Ok(())
    }

    /// `Starting | Paused → Running`.
    pub fn mark_running(&mut self) -> Result<()> {
        self.require(&[NodeState::Starting, NodeState::Paused], NodeState::Running)?;
        self.state = NodeState::Running;
        Ok(())
    }

    /// `Running → Paused`.
    pub fn mark_paused(&mut self) -> Result<()> {
        self.require(&[NodeState::Running], NodeState::Paused)?;
        self.state = NodeState::Paused;
        Ok(())
    }

    /// Any live state `→ Stopping`.
    pub fn begin_stop(&mut self) -> Result<()> {
        self.require(
            &[
                NodeState::Running,
                NodeState::Starting,
                NodeState::Paused,
                NodeState::Stopping,
            ],
            NodeState::Stopping,
        )?;
        self.state = NodeState::Stopping;
        Ok(())
    }

    /// Any state `→ Stopped`, clearing the pid.
    pub fn mark_stopped(&mut self) {
        self.pid = None;
        self.state = NodeState::Stopped;
    }

    fn require(&self, from: &[NodeState], to: NodeState) -> Result<()> {
        if from.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::invalid_data(format!(
                "node {}: illegal transition {} -> {}",
                self.name, self.state, to
            )))
        }
    }

    /// Node configuration directory.
    pub fn conf_dir(&self) -> PathBuf {
        self.directory.join("conf")
    }

    /// Node data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.directory.join("data")
    }

    /// Node log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.directory.join("logs")
    }

    /// Where the server's standard output goes when not shown.
    pub fn stdout_file(&self) -> PathBuf {
        self.log_dir().join("startup.out")
    }

    /// Where the server's standard error is captured.
    pub fn stderr_file(&self) -> PathBuf {
        self.log_dir().join("startup.err")
    }

    /// Path of a named administrative tool, if this build ships it.
    pub fn tool(&self, name: &str) -> Option<&Path> {
        self.tools.get(name).map(PathBuf::as_path)
    }

    /// Whether this build ships a named tool.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeHandle {
        NodeHandle::new("node1", "test", "/tmp/ccm/test/node1")
    }

    #[test]
    fn test_new_node_is_stopped() {
        let n = node();
        assert_eq!(n.state(), NodeState::Stopped);
        assert!(n.pid().is_none());
        assert_eq!(n.log_file, PathBuf::from("/tmp/ccm/test/node1/logs/system.log"));
    }

    #[test]
    fn test_full_cycle() {
        let mut n = node();
        n.begin_start(42).unwrap();
        assert_eq!(n.state(), NodeState::Starting);
        assert_eq!(n.pid(), Some(42));
        n.mark_running().unwrap();
        n.mark_paused().unwrap();
        n.mark_running().unwrap();
        n.begin_stop().unwrap();
        assert_eq!(n.pid(), Some(42));
        n.mark_stopped();
        assert_eq!(n.state(), NodeState::Stopped);
        assert!(n.pid().is_none());
    }

    #[test]
    fn test_pause_requires_running() {
        let mut n = node();
        assert!(n.mark_paused().is_err());
        n.begin_start(1).unwrap();
        assert!(n.mark_paused().is_err());
    }

    #[test]
    fn test_start_requires_stopped() {
        let mut n = node();
        n.begin_start(1).unwrap();
        assert!(n.begin_start(2).is_err());
        assert_eq!(n.pid(), Some(1));
    }

    #[test]
    fn test_stop_requires_process() {
        let mut n = node();
        assert!(n.begin_stop().is_err());
    }

    #[test]
    fn test_with_process_normalizes() {
        let n = node().with_process(None, NodeState::Running);
        assert_eq!(n.state(), NodeState::Stopped);

        let n = node().with_process(Some(7), NodeState::Stopped);
        assert_eq!(n.state(), NodeState::Running);

        let n = node().with_process(Some(7), NodeState::Paused);
        assert_eq!(n.state(), NodeState::Paused);
        assert!(n.state().has_process());
    }

    #[test]
    fn test_tools() {
        let n = node().with_tool("nodetool", "/opt/c/bin/nodetool");
        assert!(n.has_tool("nodetool"));
        assert!(!n.has_tool("sstabledump"));
        assert_eq!(n.tool("nodetool"), Some(Path::new("/opt/c/bin/nodetool")));
    }

    #[test]
    fn test_state_serde_lowercase() {
        let yaml = serde_yaml::to_string(&NodeState::Paused).unwrap();
        assert_eq!(yaml.trim(), "paused");
    }
}
