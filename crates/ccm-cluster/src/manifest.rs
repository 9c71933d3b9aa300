//! YAML manifests of the cluster store.
//!
//! ```text
//! <config_dir>/
//!   CURRENT                  name of the active cluster
//!   <cluster>/cluster.conf   ClusterManifest
//!   <cluster>/<node>/node.conf NodeManifest
//! ```

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use ccm_core::{Error, NodeHandle, NodeState, Result};

pub const CURRENT_FILE: &str = "CURRENT";
pub const CLUSTER_FILE: &str = "cluster.conf";
pub const NODE_FILE: &str = "node.conf";

/// `cluster.conf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterManifest {
    pub name: String,
    pub install_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Node names in creation order.
    #[serde(default)]
    pub nodes: Vec<String>,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_jmx_port() -> u16 {
    7199
}

fn default_binary_port() -> u16 {
    9042
}

fn default_rpc_port() -> u16 {
    9160
}

/// `node.conf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeManifest {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_jmx_port")]
    pub jmx_port: u16,
    #[serde(default = "default_binary_port")]
    pub binary_port: u16,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byteman_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default)]
    pub state: NodeState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workloads: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
}

impl NodeManifest {
    pub fn from_handle(node: &NodeHandle) -> Self {
        Self {
            address: node.address.clone(),
            jmx_port: node.jmx_port,
            binary_port: node.binary_port,
            rpc_port: node.rpc_port,
            byteman_port: node.byteman_port,
            pid: node.pid(),
            state: node.state(),
            workloads: node.workloads.clone(),
            install_dir: node.install_dir.clone(),
        }
    }

    /// Build the handle for node `name` stored in `directory`.
    pub fn into_handle(self, name: &str, cluster: &str, directory: PathBuf) -> NodeHandle {
        let mut node = NodeHandle::new(name, cluster, directory)
            .with_address(self.address)
            .with_ports(self.jmx_port, self.binary_port, self.rpc_port)
            .with_process(self.pid, self.state);
        node.byteman_port = self.byteman_port;
        node.workloads = self.workloads;
        node.install_dir = self.install_dir;
        node
    }
}

pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
    serde_yaml::from_str(&content)
        .map_err(|e| Error::Serialization(format!("{}: {e}", path.display())))
}

pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_yaml::to_string(value)?;
    std::fs::write(path, content).map_err(|e| Error::io_with_path(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_manifest_defaults() {
        let manifest: NodeManifest = serde_yaml::from_str("address: 127.0.0.2\n").unwrap();
        assert_eq!(manifest.jmx_port, 7199);
        assert_eq!(manifest.state, NodeState::Stopped);
        assert!(manifest.pid.is_none());
    }

    #[test]
    fn test_handle_round_trip() {
        let mut node = NodeHandle::new("node2", "test", "/tmp/test/node2")
            .with_address("127.0.0.2")
            .with_ports(7200, 9043, 9161);
        node.begin_start(321).unwrap();
        node.workloads = vec!["spark".into()];

        let manifest = NodeManifest::from_handle(&node);
        let yaml = serde_yaml::to_string(&manifest).unwrap();
        assert!(yaml.contains("state: starting"));

        let restored: NodeManifest = serde_yaml::from_str(&yaml).unwrap();
        let handle = restored.into_handle("node2", "test", "/tmp/test/node2".into());
        assert_eq!(handle.pid(), Some(321));
        assert_eq!(handle.state(), NodeState::Starting);
        assert_eq!(handle.jmx_port, 7200);
        assert_eq!(handle.workloads, vec!["spark".to_string()]);
    }

    #[test]
    fn test_read_yaml_errors_name_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CLUSTER_FILE);
        std::fs::write(&path, "name: [unclosed").unwrap();
        let err = read_yaml::<ClusterManifest>(&path).unwrap_err();
        assert!(err.to_string().contains("cluster.conf"));
    }
}
