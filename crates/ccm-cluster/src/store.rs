//! The file-backed cluster.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use regex::Regex;

use ccm_core::{
    Error, Installation, LogLevel, NodeHandle, ProcessControl, Result, ServerVersion, Settings,
    Topology, Workload, discover_tools, version::version_from_build,
};

use crate::conf_files::{commit_log_settings, rewrite_yaml, set_logback_level};
use crate::manifest::{
    CLUSTER_FILE, CURRENT_FILE, ClusterManifest, NODE_FILE, NodeManifest, read_yaml, write_yaml,
};

/// Directories wiped by `clear`.
const DATA_DIRS: [&str; 4] = ["data", "commitlogs", "saved_caches", "hints"];

/// One cluster of a ccm store directory.
pub struct FileCluster {
    directory: PathBuf,
    manifest: Mutex<ClusterManifest>,
    processes: Option<Arc<dyn ProcessControl>>,
    /// Byte offsets of peer logs recorded by `mark_peer_logs`.
    log_marks: Mutex<HashMap<String, u64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FileCluster {
    /// Open the cluster named in `<config_dir>/CURRENT`.
    pub fn open_current(config_dir: &Path) -> Result<Self> {
        let current = config_dir.join(CURRENT_FILE);
        let name = std::fs::read_to_string(&current).map_err(|e| {
            Error::config(format!(
                "no active cluster ({}: {e})",
                current.display()
            ))
        })?;
        Self::open(config_dir, name.trim())
    }

    /// Open a named cluster of the store.
    pub fn open(config_dir: &Path, name: &str) -> Result<Self> {
        let directory = config_dir.join(name);
        let manifest: ClusterManifest = read_yaml(&directory.join(CLUSTER_FILE))?;
        log::debug!(
            "Loaded cluster {} ({} nodes) from {}",
            manifest.name,
            manifest.nodes.len(),
            directory.display()
        );
        Ok(Self {
            directory,
            manifest: Mutex::new(manifest),
            processes: None,
            log_marks: Mutex::new(HashMap::new()),
        })
    }

    /// Create an empty cluster and make it the active one.
    pub fn create(config_dir: &Path, name: &str, install_dir: &Path) -> Result<Self> {
        let directory = config_dir.join(name);
        std::fs::create_dir_all(&directory).map_err(|e| Error::io_with_path(e, &directory))?;
        let manifest = ClusterManifest {
            name: name.to_string(),
            install_dir: install_dir.to_path_buf(),
            version: None,
            nodes: Vec::new(),
        };
        write_yaml(&directory.join(CLUSTER_FILE), &manifest)?;
        let current = config_dir.join(CURRENT_FILE);
        std::fs::write(&current, format!("{name}\n")).map_err(|e| Error::io_with_path(e, &current))?;
        Self::open(config_dir, name)
    }

    /// Use `processes` to tell which peers are alive.
    ///
    /// Without it a peer counts as alive when its recorded state says so.
    pub fn with_processes(mut self, processes: Arc<dyn ProcessControl>) -> Self {
        self.processes = Some(processes);
        self
    }

    pub fn name(&self) -> String {
        lock(&self.manifest).name.clone()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn node_names(&self) -> Vec<String> {
        lock(&self.manifest).nodes.clone()
    }

    /// Register a node and lay out its directories.
    pub fn add_node(&self, node: &NodeHandle) -> Result<()> {
        let dir = self.directory.join(&node.name);
        for sub in ["conf", "logs", "data", "commitlogs", "saved_caches"] {
            let path = dir.join(sub);
            std::fs::create_dir_all(&path).map_err(|e| Error::io_with_path(e, &path))?;
        }
        write_yaml(&dir.join(NODE_FILE), &NodeManifest::from_handle(node))?;

        let mut manifest = lock(&self.manifest);
        if !manifest.nodes.contains(&node.name) {
            manifest.nodes.push(node.name.clone());
        }
        write_yaml(&self.directory.join(CLUSTER_FILE), &*manifest)
    }

    fn load_node(&self, name: &str) -> Result<NodeHandle> {
        let directory = self.directory.join(name);
        let manifest: NodeManifest = read_yaml(&directory.join(NODE_FILE))?;
        let cluster = self.name();
        let mut node = manifest.into_handle(name, &cluster, directory);
        let install_dir = self.install_directory(&node)?;
        node.tools = discover_tools(&install_dir).into_iter().collect();
        Ok(node)
    }

    fn is_live(&self, node: &NodeHandle) -> bool {
        match (&self.processes, node.pid()) {
            (_, None) => false,
            (Some(processes), Some(pid)) => processes.is_alive(pid),
            (None, Some(_)) => node.state().has_process(),
        }
    }

    fn live_peers(&self, node: &NodeHandle) -> Result<Vec<NodeHandle>> {
        let mut peers = Vec::new();
        for name in self.node_names() {
            if name == node.name {
                continue;
            }
            let peer = self.load_node(&name)?;
            if self.is_live(&peer) {
                peers.push(peer);
            }
        }
        Ok(peers)
    }

    fn node_file(&self, node: &NodeHandle, rel: &str) -> PathBuf {
        node.directory.join(rel)
    }
}

/// Log text after `offset`, or the whole file if it shrank.
fn read_from(path: &Path, offset: u64) -> Result<String> {
    let mut file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(Error::io_with_path(e, path)),
    };
    let len = file
        .metadata()
        .map_err(|e| Error::io_with_path(e, path))?
        .len();
    let start = if offset > len { 0 } else { offset };
    file.seek(SeekFrom::Start(start))
        .map_err(|e| Error::io_with_path(e, path))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| Error::io_with_path(e, path))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl Topology for FileCluster {
    fn resolve_node(&self, name: &str) -> Result<NodeHandle> {
        if !lock(&self.manifest).nodes.iter().any(|n| n == name) {
            return Err(Error::UnknownNode(name.to_string()));
        }
        self.load_node(name)
    }

    fn peers_report_up(&self, node: &NodeHandle) -> Result<bool> {
        let up = Regex::new(&format!(
            r"/{}(?::\d+)?\s+is now UP",
            regex::escape(&node.address)
        ))
        .map_err(|e| Error::invalid_data(e.to_string()))?;

        let marks = lock(&self.log_marks).clone();
        for peer in self.live_peers(node)? {
            let offset = marks.get(&peer.name).copied().unwrap_or(0);
            let text = read_from(&peer.log_file, offset)?;
            if !up.is_match(&text) {
                log::trace!("{} has not yet seen {} up", peer.name, node.name);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn server_version(&self) -> Result<ServerVersion> {
        let manifest = lock(&self.manifest).clone();
        match manifest.version {
            Some(version) => version.parse(),
            None => version_from_build(&manifest.install_dir),
        }
    }

    fn remove_node(&self, node: &NodeHandle) -> Result<()> {
        let mut manifest = lock(&self.manifest);
        manifest.nodes.retain(|n| *n != node.name);
        write_yaml(&self.directory.join(CLUSTER_FILE), &*manifest)?;
        if node.directory.exists() {
            std::fs::remove_dir_all(&node.directory)
                .map_err(|e| Error::io_with_path(e, &node.directory))?;
        }
        log::info!("Removed node {} from cluster {}", node.name, manifest.name);
        Ok(())
    }

    fn persist_node(&self, node: &NodeHandle) -> Result<()> {
        let path = self.node_file(node, NODE_FILE);
        write_yaml(&path, &NodeManifest::from_handle(node))
    }

    fn mark_peer_logs(&self, node: &NodeHandle) -> Result<()> {
        let mut marks = HashMap::new();
        for peer in self.live_peers(node)? {
            let len = std::fs::metadata(&peer.log_file).map(|m| m.len()).unwrap_or(0);
            marks.insert(peer.name.clone(), len);
        }
        *lock(&self.log_marks) = marks;
        Ok(())
    }
}

impl Installation for FileCluster {
    fn install_directory(&self, node: &NodeHandle) -> Result<PathBuf> {
        Ok(match &node.install_dir {
            Some(dir) => dir.clone(),
            None => lock(&self.manifest).install_dir.clone(),
        })
    }

    fn rewrite_config(&self, node: &NodeHandle, settings: &Settings) -> Result<()> {
        rewrite_yaml(&node.conf_dir().join("cassandra.yaml"), settings, &[])
    }

    fn rewrite_dse_config(&self, node: &NodeHandle, settings: &Settings) -> Result<()> {
        rewrite_yaml(&node.conf_dir().join("dse.yaml"), settings, &[])
    }

    fn rewrite_log_config(&self, node: &NodeHandle, path: &Path) -> Result<()> {
        let target = if path.extension().is_some_and(|e| e == "xml") {
            "logback.xml"
        } else {
            "log4j-server.properties"
        };
        let dest = node.conf_dir().join(target);
        std::fs::copy(path, &dest).map_err(|e| Error::io_with_path(e, path))?;
        log::info!("Installed {} as {}", path.display(), dest.display());
        Ok(())
    }

    fn set_commit_log_mode(&self, node: &NodeHandle, batch: bool) -> Result<()> {
        let (settings, stale) = commit_log_settings(batch);
        rewrite_yaml(&node.conf_dir().join("cassandra.yaml"), &settings, &[stale])
    }

    fn set_log_level(&self, node: &NodeHandle, level: LogLevel, class: Option<&str>) -> Result<()> {
        let path = node.conf_dir().join("logback.xml");
        let xml = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
        let updated = set_logback_level(&xml, level, class)?;
        std::fs::write(&path, updated).map_err(|e| Error::io_with_path(e, &path))
    }

    fn set_install_dir(
        &self,
        node: &mut NodeHandle,
        install_dir: &Path,
        version: Option<&str>,
    ) -> Result<()> {
        if let Some(version) = version {
            return Err(Error::config(format!(
                "cannot fetch version {version}: this store only uses existing installs (use --install-dir)"
            )));
        }
        if !install_dir.join("bin").is_dir() {
            return Err(Error::config(format!(
                "{} does not look like a server install (no bin directory)",
                install_dir.display()
            )));
        }
        node.install_dir = Some(install_dir.to_path_buf());
        node.tools = discover_tools(install_dir).into_iter().collect();
        self.persist_node(node)
    }

    fn set_workloads(&self, node: &mut NodeHandle, workloads: &[Workload]) -> Result<()> {
        node.workloads = workloads.iter().map(|w| w.as_str().to_string()).collect();
        self.persist_node(node)
    }

    fn clear(&self, node: &NodeHandle, all: bool) -> Result<()> {
        let mut dirs: Vec<&str> = DATA_DIRS.to_vec();
        if all {
            dirs.push("logs");
        }
        for sub in dirs {
            let path = node.directory.join(sub);
            if path.exists() {
                std::fs::remove_dir_all(&path).map_err(|e| Error::io_with_path(e, &path))?;
            }
            std::fs::create_dir_all(&path).map_err(|e| Error::io_with_path(e, &path))?;
        }
        log::info!("Cleared {}", node.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccm_core::NodeState;
    use ccm_core::mock::MockProcesses;
    use tempfile::TempDir;

    struct Store {
        dir: TempDir,
        cluster: FileCluster,
    }

    fn store(nodes: usize) -> Store {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("install");
        std::fs::create_dir_all(install.join("bin")).unwrap();
        std::fs::write(install.join("bin/nodetool"), "").unwrap();
        std::fs::write(
            install.join("build.xml"),
            r#"<property name="base.version" value="3.11.4"/>"#,
        )
        .unwrap();

        let config_dir = dir.path().join("ccm");
        let cluster = FileCluster::create(&config_dir, "test", &install).unwrap();
        for i in 1..=nodes {
            let name = format!("node{i}");
            let node = NodeHandle::new(&name, "test", config_dir.join("test").join(&name))
                .with_address(format!("127.0.0.{i}"));
            cluster.add_node(&node).unwrap();
        }
        Store { dir, cluster }
    }

    #[test]
    fn test_open_current_and_resolve() {
        let s = store(2);
        let cluster = FileCluster::open_current(&s.dir.path().join("ccm")).unwrap();
        assert_eq!(cluster.name(), "test");
        assert_eq!(cluster.node_names(), vec!["node1", "node2"]);

        let node = cluster.resolve_node("node2").unwrap();
        assert_eq!(node.address, "127.0.0.2");
        assert!(node.has_tool("nodetool"));
        assert!(matches!(
            cluster.resolve_node("node7"),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn test_open_current_without_store() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FileCluster::open_current(dir.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_persist_node_round_trip() {
        let s = store(1);
        let mut node = s.cluster.resolve_node("node1").unwrap();
        node.begin_start(999).unwrap();
        s.cluster.persist_node(&node).unwrap();

        let reloaded = s.cluster.resolve_node("node1").unwrap();
        assert_eq!(reloaded.pid(), Some(999));
        assert_eq!(reloaded.state(), NodeState::Starting);
    }

    #[test]
    fn test_server_version_from_build() {
        let s = store(1);
        assert_eq!(
            s.cluster.server_version().unwrap(),
            ServerVersion::new(3, 11, 4)
        );
    }

    #[test]
    fn test_remove_node() {
        let s = store(2);
        let node = s.cluster.resolve_node("node2").unwrap();
        s.cluster.remove_node(&node).unwrap();
        assert!(!node.directory.exists());
        assert_eq!(s.cluster.node_names(), vec!["node1"]);

        let reopened = FileCluster::open_current(&s.dir.path().join("ccm")).unwrap();
        assert_eq!(reopened.node_names(), vec!["node1"]);
    }

    #[test]
    fn test_peers_report_up_after_mark() {
        let s = store(2);
        let processes = MockProcesses::new().with_alive(500);
        let cluster = FileCluster::open_current(&s.dir.path().join("ccm"))
            .unwrap()
            .with_processes(Arc::new(processes));

        let mut peer = cluster.resolve_node("node1").unwrap();
        peer.begin_start(500).unwrap();
        cluster.persist_node(&peer).unwrap();
        std::fs::write(
            &peer.log_file,
            "INFO Gossiper.java:1 - InetAddress /127.0.0.2 is now UP\n",
        )
        .unwrap();

        let node = cluster.resolve_node("node2").unwrap();
        assert!(cluster.peers_report_up(&node).unwrap());

        // Lines before the mark do not count.
        cluster.mark_peer_logs(&node).unwrap();
        assert!(!cluster.peers_report_up(&node).unwrap());

        let mut log = std::fs::read_to_string(&peer.log_file).unwrap();
        log.push_str("INFO Gossiper.java:1 - InetAddress /127.0.0.2:7000 is now UP\n");
        std::fs::write(&peer.log_file, log).unwrap();
        assert!(cluster.peers_report_up(&node).unwrap());
    }

    #[test]
    fn test_peers_ignore_similar_addresses() {
        let s = store(2);
        let mut peer = s.cluster.resolve_node("node1").unwrap();
        peer.begin_start(500).unwrap();
        s.cluster.persist_node(&peer).unwrap();
        std::fs::write(&peer.log_file, "InetAddress /127.0.0.20 is now UP\n").unwrap();

        let node = s.cluster.resolve_node("node2").unwrap();
        assert!(!s.cluster.peers_report_up(&node).unwrap());
    }

    #[test]
    fn test_no_live_peers_means_up() {
        let s = store(2);
        let node = s.cluster.resolve_node("node2").unwrap();
        assert!(s.cluster.peers_report_up(&node).unwrap());
    }

    #[test]
    fn test_commit_log_and_config() {
        let s = store(1);
        let node = s.cluster.resolve_node("node1").unwrap();
        s.cluster.set_commit_log_mode(&node, false).unwrap();
        let yaml = std::fs::read_to_string(node.conf_dir().join("cassandra.yaml")).unwrap();
        assert!(yaml.contains("commitlog_sync: periodic"));
        assert!(yaml.contains("commitlog_sync_period_in_ms: 10000"));
    }

    #[test]
    fn test_set_install_dir() {
        let s = store(1);
        let mut node = s.cluster.resolve_node("node1").unwrap();
        assert!(matches!(
            s.cluster.set_install_dir(&mut node, s.dir.path(), Some("4.0.1")),
            Err(Error::Config(_))
        ));
        assert!(s
            .cluster
            .set_install_dir(&mut node, &s.dir.path().join("nowhere"), None)
            .is_err());

        let other = s.dir.path().join("other");
        std::fs::create_dir_all(other.join("bin")).unwrap();
        std::fs::write(other.join("bin/cqlsh"), "").unwrap();
        s.cluster.set_install_dir(&mut node, &other, None).unwrap();

        let reloaded = s.cluster.resolve_node("node1").unwrap();
        assert_eq!(reloaded.install_dir, Some(other));
        assert!(reloaded.has_tool("cqlsh"));
        assert!(!reloaded.has_tool("nodetool"));
    }

    #[test]
    fn test_set_workloads() {
        let s = store(1);
        let mut node = s.cluster.resolve_node("node1").unwrap();
        s.cluster
            .set_workloads(&mut node, &[Workload::Cassandra, Workload::Spark])
            .unwrap();
        let reloaded = s.cluster.resolve_node("node1").unwrap();
        assert_eq!(reloaded.workloads, vec!["cassandra", "spark"]);
    }

    #[test]
    fn test_clear() {
        let s = store(1);
        let node = s.cluster.resolve_node("node1").unwrap();
        std::fs::create_dir_all(node.data_dir().join("ks1")).unwrap();
        std::fs::write(&node.log_file, "log").unwrap();

        s.cluster.clear(&node, false).unwrap();
        assert!(node.data_dir().exists());
        assert!(!node.data_dir().join("ks1").exists());
        assert!(node.log_file.exists());

        s.cluster.clear(&node, true).unwrap();
        assert!(!node.log_file.exists());
    }

    #[test]
    fn test_set_log_level() {
        let s = store(1);
        let node = s.cluster.resolve_node("node1").unwrap();
        std::fs::write(
            node.conf_dir().join("logback.xml"),
            "<configuration>\n  <root level=\"INFO\"/>\n</configuration>\n",
        )
        .unwrap();
        s.cluster.set_log_level(&node, LogLevel::Debug, None).unwrap();
        let xml = std::fs::read_to_string(node.conf_dir().join("logback.xml")).unwrap();
        assert!(xml.contains(r#"<root level="DEBUG"/>"#));
    }
}
