//! Node lifecycle orchestration.
//!
//! [`Lifecycle`] drives a [`NodeHandle`] through start, stop, pause and
//! resume. It owns no state of its own: the pid and state live on the handle
//! and are persisted through the [`Topology`] after every transition, and the
//! OS is reached only through [`ProcessControl`].
//!
//! Every operation first reconciles the handle against the process table, so
//! a node whose process died behind our back is treated as stopped.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use ccm_core::{
    Error, HostPlatform, Installation, NodeHandle, NodeState, ProcessControl, ProcessSpec,
    Result, SignalKind, Topology, WaitStatus,
};

use crate::signals::{ShutdownSignal, ShutdownSignalPolicy};

/// Default time allowed for a node to become ready.
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(120);

/// Default time allowed for a node to exit after being signalled.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay between readiness and exit checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Bounds on the orchestrator's polling loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimings {
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LifecycleTimings {
    fn default() -> Self {
        Self {
            start_timeout: DEFAULT_START_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Options for [`Lifecycle::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    /// Join the token ring on startup.
    pub join_ring: bool,
    /// Return as soon as the process is spawned.
    pub no_wait: bool,
    /// Wait until every other live node reports this one as up.
    pub wait_other_notice: bool,
    /// Wait until the native protocol port accepts connections.
    pub wait_for_binary_proto: bool,
    /// Address of a dead node this one replaces.
    pub replace_address: Option<String>,
    /// Extra JVM arguments, in order.
    pub jvm_args: Vec<String>,
    /// Allow the server to run as root.
    pub allow_root: bool,
    /// Suppress the console window (Windows hosts only).
    pub quiet_windows: bool,
    /// Show server stdout on the terminal instead of capturing it.
    pub verbose: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            join_ring: true,
            no_wait: false,
            wait_other_notice: true,
            wait_for_binary_proto: false,
            replace_address: None,
            jvm_args: Vec::new(),
            allow_root: false,
            quiet_windows: false,
            verbose: false,
        }
    }
}

/// Options for [`Lifecycle::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOptions {
    /// Wait for the process to exit.
    pub wait: bool,
    pub signal: ShutdownSignal,
}

impl Default for StopOptions {
    fn default() -> Self {
        Self {
            wait: true,
            signal: ShutdownSignal::Gentle,
        }
    }
}

/// What [`Lifecycle::stop`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReport {
    /// The process was signalled and has exited.
    Stopped,
    /// The process was signalled; exit was not awaited.
    Signalled,
    /// There was no live process to stop.
    NotRunning,
}

/// Drives nodes through their lifecycle.
pub struct Lifecycle {
    processes: Arc<dyn ProcessControl>,
    topology: Arc<dyn Topology>,
    installation: Arc<dyn Installation>,
    platform: HostPlatform,
    policy: ShutdownSignalPolicy,
    timings: LifecycleTimings,
}

impl Lifecycle {
    pub fn new(
        processes: Arc<dyn ProcessControl>,
        topology: Arc<dyn Topology>,
        installation: Arc<dyn Installation>,
        platform: HostPlatform,
    ) -> Self {
        Self {
            processes,
            topology,
            installation,
            policy: ShutdownSignalPolicy::for_platform(&platform),
            platform,
            timings: LifecycleTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: LifecycleTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn platform(&self) -> &HostPlatform {
        &self.platform
    }

    pub fn timings(&self) -> &LifecycleTimings {
        &self.timings
    }

    /// Whether the node's recorded process is alive.
    pub fn is_live(&self, node: &NodeHandle) -> bool {
        node.pid().is_some_and(|pid| self.processes.is_alive(pid))
    }

    /// Clear a recorded pid whose process no longer exists.
    pub fn reconcile(&self, node: &mut NodeHandle) -> Result<()> {
        if let Some(pid) = node.pid() {
            if !self.processes.is_alive(pid) {
                debug!(node = %node.name, pid, "Recorded process is gone; marking stopped");
                node.mark_stopped();
                self.topology.persist_node(node)?;
            }
        }
        Ok(())
    }

    /// Launch the node's server process and, unless `no_wait`, wait for it
    /// to become ready.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyRunning`] if the node has a live process
    /// - [`Error::PermissionDenied`] when running as root without `allow_root`
    /// - [`Error::NodeStartFailed`] if the process exits before it is ready
    /// - [`Error::StartTimeout`] if readiness is not reached in time; the
    ///   process is left running and the node stays `Starting`
    pub async fn start(&self, node: &mut NodeHandle, opts: &StartOptions) -> Result<()> {
        self.reconcile(node)?;
        if node.state().has_process() {
            return Err(Error::AlreadyRunning(node.name.clone()));
        }
        if self.platform.running_as_root && !opts.allow_root {
            return Err(Error::PermissionDenied(format!(
                "refusing to start {} as root without --root",
                node.name
            )));
        }

        let spec = self.launch_spec(node, opts)?;
        let log_dir = node.log_dir();
        std::fs::create_dir_all(&log_dir).map_err(|e| Error::io_with_path(e, &log_dir))?;
        self.topology.mark_peer_logs(node)?;

        let pid = self.processes.spawn(&spec)?;
        node.begin_start(pid)?;
        self.topology.persist_node(node)?;
        info!(node = %node.name, pid, "Spawned server process");

        if opts.no_wait {
            return Ok(());
        }
        self.await_ready(node, pid, opts).await
    }

    async fn await_ready(&self, node: &mut NodeHandle, pid: u32, opts: &StartOptions) -> Result<()> {
        let started = Instant::now();
        loop {
            if !self.processes.is_alive(pid) {
                let stderr = read_captured(&node.stderr_file());
                warn!(node = %node.name, pid, "Server process exited during startup");
                node.mark_stopped();
                self.topology.persist_node(node)?;
                return Err(Error::NodeStartFailed {
                    node: node.name.clone(),
                    stderr,
                });
            }
            if self.is_ready(node, opts).await? {
                node.mark_running()?;
                self.topology.persist_node(node)?;
                info!(node = %node.name, pid, elapsed_ms = started.elapsed().as_millis() as u64, "Node is ready");
                return Ok(());
            }
            let elapsed = started.elapsed();
            if elapsed >= self.timings.start_timeout {
                warn!(node = %node.name, pid, "Timed out waiting for node to start");
                return Err(Error::StartTimeout {
                    node: node.name.clone(),
                    elapsed,
                });
            }
            tokio::time::sleep(self.timings.poll_interval).await;
        }
    }

    async fn is_ready(&self, node: &NodeHandle, opts: &StartOptions) -> Result<bool> {
        if opts.wait_other_notice && !self.topology.peers_report_up(node)? {
            return Ok(false);
        }
        if opts.wait_for_binary_proto && !self.binary_port_open(node).await {
            return Ok(false);
        }
        Ok(true)
    }

    async fn binary_port_open(&self, node: &NodeHandle) -> bool {
        let connect = TcpStream::connect((node.address.as_str(), node.binary_port));
        matches!(
            tokio::time::timeout(self.timings.poll_interval, connect).await,
            Ok(Ok(_))
        )
    }

    /// Command line and environment used to launch the node.
    pub fn launch_spec(&self, node: &NodeHandle, opts: &StartOptions) -> Result<ProcessSpec> {
        let install_dir = self.installation.install_directory(node)?;
        let mut spec = ProcessSpec::new(
            install_dir
                .join("bin")
                .join(self.platform.script_name("cassandra")),
        );

        spec.args.push("-f".to_string());
        if !opts.join_ring {
            spec.args.push("-Dcassandra.join_ring=false".to_string());
        }
        if let Some(address) = &opts.replace_address {
            spec.args
                .push(format!("-Dcassandra.replace_address={address}"));
        }
        spec.args.push(format!(
            "-Dcassandra.logdir={}",
            node.log_dir().display()
        ));
        spec.args.extend(opts.jvm_args.iter().cloned());
        if opts.allow_root {
            spec.args.push("-R".to_string());
        }
        if opts.quiet_windows && self.platform.is_windows() {
            spec.args.push("-q".to_string());
        }

        spec.env.push((
            "CASSANDRA_HOME".to_string(),
            install_dir.display().to_string(),
        ));
        spec.env.push((
            "CASSANDRA_CONF".to_string(),
            node.conf_dir().display().to_string(),
        ));
        spec.cwd = Some(node.directory.clone());
        spec.stdout = (!opts.verbose).then(|| node.stdout_file());
        spec.stderr = Some(node.stderr_file());
        Ok(spec)
    }

    /// Signal the node's process and, if requested, wait for it to exit.
    ///
    /// Stopping a node without a live process is not an error; it reports
    /// [`StopReport::NotRunning`].
    pub async fn stop(&self, node: &mut NodeHandle, opts: &StopOptions) -> Result<StopReport> {
        self.reconcile(node)?;
        let Some(pid) = node.pid() else {
            return Ok(StopReport::NotRunning);
        };

        let was_paused = node.state() == NodeState::Paused;
        let signal = self.policy.signal_for(opts.signal);
        node.begin_stop()?;
        self.topology.persist_node(node)?;

        info!(node = %node.name, pid, ?signal, "Stopping node");
        match self.processes.signal(pid, signal) {
            Ok(()) => {}
            Err(Error::NoSuchProcess(_)) => {
                node.mark_stopped();
                self.topology.persist_node(node)?;
                return Ok(StopReport::NotRunning);
            }
            Err(e) => return Err(e),
        }
        if was_paused && self.processes.is_alive(pid) {
            match self.processes.signal(pid, SignalKind::Continue) {
                // Exited between the liveness check and the continue.
                Ok(()) | Err(Error::NoSuchProcess(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if !opts.wait {
            return Ok(StopReport::Signalled);
        }

        let started = Instant::now();
        match self.processes.wait(pid, self.timings.stop_timeout).await? {
            WaitStatus::Exited => {
                node.mark_stopped();
                self.topology.persist_node(node)?;
                debug!(node = %node.name, pid, "Server process exited");
                Ok(StopReport::Stopped)
            }
            WaitStatus::TimedOut => Err(Error::StopTimeout {
                node: node.name.clone(),
                elapsed: started.elapsed(),
            }),
        }
    }

    /// Suspend a running node.
    pub fn pause(&self, node: &mut NodeHandle) -> Result<()> {
        let pid = self.live_pid(node)?;
        node.mark_paused()?;
        if let Err(e) = self.processes.signal(pid, SignalKind::Stop) {
            node.mark_running()?;
            return Err(e);
        }
        self.topology.persist_node(node)?;
        info!(node = %node.name, pid, "Paused node");
        Ok(())
    }

    /// Continue a paused node.
    pub fn resume(&self, node: &mut NodeHandle) -> Result<()> {
        let pid = self.live_pid(node)?;
        if node.state() != NodeState::Paused {
            return Err(Error::invalid_data(format!(
                "node {} is {}, not paused",
                node.name,
                node.state()
            )));
        }
        self.processes.signal(pid, SignalKind::Continue)?;
        node.mark_running()?;
        self.topology.persist_node(node)?;
        info!(node = %node.name, pid, "Resumed node");
        Ok(())
    }

    /// Pid of the node's live process.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchProcess`] when the node has no live process.
    pub fn live_pid(&self, node: &mut NodeHandle) -> Result<u32> {
        self.reconcile(node)?;
        node.pid()
            .ok_or_else(|| Error::NoSuchProcess(node.name.clone()))
    }
}

fn read_captured(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No captured stderr");
            String::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ccm_core::mock::{MockInstallation, MockProcesses, MockTopology};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        node: NodeHandle,
        processes: MockProcesses,
        topology: MockTopology,
    }

    fn fixture(processes: MockProcesses) -> Fixture {
        let dir = TempDir::new().unwrap();
        let node = NodeHandle::new("node1", "test", dir.path().join("node1"));
        let topology = MockTopology::new().with_node(node.clone());
        Fixture {
            _dir: dir,
            node,
            processes,
            topology,
        }
    }

    fn lifecycle(f: &Fixture, platform: HostPlatform) -> Lifecycle {
        Lifecycle::new(
            Arc::new(f.processes.clone()),
            Arc::new(f.topology.clone()),
            Arc::new(MockInstallation::new("/opt/cassandra")),
            platform,
        )
        .with_timings(LifecycleTimings {
            start_timeout: Duration::from_millis(100),
            stop_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(5),
        })
    }

    #[tokio::test]
    async fn test_start_stop_round_trip() {
        let mut f = fixture(MockProcesses::new());
        let lc = lifecycle(&f, HostPlatform::posix());

        lc.start(&mut f.node, &StartOptions::default()).await.unwrap();
        assert_eq!(f.node.state(), NodeState::Running);
        let pid = f.node.pid().unwrap();
        assert!(f.processes.is_alive(pid));
        assert_eq!(f.topology.node("node1").unwrap().state(), NodeState::Running);
        assert_eq!(f.topology.marks(), 1);

        let report = lc.stop(&mut f.node, &StopOptions::default()).await.unwrap();
        assert_eq!(report, StopReport::Stopped);
        assert!(f.node.pid().is_none());
        assert!(!f.processes.is_alive(pid));
        assert_eq!(f.processes.signals(), vec![(pid, SignalKind::Terminate)]);
        assert!(f.topology.node("node1").unwrap().pid().is_none());
    }

    #[tokio::test]
    async fn test_stop_twice_reports_not_running() {
        let mut f = fixture(MockProcesses::new());
        let lc = lifecycle(&f, HostPlatform::posix());
        lc.start(&mut f.node, &StartOptions::default()).await.unwrap();

        assert_eq!(
            lc.stop(&mut f.node, &StopOptions::default()).await.unwrap(),
            StopReport::Stopped
        );
        assert_eq!(
            lc.stop(&mut f.node, &StopOptions::default()).await.unwrap(),
            StopReport::NotRunning
        );
    }

    #[tokio::test]
    async fn test_launch_spec_arguments() {
        let f = fixture(MockProcesses::new());
        let lc = lifecycle(&f, HostPlatform::posix());
        let opts = StartOptions {
            join_ring: false,
            replace_address: Some("127.0.0.5".into()),
            jvm_args: vec!["-Xmx1G".into(), "-Dfoo=bar".into()],
            allow_root: true,
            quiet_windows: true,
            ..StartOptions::default()
        };

        let spec = lc.launch_spec(&f.node, &opts).unwrap();
        assert_eq!(spec.program, Path::new("/opt/cassandra/bin/cassandra"));
        let logdir = format!("-Dcassandra.logdir={}", f.node.log_dir().display());
        assert_eq!(
            spec.args,
            vec![
                "-f",
                "-Dcassandra.join_ring=false",
                "-Dcassandra.replace_address=127.0.0.5",
                logdir.as_str(),
                "-Xmx1G",
                "-Dfoo=bar",
                "-R",
            ]
        );
        assert!(spec.env.contains(&("CASSANDRA_HOME".into(), "/opt/cassandra".into())));
        assert_eq!(spec.stdout, Some(f.node.stdout_file()));
        assert_eq!(spec.stderr, Some(f.node.stderr_file()));
    }

    #[tokio::test]
    async fn test_launch_spec_windows_quiet() {
        let f = fixture(MockProcesses::new());
        let lc = lifecycle(&f, HostPlatform::windows());
        let opts = StartOptions {
            quiet_windows: true,
            verbose: true,
            ..StartOptions::default()
        };

        let spec = lc.launch_spec(&f.node, &opts).unwrap();
        assert!(spec.program.ends_with("cassandra.bat"));
        assert_eq!(spec.args.last().map(String::as_str), Some("-q"));
        assert!(spec.stdout.is_none());
    }

    #[tokio::test]
    async fn test_start_as_root_refused_before_spawn() {
        let mut f = fixture(MockProcesses::new());
        let lc = lifecycle(&f, HostPlatform::posix().with_root(true));

        let err = lc
            .start(&mut f.node, &StartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(f.processes.spawned().is_empty());

        let opts = StartOptions {
            allow_root: true,
            ..StartOptions::default()
        };
        lc.start(&mut f.node, &opts).await.unwrap();
        assert_eq!(f.processes.spawned().len(), 1);
    }

    #[tokio::test]
    async fn test_start_already_running() {
        let mut f = fixture(MockProcesses::new());
        let lc = lifecycle(&f, HostPlatform::posix());
        lc.start(&mut f.node, &StartOptions::default()).await.unwrap();

        let err = lc
            .start(&mut f.node, &StartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning(name) if name == "node1"));
        assert_eq!(f.processes.spawned().len(), 1);
    }

    #[tokio::test]
    async fn test_start_crash_reports_stderr() {
        let mut f = fixture(MockProcesses::new().crash_on_spawn("Invalid yaml\nFatal configuration error"));
        let lc = lifecycle(&f, HostPlatform::posix());

        let err = lc
            .start(&mut f.node, &StartOptions::default())
            .await
            .unwrap_err();
        match err {
            Error::NodeStartFailed { node, stderr } => {
                assert_eq!(node, "node1");
                assert!(stderr.contains("Fatal configuration error"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.node.state(), NodeState::Stopped);
        assert!(f.node.pid().is_none());
    }

    #[tokio::test]
    async fn test_start_timeout_leaves_process_running() {
        let processes = MockProcesses::new();
        let mut f = fixture(processes);
        f.topology.set_peers_up(false);
        let lc = lifecycle(&f, HostPlatform::posix());

        let err = lc
            .start(&mut f.node, &StartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StartTimeout { ref node, .. } if node == "node1"));
        let pid = f.node.pid().unwrap();
        assert!(f.processes.is_alive(pid));
        assert_eq!(f.node.state(), NodeState::Starting);
        assert_eq!(f.topology.node("node1").unwrap().pid(), Some(pid));
    }

    #[tokio::test]
    async fn test_start_skip_wait_other_notice() {
        let mut f = fixture(MockProcesses::new());
        f.topology.set_peers_up(false);
        let lc = lifecycle(&f, HostPlatform::posix());
        let opts = StartOptions {
            wait_other_notice: false,
            ..StartOptions::default()
        };

        lc.start(&mut f.node, &opts).await.unwrap();
        assert_eq!(f.node.state(), NodeState::Running);
    }

    #[tokio::test]
    async fn test_start_no_wait_returns_starting() {
        let mut f = fixture(MockProcesses::new());
        f.topology.set_peers_up(false);
        let lc = lifecycle(&f, HostPlatform::posix());
        let opts = StartOptions {
            no_wait: true,
            ..StartOptions::default()
        };

        lc.start(&mut f.node, &opts).await.unwrap();
        assert_eq!(f.node.state(), NodeState::Starting);
        assert!(f.node.pid().is_some());
    }

    #[tokio::test]
    async fn test_start_waits_for_binary_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut f = fixture(MockProcesses::new());
        f.node = f.node.clone().with_ports(7199, port, 9160);
        let lc = lifecycle(&f, HostPlatform::posix());
        let opts = StartOptions {
            wait_for_binary_proto: true,
            ..StartOptions::default()
        };

        lc.start(&mut f.node, &opts).await.unwrap();
        assert_eq!(f.node.state(), NodeState::Running);

        drop(listener);
        let mut g = fixture(MockProcesses::new());
        g.node = g.node.clone().with_ports(7199, port, 9160);
        let lc = lifecycle(&g, HostPlatform::posix());
        let err = lc.start(&mut g.node, &opts).await.unwrap_err();
        assert!(matches!(err, Error::StartTimeout { .. }));
    }

    #[tokio::test]
    async fn test_stop_no_wait_leaves_stopping() {
        let mut f = fixture(MockProcesses::new());
        let lc = lifecycle(&f, HostPlatform::posix());
        lc.start(&mut f.node, &StartOptions::default()).await.unwrap();

        let opts = StopOptions {
            wait: false,
            signal: ShutdownSignal::HangUp,
        };
        let report = lc.stop(&mut f.node, &opts).await.unwrap();
        assert_eq!(report, StopReport::Signalled);
        assert_eq!(f.node.state(), NodeState::Stopping);
        let pid = f.node.pid().unwrap();
        assert_eq!(f.processes.signals(), vec![(pid, SignalKind::HangUp)]);
    }

    #[tokio::test]
    async fn test_stop_timeout() {
        let mut f = fixture(MockProcesses::new().ignore_termination());
        let lc = lifecycle(&f, HostPlatform::posix());
        lc.start(&mut f.node, &StartOptions::default()).await.unwrap();

        let err = lc
            .stop(&mut f.node, &StopOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StopTimeout { .. }));
        assert_eq!(f.node.state(), NodeState::Stopping);
        assert!(f.processes.is_alive(f.node.pid().unwrap()));

        let forceful = StopOptions {
            wait: true,
            signal: ShutdownSignal::Forceful,
        };
        let report = lc.stop(&mut f.node, &forceful).await.unwrap();
        assert_eq!(report, StopReport::Stopped);
    }

    #[tokio::test]
    async fn test_stop_paused_node_continues_it() {
        let mut f = fixture(MockProcesses::new().ignore_termination());
        let lc = lifecycle(&f, HostPlatform::posix());
        let opts = StartOptions::default();
        lc.start(&mut f.node, &opts).await.unwrap();
        lc.pause(&mut f.node).unwrap();
        let pid = f.node.pid().unwrap();
        assert!(f.processes.is_paused(pid));

        let stop = StopOptions {
            wait: false,
            signal: ShutdownSignal::Gentle,
        };
        lc.stop(&mut f.node, &stop).await.unwrap();
        assert_eq!(
            f.processes.signals(),
            vec![
                (pid, SignalKind::Stop),
                (pid, SignalKind::Terminate),
                (pid, SignalKind::Continue),
            ]
        );
        assert!(!f.processes.is_paused(pid));
    }

    #[tokio::test]
    async fn test_stop_paused_node_that_exits_before_continue() {
        let mut f = fixture(MockProcesses::new().ignore_termination().exit_on_continue());
        let lc = lifecycle(&f, HostPlatform::posix());
        lc.start(&mut f.node, &StartOptions::default()).await.unwrap();
        lc.pause(&mut f.node).unwrap();
        let pid = f.node.pid().unwrap();

        let report = lc.stop(&mut f.node, &StopOptions::default()).await.unwrap();
        assert_eq!(report, StopReport::Stopped);
        assert_eq!(f.node.state(), NodeState::Stopped);
        assert!(!f.processes.is_alive(pid));
        assert_eq!(f.topology.node("node1").unwrap().state(), NodeState::Stopped);
    }

    #[tokio::test]
    async fn test_pause_resume() {
        let mut f = fixture(MockProcesses::new());
        let lc = lifecycle(&f, HostPlatform::posix());
        lc.start(&mut f.node, &StartOptions::default()).await.unwrap();

        lc.pause(&mut f.node).unwrap();
        assert_eq!(f.node.state(), NodeState::Paused);
        assert!(lc.pause(&mut f.node).is_err());

        lc.resume(&mut f.node).unwrap();
        assert_eq!(f.node.state(), NodeState::Running);
        assert!(lc.resume(&mut f.node).is_err());
    }

    #[test]
    fn test_pause_without_process() {
        let mut f = fixture(MockProcesses::new());
        let lc = lifecycle(&f, HostPlatform::posix());
        assert!(matches!(
            lc.pause(&mut f.node),
            Err(Error::NoSuchProcess(name)) if name == "node1"
        ));
        assert!(matches!(
            lc.resume(&mut f.node),
            Err(Error::NoSuchProcess(_))
        ));
    }

    #[test]
    fn test_reconcile_clears_stale_pid() {
        let mut f = fixture(MockProcesses::new().with_alive(4242));
        f.node = f.node.clone().with_process(Some(4242), NodeState::Running);
        let lc = lifecycle(&f, HostPlatform::posix());

        lc.reconcile(&mut f.node).unwrap();
        assert_eq!(f.node.pid(), Some(4242));

        f.processes.kill_externally(4242);
        lc.reconcile(&mut f.node).unwrap();
        assert_eq!(f.node.state(), NodeState::Stopped);
        assert!(f.topology.node("node1").unwrap().pid().is_none());
    }
}
