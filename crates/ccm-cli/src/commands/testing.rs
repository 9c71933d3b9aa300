//! Shared fixture for command tests.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ccm_core::mock::{MockInstallation, MockProcesses, MockTopology, RecordingInvoker};
use ccm_core::{HostPlatform, NodeHandle, NodeState};
use ccm_node::{Lifecycle, LifecycleTimings, NodeAdmin};
use tempfile::TempDir;

use crate::command::{Context, NodeCommand};
use crate::options::{ParseResult, ParsedInvocation};

/// Tools present in the fake install.
const TOOLS: [&str; 12] = [
    "nodetool",
    "dsetool",
    "cqlsh",
    "cassandra-cli",
    "sstableloader",
    "sstablescrub",
    "sstableverify",
    "cassandra-stress",
    "cassandra-shuffle",
    "sstabledump",
    "sstablesplit",
    "dse",
];

/// One node `node1` of cluster `test`, wired to mocks.
pub(crate) struct Harness {
    pub dir: TempDir,
    pub topology: MockTopology,
    pub installation: MockInstallation,
    pub processes: MockProcesses,
    pub invoker: RecordingInvoker,
    pub ctx: Context,
}

impl Harness {
    /// Pid of the node in [`Harness::running`].
    pub const PID: u32 = 4242;

    pub fn new() -> Self {
        Self::build(false, RecordingInvoker::new())
    }

    pub fn running() -> Self {
        Self::build(true, RecordingInvoker::new())
    }

    pub fn with_invoker(live: bool, invoker: RecordingInvoker) -> Self {
        Self::build(live, invoker)
    }

    fn build(live: bool, invoker: RecordingInvoker) -> Self {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("install");
        let mut node = NodeHandle::new("node1", "test", dir.path().join("node1"));
        for tool in TOOLS {
            node = node.with_tool(tool, install.join("bin").join(tool));
        }
        let processes = if live {
            node = node.with_process(Some(Self::PID), NodeState::Running);
            MockProcesses::new().with_alive(Self::PID)
        } else {
            MockProcesses::new()
        };

        let topology = MockTopology::new().with_node(node);
        let installation = MockInstallation::new(&install);
        let lifecycle = Arc::new(
            Lifecycle::new(
                Arc::new(processes.clone()),
                Arc::new(topology.clone()),
                Arc::new(installation.clone()),
                HostPlatform::posix(),
            )
            .with_timings(LifecycleTimings {
                start_timeout: Duration::from_secs(2),
                stop_timeout: Duration::from_secs(2),
                poll_interval: Duration::from_millis(5),
            }),
        );
        let admin = Arc::new(NodeAdmin::new(
            Arc::new(invoker.clone()),
            lifecycle.clone(),
            Arc::new(installation.clone()),
        ));
        let ctx = Context {
            topology: Arc::new(topology.clone()),
            installation: Arc::new(installation.clone()),
            lifecycle,
            admin,
        };

        Self {
            dir,
            topology,
            installation,
            processes,
            invoker,
            ctx,
        }
    }

    pub fn node_dir(&self) -> PathBuf {
        self.dir.path().join("node1")
    }

    pub fn install_dir(&self) -> PathBuf {
        self.dir.path().join("install")
    }
}

pub(crate) fn tokens(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Parse `items` with the command's schema, expecting no help request.
pub(crate) fn parse(cmd: &dyn NodeCommand, items: &[&str]) -> ParsedInvocation {
    match cmd.build_parser().parse(&tokens(items)).unwrap() {
        ParseResult::Parsed(parsed) => parsed,
        ParseResult::Help(help) => panic!("unexpected help: {help}"),
    }
}
