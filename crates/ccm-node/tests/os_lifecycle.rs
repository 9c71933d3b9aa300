//! Lifecycle round trips against real processes.

#![cfg(unix)]
#![allow(clippy::unwrap_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ccm_core::mock::{MockInstallation, MockTopology};
use ccm_core::{Error, HostPlatform, NodeHandle, NodeState, ProcessControl};
use ccm_node::{
    Lifecycle, LifecycleTimings, OsProcessControl, StartOptions, StopOptions, StopReport,
};
use tempfile::TempDir;

fn fake_install(root: &Path, script: &str) {
    let bin = root.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let launcher = bin.join("cassandra");
    std::fs::write(&launcher, format!("#!/bin/sh\n{script}\n")).unwrap();
    std::fs::set_permissions(&launcher, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn lifecycle(install: &Path, processes: Arc<OsProcessControl>, node: &NodeHandle) -> Lifecycle {
    Lifecycle::new(
        processes,
        Arc::new(MockTopology::new().with_node(node.clone())),
        Arc::new(MockInstallation::new(install)),
        HostPlatform::posix(),
    )
    .with_timings(LifecycleTimings {
        start_timeout: Duration::from_secs(5),
        stop_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(20),
    })
}

#[tokio::test]
async fn start_stop_round_trip() {
    let dir = TempDir::new().unwrap();
    let install = dir.path().join("install");
    fake_install(&install, "exec sleep 30");
    let mut node = NodeHandle::new("node1", "test", dir.path().join("node1"));
    let processes = Arc::new(OsProcessControl::new());
    let lc = lifecycle(&install, processes.clone(), &node);

    lc.start(&mut node, &StartOptions::default()).await.unwrap();
    assert_eq!(node.state(), NodeState::Running);
    let pid = node.pid().unwrap();
    assert!(processes.is_alive(pid));

    let report = lc.stop(&mut node, &StopOptions::default()).await.unwrap();
    assert_eq!(report, StopReport::Stopped);
    assert!(node.pid().is_none());
    assert!(!processes.is_alive(pid));

    let report = lc.stop(&mut node, &StopOptions::default()).await.unwrap();
    assert_eq!(report, StopReport::NotRunning);
}

#[tokio::test]
async fn early_exit_reports_captured_stderr() {
    let dir = TempDir::new().unwrap();
    let install = dir.path().join("install");
    fake_install(&install, "echo 'Invalid yaml: conf/cassandra.yaml' >&2\nexit 3");

    // Readiness needs the native port, which nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut node =
        NodeHandle::new("node1", "test", dir.path().join("node1")).with_ports(7199, port, 9160);
    let lc = lifecycle(&install, Arc::new(OsProcessControl::new()), &node);

    let opts = StartOptions {
        wait_for_binary_proto: true,
        ..StartOptions::default()
    };
    let err = lc.start(&mut node, &opts).await.unwrap_err();
    match err {
        Error::NodeStartFailed { stderr, .. } => {
            assert!(stderr.contains("Invalid yaml"), "stderr was: {stderr}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(node.state(), NodeState::Stopped);
}
