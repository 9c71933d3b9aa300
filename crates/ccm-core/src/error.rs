//! Error types for ccm operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all ccm crates. Uses `thiserror` for derive macros.
//!
//! Variants fall into three groups:
//!
//! - usage errors raised before anything is executed (unknown command or
//!   node, invalid arguments, missing option dependencies);
//! - lifecycle failures raised by the node orchestrator;
//! - ambient failures (I/O, configuration, serialization).

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in ccm operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific path.
    #[error("I/O error at {}: {source}", path.display())]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested subcommand is not registered.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The requested node does not exist in the loaded cluster.
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Arguments failed validation.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// An option was given without the option it depends on.
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// Refused before spawning anything.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The server process exited before becoming ready.
    #[error("Error starting node {node}")]
    NodeStartFailed { node: String, stderr: String },

    /// Readiness was not reached in time; the process is left running.
    #[error("Timed out after {elapsed:?} waiting for node {node} to start")]
    StartTimeout { node: String, elapsed: Duration },

    /// The process was still alive when the stop timeout expired.
    #[error("Timed out after {elapsed:?} waiting for node {node} to stop")]
    StopTimeout { node: String, elapsed: Duration },

    /// The node has no live process.
    #[error("No running process for node {0}")]
    NoSuchProcess(String),

    /// Start was requested on a node whose process is alive.
    #[error("Node {0} is already running")]
    AlreadyRunning(String),

    /// A delegated tool could not be run.
    #[error("{tool}: {reason}")]
    ToolInvocationFailed { tool: String, reason: String },

    /// Invalid data or format.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid arguments error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a missing dependency error.
    pub fn missing_dependency(msg: impl Into<String>) -> Self {
        Self::MissingDependency(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create a tool invocation error.
    pub fn tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolInvocationFailed {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with the path it occurred on.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoPath {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True for errors caused by the command line itself.
    ///
    /// These are always raised before any process or file is touched.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownCommand(_)
                | Self::UnknownNode(_)
                | Self::InvalidArguments(_)
                | Self::MissingDependency(_)
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_usage_error() { 2 } else { 1 }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using ccm's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors_exit_with_two() {
        for err in [
            Error::UnknownCommand("frob".into()),
            Error::UnknownNode("node9".into()),
            Error::invalid_arguments("bad"),
            Error::missing_dependency("-k"),
        ] {
            assert!(err.is_usage_error(), "{err}");
            assert_eq!(err.exit_code(), 2);
        }
    }

    #[test]
    fn test_runtime_errors_exit_with_one() {
        let errors = [
            Error::NoSuchProcess("node1".into()),
            Error::StartTimeout {
                node: "node1".into(),
                elapsed: Duration::from_secs(3),
            },
            Error::tool("nodetool", "not found"),
            Error::PermissionDenied("root".into()),
        ];
        for err in errors {
            assert!(!err.is_usage_error());
            assert_eq!(err.exit_code(), 1);
        }
    }

    #[test]
    fn test_io_with_path_display() {
        let err = Error::io_with_path(
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            "/tmp/x.yaml",
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/x.yaml"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_tool_error_display() {
        let err = Error::tool("cqlsh", "not found under /opt/cassandra");
        assert_eq!(err.to_string(), "cqlsh: not found under /opt/cassandra");
    }
}
