//! Result of executing a command.

/// Captured output and status of one command execution.
///
/// Delegated tools fill all three fields verbatim; built-in commands use the
/// constructors below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl Outcome {
    /// Empty successful outcome.
    pub fn success() -> Self {
        Self::default()
    }

    /// Successful outcome carrying text for standard output.
    pub fn message(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Failed outcome carrying a diagnostic for standard error.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            status,
            ..Self::default()
        }
    }

    /// Outcome of a process that ran attached to the terminal.
    pub fn from_status(status: i32) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}
