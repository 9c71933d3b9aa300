//! Administrative delegation to external tools.
//!
//! [`NodeAdmin`] composes command lines for the tools shipped with a node's
//! server build (nodetool, query shells, sstable utilities, ...) and runs
//! them through a [`ToolInvoker`]. Output and status come back verbatim in
//! an [`Outcome`]; a tool that exits non-zero is not an error here.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use ccm_core::{
    Error, Installation, NodeHandle, Outcome, Result, ToolInvocation, ToolInvoker,
};

use crate::lifecycle::Lifecycle;
use crate::sstables::SstableSelection;

/// Interactive query shells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShell {
    /// The legacy Thrift `cassandra-cli`.
    Cli,
    Cqlsh,
}

impl QueryShell {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Cli => "cassandra-cli",
            Self::Cqlsh => "cqlsh",
        }
    }
}

/// Terminal-attached tools launched with pass-through arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    Bulkload,
    Scrub,
    Verify,
    Stress,
    /// `cassandra-shuffle` with its sub-command.
    Shuffle(String),
    /// `dse`, optionally with a client sub-tool (`hadoop`, `hive`, ...).
    Dse(Option<String>),
    Jconsole,
    Byteman,
}

impl Launcher {
    /// Whether the tool talks to the node's live process.
    pub fn requires_live_node(&self) -> bool {
        !matches!(self, Self::Scrub | Self::Verify | Self::Stress)
    }

    fn tool_name(&self) -> &'static str {
        match self {
            Self::Bulkload => "sstableloader",
            Self::Scrub => "sstablescrub",
            Self::Verify => "sstableverify",
            Self::Stress => "cassandra-stress",
            Self::Shuffle(_) => "cassandra-shuffle",
            Self::Dse(_) => "dse",
            Self::Jconsole => "jconsole",
            Self::Byteman => "byteman",
        }
    }
}

/// Runs administrative tools against one node.
pub struct NodeAdmin {
    invoker: Arc<dyn ToolInvoker>,
    lifecycle: Arc<Lifecycle>,
    installation: Arc<dyn Installation>,
    pager: Option<String>,
}

impl NodeAdmin {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        lifecycle: Arc<Lifecycle>,
        installation: Arc<dyn Installation>,
    ) -> Self {
        Self {
            invoker,
            lifecycle,
            installation,
            pager: None,
        }
    }

    /// Pager used when `PAGER` is unset.
    pub fn with_pager(mut self, pager: Option<String>) -> Self {
        self.pager = pager;
        self
    }

    fn require_live(&self, node: &mut NodeHandle) -> Result<()> {
        self.lifecycle.live_pid(node).map(|_| ())
    }

    fn resolve_tool(&self, node: &NodeHandle, name: &str) -> Result<PathBuf> {
        if let Some(path) = node.tool(name) {
            return Ok(path.to_path_buf());
        }
        let location = self
            .installation
            .install_directory(node)
            .map(|dir| format!("not found in {}", dir.display()))
            .unwrap_or_else(|_| "not found".to_string());
        Err(Error::tool(name, location))
    }

    fn invocation(&self, node: &NodeHandle, name: &str, attach: bool) -> Result<ToolInvocation> {
        let program = self.resolve_tool(node, name)?;
        let install_dir = self.installation.install_directory(node)?;
        let invocation = if attach {
            ToolInvocation::attach(name, program)
        } else {
            ToolInvocation::capture(name, program)
        };
        Ok(invocation
            .env("CASSANDRA_HOME", install_dir.display().to_string())
            .env("CASSANDRA_CONF", node.conf_dir().display().to_string()))
    }

    /// `nodetool -h localhost -p <jmx> [keyword] args...`, captured.
    pub async fn nodetool(
        &self,
        node: &mut NodeHandle,
        keyword: Option<&str>,
        args: &[String],
    ) -> Result<Outcome> {
        self.require_live(node)?;
        let invocation = self
            .invocation(node, "nodetool", false)?
            .args(["-h", "localhost", "-p"])
            .arg(node.jmx_port.to_string())
            .args(keyword)
            .args(args.iter().cloned());
        self.invoker.invoke(invocation).await
    }

    /// `nodetool decommission`, passing `--force` through when requested.
    pub async fn decommission(&self, node: &mut NodeHandle, force: bool) -> Result<Outcome> {
        let extra: Vec<String> = force.then(|| "--force".to_string()).into_iter().collect();
        self.nodetool(node, Some("decommission"), &extra).await
    }

    /// `dsetool -h localhost -j <jmx> args...`, captured.
    pub async fn dsetool(&self, node: &mut NodeHandle, args: &[String]) -> Result<Outcome> {
        self.require_live(node)?;
        let invocation = self
            .invocation(node, "dsetool", false)?
            .args(["-h", "localhost", "-j"])
            .arg(node.jmx_port.to_string())
            .args(args.iter().cloned());
        self.invoker.invoke(invocation).await
    }

    /// Open a query shell, or feed it `exec` on stdin and capture the result.
    ///
    /// In exec mode stdout is kept only when `verbose`.
    pub async fn query_session(
        &self,
        node: &mut NodeHandle,
        shell: QueryShell,
        exec: Option<&str>,
        verbose: bool,
        args: &[String],
    ) -> Result<Outcome> {
        self.require_live(node)?;
        let invocation = self.invocation(node, shell.tool_name(), exec.is_none())?;
        let invocation = match shell {
            QueryShell::Cli => invocation
                .args(["-h", node.address.as_str(), "-p"])
                .arg(node.rpc_port.to_string())
                .args(args.iter().cloned()),
            QueryShell::Cqlsh => invocation
                .args(args.iter().cloned())
                .arg(node.address.clone())
                .arg(node.binary_port.to_string()),
        };

        match exec {
            None => self.invoker.invoke(invocation).await,
            Some(text) => {
                let mut outcome = self.invoker.invoke(invocation.stdin(text)).await?;
                if !verbose {
                    outcome.stdout.clear();
                }
                Ok(outcome)
            }
        }
    }

    /// Launch a tool attached to the terminal with pass-through arguments.
    pub async fn launch(
        &self,
        node: &mut NodeHandle,
        launcher: &Launcher,
        args: &[String],
    ) -> Result<Outcome> {
        if launcher.requires_live_node() {
            self.require_live(node)?;
        }
        let invocation = match launcher {
            Launcher::Bulkload => self
                .invocation(node, launcher.tool_name(), true)?
                .args(["-d", node.address.as_str()]),
            Launcher::Scrub | Launcher::Verify | Launcher::Stress => {
                self.invocation(node, launcher.tool_name(), true)?
            }
            Launcher::Shuffle(cmd) => self
                .invocation(node, launcher.tool_name(), true)?
                .args(["-h", "localhost", "-p"])
                .arg(node.jmx_port.to_string())
                .arg(cmd.clone()),
            Launcher::Dse(sub) => self
                .invocation(node, launcher.tool_name(), true)?
                .args(sub.iter().cloned()),
            Launcher::Jconsole => ToolInvocation::attach("jconsole", "jconsole")
                .arg(format!("localhost:{}", node.jmx_port)),
            Launcher::Byteman => self.byteman(node)?,
        };
        self.invoker
            .invoke(invocation.args(args.iter().cloned()))
            .await
    }

    fn byteman(&self, node: &NodeHandle) -> Result<ToolInvocation> {
        let port = node.byteman_port.ok_or_else(|| {
            Error::tool("byteman", format!("byteman is not enabled on {}", node.name))
        })?;
        let jars = self
            .installation
            .install_directory(node)?
            .join("build")
            .join("lib")
            .join("jars");
        let pattern = format!(
            "{}/byteman-submit*.jar",
            glob::Pattern::escape(&jars.to_string_lossy())
        );
        let jar = glob::glob(&pattern)
            .map_err(|e| Error::invalid_data(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .next()
            .ok_or_else(|| {
                Error::tool("byteman", format!("no byteman-submit jar in {}", jars.display()))
            })?;
        let java = std::env::var_os("JAVA_HOME")
            .map(|home| PathBuf::from(home).join("bin").join("java"))
            .unwrap_or_else(|| PathBuf::from("java"));

        Ok(ToolInvocation::attach("byteman", java)
            .arg("-jar")
            .arg(jar.display().to_string())
            .arg("-p")
            .arg(port.to_string()))
    }

    /// Page the node's main log.
    ///
    /// The pager is `PAGER`, else the configured pager, else the platform
    /// default; it may carry its own arguments.
    pub async fn page_log(&self, node: &NodeHandle) -> Result<Outcome> {
        let pager = std::env::var("PAGER")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.pager.clone())
            .unwrap_or_else(|| self.lifecycle.platform().default_pager().to_string());
        let mut words = pager.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| Error::config("empty pager command"))?
            .to_string();
        let invocation = ToolInvocation::attach(program.clone(), program)
            .args(words)
            .arg(node.log_file.display().to_string());
        self.invoker.invoke(invocation).await
    }

    /// Dump sstables as JSON, or only their keys when `enumerate`.
    ///
    /// Uses `sstable2json`/`sstable2keys` on builds that ship them and
    /// `sstabledump` otherwise. Each file's output is preceded by a
    /// `-- <file> -----` header.
    pub async fn dump_sstables(
        &self,
        node: &NodeHandle,
        selection: &SstableSelection,
        keys: &[String],
        enumerate: bool,
    ) -> Result<Outcome> {
        let (tool, flags): (&str, &[&str]) = if node.has_tool("sstable2json") {
            if enumerate {
                ("sstable2keys", &[])
            } else {
                ("sstable2json", &[])
            }
        } else if enumerate {
            ("sstabledump", &["-e"])
        } else {
            ("sstabledump", &[])
        };

        let mut combined = Outcome::success();
        for file in selection.locate(node)? {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            combined.stdout.push_str(&format!("-- {name} -----\n"));

            let mut invocation = self
                .invocation(node, tool, false)?
                .arg(file.display().to_string())
                .args(flags.iter().copied());
            for key in keys {
                invocation = invocation.args(["-k", key.as_str()]);
            }
            let outcome = self.invoker.invoke(invocation).await?;
            combined.stdout.push_str(&outcome.stdout);
            combined.stderr.push_str(&outcome.stderr);
            if !outcome.is_success() {
                debug!(tool, file = %file.display(), status = outcome.status, "sstable dump failed");
                combined.status = outcome.status;
                break;
            }
        }
        Ok(combined)
    }

    /// `sstablesplit [-s size] [--no-snapshot] files...` over the selection.
    pub async fn split_sstables(
        &self,
        node: &NodeHandle,
        selection: &SstableSelection,
        size_mb: Option<u32>,
        no_snapshot: bool,
    ) -> Result<Outcome> {
        let files = selection.locate(node)?;
        if files.is_empty() {
            return Ok(Outcome::failure(1, "No sstables found"));
        }
        let mut invocation = self.invocation(node, "sstablesplit", true)?;
        if let Some(size) = size_mb {
            invocation = invocation.args(["-s".to_string(), size.to_string()]);
        }
        if no_snapshot {
            invocation = invocation.arg("--no-snapshot");
        }
        let invocation = invocation.args(files.iter().map(|f| f.display().to_string()));
        self.invoker.invoke(invocation).await
    }

    /// Absolute paths of the selected sstables, one per line.
    pub fn list_sstables(&self, node: &NodeHandle, selection: &SstableSelection) -> Result<Outcome> {
        let lines: Vec<String> = selection
            .locate(node)?
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        Ok(Outcome::message(lines.join("\n")))
    }
}
