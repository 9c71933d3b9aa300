//! The contract every node command implements.
//!
//! A command is driven through three phases:
//!
//! 1. [`NodeCommand::build_parser`] declares its options;
//! 2. [`NodeCommand::validate`] binds the target node and turns the parsed
//!    options into a typed [`Action`], touching nothing;
//! 3. [`ValidatedCommand::execute`] performs the action, once.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use ccm_core::version::version_from_build;
use ccm_core::{
    Installation, LogLevel, NodeHandle, Outcome, Result, Settings, Topology, Workload,
};
use ccm_node::{
    Launcher, Lifecycle, NodeAdmin, QueryShell, SstableSelection, StartOptions, StopOptions,
    StopReport,
};

use crate::commands::{config::ConfUpdate, files, info};
use crate::options::{OptionSchema, ParsedInvocation};

/// Collaborators a command runs against.
#[derive(Clone)]
pub struct Context {
    pub topology: Arc<dyn Topology>,
    pub installation: Arc<dyn Installation>,
    pub lifecycle: Arc<Lifecycle>,
    pub admin: Arc<NodeAdmin>,
}

impl Context {
    /// Load the node named by the invocation.
    pub fn resolve(&self, parsed: &ParsedInvocation) -> Result<NodeHandle> {
        self.topology.resolve_node(parsed.node())
    }
}

/// A subcommand addressed to one node.
pub trait NodeCommand: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line summary for listings and help.
    fn describe(&self) -> &'static str;

    /// Options this command recognizes.
    fn build_parser(&self) -> OptionSchema;

    /// Bind the node and check the options.
    ///
    /// # Errors
    ///
    /// [`ccm_core::Error::UnknownNode`], [`ccm_core::Error::InvalidArguments`]
    /// or [`ccm_core::Error::MissingDependency`].
    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand>;
}

/// What a validated command will do.
#[derive(Debug, Clone)]
pub enum Action {
    Show,
    Remove,
    ShowLog,
    SetLog {
        level: LogLevel,
        class: Option<String>,
    },
    Clear {
        all: bool,
    },
    Start(StartOptions),
    Stop(StopOptions),
    Pause,
    Resume,
    Nodetool {
        keyword: Option<&'static str>,
        args: Vec<String>,
    },
    Decommission {
        force: bool,
    },
    Dsetool {
        args: Vec<String>,
    },
    Query {
        shell: QueryShell,
        exec: Option<String>,
        verbose: bool,
        args: Vec<String>,
    },
    Launch {
        launcher: Launcher,
        args: Vec<String>,
    },
    DumpSstables {
        selection: SstableSelection,
        keys: Vec<String>,
        enumerate: bool,
        outfile: Option<PathBuf>,
    },
    SplitSstables {
        selection: SstableSelection,
        size_mb: Option<u32>,
        no_snapshot: bool,
    },
    ListSstables {
        selection: SstableSelection,
    },
    UpdateConf(ConfUpdate),
    UpdateDseConf {
        settings: Settings,
    },
    UpdateLogConfig {
        path: PathBuf,
    },
    SetDir {
        install_dir: PathBuf,
        version: Option<String>,
    },
    SetWorkload {
        workloads: Vec<Workload>,
    },
    VersionFromBuild,
}

/// A command bound to its node, ready to run.
#[derive(Debug, Clone)]
pub struct ValidatedCommand {
    pub node: NodeHandle,
    pub action: Action,
}

impl ValidatedCommand {
    pub fn new(node: NodeHandle, action: Action) -> Self {
        Self { node, action }
    }

    /// Run the action.
    ///
    /// A delegated tool's non-zero status is reported in the outcome, not as
    /// an error.
    pub async fn execute(self, ctx: &Context) -> Result<Outcome> {
        let Self { mut node, action } = self;
        debug!(node = %node.name, ?action, "Executing");

        match action {
            Action::Show => {
                ctx.lifecycle.reconcile(&mut node)?;
                Ok(Outcome::message(info::render(&node)))
            }
            Action::Remove => {
                ctx.lifecycle.stop(&mut node, &StopOptions::default()).await?;
                ctx.topology.remove_node(&node)?;
                Ok(Outcome::success())
            }
            Action::ShowLog => ctx.admin.page_log(&node).await,
            Action::SetLog { level, class } => {
                ctx.installation
                    .set_log_level(&node, level, class.as_deref())?;
                Ok(Outcome::success())
            }
            Action::Clear { all } => {
                ctx.lifecycle.stop(&mut node, &StopOptions::default()).await?;
                ctx.installation.clear(&node, all)?;
                Ok(Outcome::success())
            }
            Action::Start(opts) => {
                ctx.lifecycle.start(&mut node, &opts).await?;
                Ok(Outcome::success())
            }
            Action::Stop(opts) => match ctx.lifecycle.stop(&mut node, &opts).await? {
                StopReport::NotRunning => {
                    Ok(Outcome::failure(1, format!("{} is not running", node.name)))
                }
                StopReport::Stopped | StopReport::Signalled => Ok(Outcome::success()),
            },
            Action::Pause => {
                ctx.lifecycle.pause(&mut node)?;
                Ok(Outcome::success())
            }
            Action::Resume => {
                ctx.lifecycle.resume(&mut node)?;
                Ok(Outcome::success())
            }
            Action::Nodetool { keyword, args } => {
                ctx.admin.nodetool(&mut node, keyword, &args).await
            }
            Action::Decommission { force } => ctx.admin.decommission(&mut node, force).await,
            Action::Dsetool { args } => ctx.admin.dsetool(&mut node, &args).await,
            Action::Query {
                shell,
                exec,
                verbose,
                args,
            } => {
                ctx.admin
                    .query_session(&mut node, shell, exec.as_deref(), verbose, &args)
                    .await
            }
            Action::Launch { launcher, args } => {
                ctx.admin.launch(&mut node, &launcher, &args).await
            }
            Action::DumpSstables {
                selection,
                keys,
                enumerate,
                outfile,
            } => {
                let outcome = ctx
                    .admin
                    .dump_sstables(&node, &selection, &keys, enumerate)
                    .await?;
                files::write_dump(outcome, outfile.as_deref())
            }
            Action::SplitSstables {
                selection,
                size_mb,
                no_snapshot,
            } => {
                ctx.admin
                    .split_sstables(&node, &selection, size_mb, no_snapshot)
                    .await
            }
            Action::ListSstables { selection } => ctx.admin.list_sstables(&node, &selection),
            Action::UpdateConf(update) => {
                update.apply(&node, ctx)?;
                Ok(Outcome::success())
            }
            Action::UpdateDseConf { settings } => {
                ctx.installation.rewrite_dse_config(&node, &settings)?;
                Ok(Outcome::success())
            }
            Action::UpdateLogConfig { path } => {
                ctx.installation.rewrite_log_config(&node, &path)?;
                Ok(Outcome::success())
            }
            Action::SetDir {
                install_dir,
                version,
            } => {
                ctx.installation
                    .set_install_dir(&mut node, &install_dir, version.as_deref())?;
                Ok(Outcome::message(format!(
                    "{} now uses {}",
                    node.name,
                    ctx.installation.install_directory(&node)?.display()
                )))
            }
            Action::SetWorkload { workloads } => {
                ctx.installation.set_workloads(&mut node, &workloads)?;
                Ok(Outcome::success())
            }
            Action::VersionFromBuild => {
                let install_dir = ctx.installation.install_directory(&node)?;
                Ok(Outcome::message(version_from_build(&install_dir)?.to_string()))
            }
        }
    }
}
