//! The ccm application.
//!
//! Wires the file-backed cluster store, the process layer and the tool
//! runner into a [`Context`], then routes a node command line through the
//! [`Registry`]: parse, validate, execute.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use ccm_cluster::FileCluster;
use ccm_core::{Error, HostPlatform, Installation, Outcome, Result, Topology};
use ccm_node::{Lifecycle, NodeAdmin, OsProcessControl, Subprocess};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, NodeLine};
use crate::command::{Context, NodeCommand};
use crate::config::CcmConfig;
use crate::options::{ParseResult, ParsedInvocation};
use crate::registry::Registry;

// ============================================================================
// CcmCli
// ============================================================================

/// A command line routed as far as it can go without touching a cluster.
enum Step {
    Done(Outcome),
    Run(Box<dyn NodeCommand>, ParsedInvocation),
}

pub struct CcmCli {
    config: CcmConfig,
    registry: Registry,
}

impl CcmCli {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let mut config = CcmConfig::load(args.config.as_deref())?;
        if let Some(dir) = &args.config_dir {
            config.config_dir = Some(dir.clone());
        }
        Ok(Self::new(config))
    }

    pub fn new(config: CcmConfig) -> Self {
        Self {
            config,
            registry: Registry::builtin(),
        }
    }

    /// Replace the command table.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &CcmConfig {
        &self.config
    }

    /// Initialise tracing-based logging on stderr.
    ///
    /// Uses `RUST_LOG` env var if set, otherwise defaults based on verbosity flags.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // Ignore error if a subscriber is already set (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Collaborators backed by the current cluster of the store directory.
    pub fn context(&self) -> Result<Context> {
        let store: PathBuf = self.config.store_dir()?;
        debug!(store = %store.display(), "Opening current cluster");
        let processes = Arc::new(OsProcessControl::new());
        let cluster =
            Arc::new(FileCluster::open_current(&store)?.with_processes(processes.clone()));
        let topology: Arc<dyn Topology> = cluster.clone();
        let installation: Arc<dyn Installation> = cluster;

        let lifecycle = Arc::new(
            Lifecycle::new(
                processes,
                topology.clone(),
                installation.clone(),
                HostPlatform::detect(),
            )
            .with_timings(self.config.timings()),
        );
        let admin = Arc::new(
            NodeAdmin::new(
                Arc::new(Subprocess::new()),
                lifecycle.clone(),
                installation.clone(),
            )
            .with_pager(self.config.tools.pager.clone()),
        );
        Ok(Context {
            topology,
            installation,
            lifecycle,
            admin,
        })
    }

    /// Run the CLI with the given arguments and return the exit status.
    pub async fn run(&self, args: CliArgs) -> i32 {
        self.init_logging(args.verbose, args.quiet);

        let mut stdout = std::io::stdout();
        let mut stderr = std::io::stderr();
        let result = match &args.command {
            Some(line) => self.run_line(line).await,
            None => Ok(Outcome::failure(2, top_level_usage())),
        };
        match result {
            Ok(outcome) => {
                emit(&outcome, &mut stdout, &mut stderr);
                outcome.status
            }
            Err(err) => {
                report_error(&err, &mut stderr);
                err.exit_code()
            }
        }
    }

    async fn run_line(&self, line: &NodeLine) -> Result<Outcome> {
        match self.prepare(line)? {
            Step::Done(outcome) => Ok(outcome),
            Step::Run(cmd, parsed) => {
                let ctx = self.context()?;
                run_command(cmd.as_ref(), &parsed, &ctx).await
            }
        }
    }

    /// Route `line` against an existing context.
    pub async fn dispatch(&self, line: &NodeLine, ctx: &Context) -> Result<Outcome> {
        match self.prepare(line)? {
            Step::Done(outcome) => Ok(outcome),
            Step::Run(cmd, parsed) => run_command(cmd.as_ref(), &parsed, ctx).await,
        }
    }

    fn prepare(&self, line: &NodeLine) -> Result<Step> {
        let Some(name) = line.command() else {
            return Ok(Step::Done(Outcome::message(self.registry.listing())));
        };
        let cmd = self.registry.lookup(name)?;
        debug!(command = name, node = ?line.node(), "Parsing node command");
        match cmd.build_parser().parse(&line.invocation())? {
            ParseResult::Help(help) => Ok(Step::Done(Outcome::message(help))),
            ParseResult::Parsed(parsed) => Ok(Step::Run(cmd, parsed)),
        }
    }
}

async fn run_command(
    cmd: &dyn NodeCommand,
    parsed: &ParsedInvocation,
    ctx: &Context,
) -> Result<Outcome> {
    let validated = cmd.validate(parsed, ctx)?;
    debug!(command = cmd.name(), node = %validated.node.name, "Executing");
    validated.execute(ctx).await
}

fn top_level_usage() -> String {
    "Usage: ccm [options] <node> <command> [command options]\n\
     Run `ccm <node>` to list node commands."
        .to_string()
}

fn write_stream(out: &mut impl Write, text: &str) {
    if text.is_empty() {
        return;
    }
    let _ = out.write_all(text.as_bytes());
    if !text.ends_with('\n') {
        let _ = out.write_all(b"\n");
    }
}

/// Print a command's output, stderr first.
pub fn emit(outcome: &Outcome, stdout: &mut impl Write, stderr: &mut impl Write) {
    write_stream(stderr, &outcome.stderr);
    write_stream(stdout, &outcome.stdout);
}

/// Print an error the way the user expects to read it.
pub fn report_error(err: &Error, stderr: &mut impl Write) {
    write_stream(stderr, &err.to_string());
    if let Error::NodeStartFailed { stderr: captured, .. } = err {
        write_stream(stderr, "Standard error output is:");
        for line in captured.lines() {
            write_stream(stderr, line);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
