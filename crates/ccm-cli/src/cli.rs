//! Top-level command line.
//!
//! Only the global flags are parsed here. Everything from the node name on
//! is captured verbatim and handed to the command registry, whose commands
//! each parse their own options.

use clap::{Parser, Subcommand};

// ============================================================================
// CLI argument types
// ============================================================================

/// `ccm [global flags] <node> <command> [options] [args]`
#[derive(Parser, Debug)]
#[command(
    name = "ccm",
    author,
    version,
    about = "Manage the nodes of a local test cluster",
    long_about = None,
    disable_help_subcommand = true,
    subcommand_value_name = "NODE",
    subcommand_help_heading = "Node"
)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "CCM_CONFIG")]
    pub config: Option<String>,

    /// Cluster store directory (default: ~/.ccm).
    #[arg(long)]
    pub config_dir: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Node name followed by a command and its arguments.
    #[command(subcommand)]
    pub command: Option<NodeLine>,
}

/// The node-scoped part of the command line.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum NodeLine {
    #[command(external_subcommand)]
    Node(Vec<String>),
}

impl NodeLine {
    pub fn tokens(&self) -> &[String] {
        match self {
            Self::Node(tokens) => tokens,
        }
    }

    /// Node name.
    pub fn node(&self) -> Option<&str> {
        self.tokens().first().map(String::as_str)
    }

    /// Subcommand name.
    pub fn command(&self) -> Option<&str> {
        self.tokens().get(1).map(String::as_str)
    }

    /// Node name followed by the subcommand's arguments.
    pub fn invocation(&self) -> Vec<String> {
        let tokens = self.tokens();
        tokens
            .first()
            .into_iter()
            .chain(tokens.iter().skip(2))
            .cloned()
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
