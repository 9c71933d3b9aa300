//! Read-only node information.

use std::fmt::Write as _;

use ccm_core::{NodeHandle, Result};

use crate::command::{Action, Context, NodeCommand, ValidatedCommand};
use crate::options::{OptionSchema, ParsedInvocation};

/// Text shown by `show`.
pub(crate) fn render(node: &NodeHandle) -> String {
    let status = if node.state().has_process() { "UP" } else { "DOWN" };
    let mut out = format!("{}: {status}\n", node.name);
    let mut field = |key: &str, value: String| {
        let _ = writeln!(out, "       {key}={value}");
    };
    field("cluster", node.cluster.clone());
    field("state", node.state().to_string());
    field("address", node.address.clone());
    field("jmx_port", node.jmx_port.to_string());
    field("binary", format!("{}:{}", node.address, node.binary_port));
    field("thrift", format!("{}:{}", node.address, node.rpc_port));
    if let Some(port) = node.byteman_port {
        field("byteman_port", port.to_string());
    }
    if let Some(pid) = node.pid() {
        field("pid", pid.to_string());
    }
    if let Some(dir) = &node.install_dir {
        field("install_dir", dir.display().to_string());
    }
    if !node.workloads.is_empty() {
        field("workloads", node.workloads.join(","));
    }
    field("log", node.log_file.display().to_string());
    out.truncate(out.trim_end().len());
    out
}

pub struct Show;

impl NodeCommand for Show {
    fn name(&self) -> &'static str {
        "show"
    }

    fn describe(&self) -> &'static str {
        "Display information on a node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        Ok(ValidatedCommand::new(ctx.resolve(parsed)?, Action::Show))
    }
}

pub struct VersionFromBuild;

impl NodeCommand for VersionFromBuild {
    fn name(&self) -> &'static str {
        "versionfrombuild"
    }

    fn describe(&self) -> &'static str {
        "Print the node's version as grepped from build.xml. Can be used when the node isn't running."
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe()).usage("ccm <node> versionfrombuild")
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        Ok(ValidatedCommand::new(
            ctx.resolve(parsed)?,
            Action::VersionFromBuild,
        ))
    }
}
