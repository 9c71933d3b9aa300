//! nodetool and dsetool delegation.

use ccm_core::Result;

use crate::command::{Action, Context, NodeCommand, ValidatedCommand};
use crate::options::{OptionSchema, OptionSpec, ParsedInvocation};

/// A nodetool invocation, optionally fixed to one keyword (`ring`,
/// `flush`, ...). Extra arguments are passed through.
pub struct Nodetool {
    pub name: &'static str,
    pub keyword: Option<&'static str>,
    pub about: &'static str,
}

impl Nodetool {
    pub const fn keyword(name: &'static str, about: &'static str) -> Self {
        Self {
            name,
            keyword: Some(name),
            about,
        }
    }

    pub const fn raw() -> Self {
        Self {
            name: "nodetool",
            keyword: None,
            about: "Run nodetool (connecting to node name)",
        }
    }
}

impl NodeCommand for Nodetool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn describe(&self) -> &'static str {
        self.about
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name, self.about)
            .usage(format!("ccm <node> {} [nodetool args]", self.name))
            .pass_through()
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        Ok(ValidatedCommand::new(
            node,
            Action::Nodetool {
                keyword: self.keyword,
                args: parsed.forwarded.clone(),
            },
        ))
    }
}

pub struct Decommission;

impl NodeCommand for Decommission {
    fn name(&self) -> &'static str {
        "decommission"
    }

    fn describe(&self) -> &'static str {
        "Run decommission on node name"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe()).option(OptionSpec::flag(
            "force",
            "Force decommission even when it leaves fewer replicas than the replication factor",
        ))
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        Ok(ValidatedCommand::new(
            node,
            Action::Decommission {
                force: parsed.flag("force"),
            },
        ))
    }
}

pub struct Dsetool;

impl NodeCommand for Dsetool {
    fn name(&self) -> &'static str {
        "dsetool"
    }

    fn describe(&self) -> &'static str {
        "Run dsetool (connecting to node name)"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage("ccm <node> dsetool [dsetool args]")
            .pass_through()
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        Ok(ValidatedCommand::new(
            node,
            Action::Dsetool {
                args: parsed.forwarded.clone(),
            },
        ))
    }
}
