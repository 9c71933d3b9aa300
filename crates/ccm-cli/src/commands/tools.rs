//! Query shells and other tools launched against a node.

use ccm_core::{Error, Result};
use ccm_node::{Launcher, QueryShell};

use crate::command::{Action, Context, NodeCommand, ValidatedCommand};
use crate::options::{OptionSchema, OptionSpec, ParsedInvocation};

/// `cli` and `cqlsh`.
pub struct Query {
    pub shell: QueryShell,
}

impl NodeCommand for Query {
    fn name(&self) -> &'static str {
        match self.shell {
            QueryShell::Cli => "cli",
            QueryShell::Cqlsh => "cqlsh",
        }
    }

    fn describe(&self) -> &'static str {
        match self.shell {
            QueryShell::Cli => "Launch a cassandra cli connected to this node",
            QueryShell::Cqlsh => "Launch a cqlsh session connected to this node",
        }
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage(format!("ccm <node> {} [options] [{}_options]", self.name(), self.name()))
            .option(
                OptionSpec::value("exec", "Execute the specified commands and exit").short('x'),
            )
            .option(
                OptionSpec::flag("verbose", "With --exec, show the output after completion")
                    .short('v'),
            )
            .pass_through()
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        Ok(ValidatedCommand::new(
            node,
            Action::Query {
                shell: self.shell,
                exec: parsed.value("exec"),
                verbose: parsed.flag("verbose"),
                args: parsed.forwarded.clone(),
            },
        ))
    }
}

/// A tool attached to the terminal, with every unrecognized token passed
/// through.
pub struct Launch {
    pub name: &'static str,
    pub about: &'static str,
    pub launcher: Launcher,
}

impl Launch {
    pub fn new(name: &'static str, about: &'static str, launcher: Launcher) -> Self {
        Self {
            name,
            about,
            launcher,
        }
    }
}

impl NodeCommand for Launch {
    fn name(&self) -> &'static str {
        self.name
    }

    fn describe(&self) -> &'static str {
        self.about
    }

    fn build_parser(&self) -> OptionSchema {
        let schema = OptionSchema::new(self.name, self.about);
        if self.launcher == Launcher::Jconsole {
            return schema.usage("ccm <node> jconsole");
        }
        schema
            .usage(format!("ccm <node> {} [{}_options]", self.name, self.name))
            .pass_through()
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        Ok(ValidatedCommand::new(
            node,
            Action::Launch {
                launcher: self.launcher.clone(),
                args: parsed.forwarded.clone(),
            },
        ))
    }
}

/// `cassandra-shuffle` with a required sub-command.
pub struct Shuffle;

impl NodeCommand for Shuffle {
    fn name(&self) -> &'static str {
        "shuffle"
    }

    fn describe(&self) -> &'static str {
        "Run shuffle on a node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage("ccm <node> shuffle <shuffle_cmd> [shuffle_options]")
            .pass_through()
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let sub = parsed
            .args()
            .first()
            .cloned()
            .ok_or_else(|| Error::invalid_arguments("Missing shuffle command"))?;
        let mut args = parsed.forwarded.clone();
        if let Some(at) = args.iter().position(|a| *a == sub) {
            args.remove(at);
        }
        Ok(ValidatedCommand::new(
            node,
            Action::Launch {
                launcher: Launcher::Shuffle(sub),
                args,
            },
        ))
    }
}

pub struct ShowLog;

impl NodeCommand for ShowLog {
    fn name(&self) -> &'static str {
        "showlog"
    }

    fn describe(&self) -> &'static str {
        "Show the log of node name (runs your $PAGER on its system.log)"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        Ok(ValidatedCommand::new(ctx.resolve(parsed)?, Action::ShowLog))
    }
}
