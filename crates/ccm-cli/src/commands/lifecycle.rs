//! Commands that move a node through its lifecycle.

use ccm_core::Result;
use ccm_node::{ShutdownSignal, StartOptions, StopOptions};

use crate::command::{Action, Context, NodeCommand, ValidatedCommand};
use crate::options::{OptionSchema, OptionSpec, ParsedInvocation};

const SIGNAL_FLAGS: [&str; 3] = ["gently", "hang-up", "not-gently"];

pub struct Start;

impl NodeCommand for Start {
    fn name(&self) -> &'static str {
        "start"
    }

    fn describe(&self) -> &'static str {
        "Start a node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .option(
                OptionSpec::flag("verbose", "Print standard output of the server process")
                    .short('v'),
            )
            .option(OptionSpec::flag(
                "no-wait",
                "Do not wait for the node to be ready",
            ))
            .option(OptionSpec::flag(
                "wait-other-notice",
                "Ignored; waiting for other nodes is the default",
            ))
            .option(OptionSpec::flag(
                "skip-wait-other-notice",
                "Do not wait until the other live nodes mark this one UP",
            ))
            .option(OptionSpec::flag(
                "wait-for-binary-proto",
                "Wait for the native protocol port to accept connections",
            ))
            .option(
                OptionSpec::flag("dont-join-ring", "Start without joining the ring").short('j'),
            )
            .option(OptionSpec::value(
                "replace-address",
                "Replace a dead node through cassandra.replace_address",
            ))
            .option(OptionSpec::append("jvm_arg", "Extra JVM argument (repeatable)"))
            .option(OptionSpec::flag(
                "quiet-windows",
                "Pass -q to the launcher on Windows; ignored elsewhere",
            ))
            .option(OptionSpec::flag("root", "Allow starting the server as root"))
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let opts = StartOptions {
            join_ring: !parsed.flag("dont-join-ring"),
            no_wait: parsed.flag("no-wait"),
            wait_other_notice: !parsed.flag("skip-wait-other-notice"),
            wait_for_binary_proto: parsed.flag("wait-for-binary-proto"),
            replace_address: parsed.value("replace-address"),
            jvm_args: parsed.values("jvm_arg"),
            allow_root: parsed.flag("root"),
            quiet_windows: parsed.flag("quiet-windows"),
            verbose: parsed.flag("verbose"),
        };
        Ok(ValidatedCommand::new(node, Action::Start(opts)))
    }
}

pub struct Stop;

impl NodeCommand for Stop {
    fn name(&self) -> &'static str {
        "stop"
    }

    fn describe(&self) -> &'static str {
        "Stop a node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .option(OptionSpec::flag(
                "no-wait",
                "Do not wait for the node to be stopped",
            ))
            .option(OptionSpec::flag("gently", "Shut down gently (default)").short('g'))
            .option(OptionSpec::flag("hang-up", "Shut down via hang up (kill -1)"))
            .option(OptionSpec::flag("not-gently", "Shut down immediately (kill -9)"))
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let signal = match parsed.last_of(&SIGNAL_FLAGS) {
            Some("hang-up") => ShutdownSignal::HangUp,
            Some("not-gently") => ShutdownSignal::Forceful,
            _ => ShutdownSignal::Gentle,
        };
        let opts = StopOptions {
            wait: !parsed.flag("no-wait"),
            signal,
        };
        Ok(ValidatedCommand::new(node, Action::Stop(opts)))
    }
}

/// `pause` and `resume`.
pub struct Suspend {
    pub pause: bool,
}

impl NodeCommand for Suspend {
    fn name(&self) -> &'static str {
        if self.pause { "pause" } else { "resume" }
    }

    fn describe(&self) -> &'static str {
        if self.pause {
            "Send a SIGSTOP to this node"
        } else {
            "Send a SIGCONT to this node"
        }
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage(format!("ccm <node> {}", self.name()))
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let action = if self.pause {
            Action::Pause
        } else {
            Action::Resume
        };
        Ok(ValidatedCommand::new(node, action))
    }
}

pub struct Remove;

impl NodeCommand for Remove {
    fn name(&self) -> &'static str {
        "remove"
    }

    fn describe(&self) -> &'static str {
        "Remove a node (stopping it if necessary and deleting all its data)"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        Ok(ValidatedCommand::new(ctx.resolve(parsed)?, Action::Remove))
    }
}

pub struct Clear;

impl NodeCommand for Clear {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn describe(&self) -> &'static str {
        "Clear the node data & logs (and stop the node)"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe()).option(
            OptionSpec::flag("all", "Also clear the saved cache and node log files").short('a'),
        )
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        Ok(ValidatedCommand::new(
            node,
            Action::Clear {
                all: parsed.flag("all"),
            },
        ))
    }
}
