//! Commands that rewrite a node's configuration or installation.

use std::path::PathBuf;

use serde_yaml::Value;

use ccm_cluster::{parse_settings, parse_yaml_settings};
use ccm_core::util::paths::expand_tilde;
use ccm_core::{Error, LogLevel, NodeHandle, Result, ServerVersion, Settings, Workload};

use crate::command::{Action, Context, NodeCommand, ValidatedCommand};
use crate::options::{OptionSchema, OptionSpec, ParsedInvocation};

/// Timeout keys that replaced `rpc_timeout_in_ms` in 1.2.
const REQUEST_TIMEOUT_KEYS: [&str; 5] = [
    "read_request_timeout_in_ms",
    "range_request_timeout_in_ms",
    "write_request_timeout_in_ms",
    "truncate_request_timeout_in_ms",
    "request_timeout_in_ms",
];

fn yaml_option(command: &'static str) -> OptionSpec {
    let help = match command {
        "updatedseconf" => "Pass in literal yaml strings, e.g. updatedseconf -y 'a: [b: [c,d]]'",
        _ => "Pass in literal yaml strings, e.g. updateconf -y 'a: [b: [c,d]]'",
    };
    OptionSpec::flag("yaml", help).short('y')
}

fn settings_from(parsed: &ParsedInvocation) -> Result<Settings> {
    if parsed.flag("yaml") {
        parse_yaml_settings(parsed.args())
    } else {
        parse_settings(parsed.args())
    }
}

/// Validated form of `updateconf`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfUpdate {
    pub settings: Settings,
    pub hinted_handoff: bool,
    pub rpc_timeout: Option<u32>,
    /// `Some(true)` for batch commit log, `Some(false)` for periodic.
    pub batch_commit_log: Option<bool>,
}

impl ConfUpdate {
    /// Settings to write, given the server version.
    pub fn resolved_settings(&self, version: &ServerVersion) -> Settings {
        let mut settings = self.settings.clone();
        settings.insert(
            "hinted_handoff_enabled".into(),
            Value::Bool(self.hinted_handoff),
        );
        if let Some(timeout) = self.rpc_timeout {
            if *version < ServerVersion::new(1, 2, 0) {
                settings.insert("rpc_timeout_in_ms".into(), timeout.into());
            } else {
                for key in REQUEST_TIMEOUT_KEYS {
                    settings.insert(key.into(), timeout.into());
                }
            }
        }
        settings
    }

    pub(crate) fn apply(&self, node: &NodeHandle, ctx: &Context) -> Result<()> {
        let version = ctx.topology.server_version()?;
        ctx.installation
            .rewrite_config(node, &self.resolved_settings(&version))?;
        if let Some(batch) = self.batch_commit_log {
            ctx.installation.set_commit_log_mode(node, batch)?;
        }
        Ok(())
    }
}

pub struct UpdateConf;

impl NodeCommand for UpdateConf {
    fn name(&self) -> &'static str {
        "updateconf"
    }

    fn describe(&self) -> &'static str {
        "Update the cassandra config files for this node (useful when updating cassandra)"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage(
                "ccm <node> updateconf [options] [new_setting ...], \
                 where new_setting is a string such as 'compaction_throughput_mb_per_sec: 32'",
            )
            .option(OptionSpec::flag("no-hh", "Disable hinted handoff").alias("no-hinted-handoff"))
            .option(
                OptionSpec::flag("batch-cl", "Set commit log to batch mode")
                    .alias("batch-commit-log"),
            )
            .option(
                OptionSpec::flag("periodic-cl", "Set commit log to periodic mode")
                    .alias("periodic-commit-log"),
            )
            .option(OptionSpec::int("rt", "Set rpc timeout").alias("rpc-timeout"))
            .option(yaml_option("updateconf"))
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let batch = parsed.flag("batch-cl");
        let periodic = parsed.flag("periodic-cl");
        if batch && periodic {
            return Err(Error::invalid_arguments(
                "Can't set commitlog to be both batch and periodic.",
            ));
        }
        let update = ConfUpdate {
            settings: settings_from(parsed)?,
            hinted_handoff: !parsed.flag("no-hh"),
            rpc_timeout: parsed.count("rt")?,
            batch_commit_log: (batch || periodic).then_some(batch),
        };
        Ok(ValidatedCommand::new(node, Action::UpdateConf(update)))
    }
}

pub struct UpdateDseConf;

impl NodeCommand for UpdateDseConf {
    fn name(&self) -> &'static str {
        "updatedseconf"
    }

    fn describe(&self) -> &'static str {
        "Update the dse config files for this node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage(
                "ccm <node> updatedseconf [options] [new_setting ...], \
                 where new_setting is a string such as 'max_solr_concurrency_per_core: 2'; \
                 nested options use dots, as in 'cql_slow_log_options.enabled: true'",
            )
            .option(yaml_option("updatedseconf"))
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let settings = settings_from(parsed)?;
        Ok(ValidatedCommand::new(node, Action::UpdateDseConf { settings }))
    }
}

pub struct UpdateLog4j;

impl NodeCommand for UpdateLog4j {
    fn name(&self) -> &'static str {
        "updatelog4j"
    }

    fn describe(&self) -> &'static str {
        "Update the log configuration file of this node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage("ccm <node> updatelog4j -p <log config>")
            .option(
                OptionSpec::value("path", "Path to the new log configuration file").short('p'),
            )
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let path = parsed.value("path").ok_or_else(|| {
            Error::invalid_arguments("-p or --path <path of new log configuration file> is not provided")
        })?;
        Ok(ValidatedCommand::new(
            node,
            Action::UpdateLogConfig {
                path: expand_tilde(path),
            },
        ))
    }
}

pub struct SetLog;

impl NodeCommand for SetLog {
    fn name(&self) -> &'static str {
        "setlog"
    }

    fn describe(&self) -> &'static str {
        "Set node name log level (INFO, DEBUG, ...) with/without Java class - require a node restart"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage("ccm <node> setlog [options] level")
            .option(
                OptionSpec::value(
                    "class",
                    "Optional java class/package. Logging will be set for only this class/package if set",
                )
                .short('c'),
            )
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let level: LogLevel = parsed
            .args()
            .first()
            .ok_or_else(|| Error::invalid_arguments("Missing log level"))?
            .parse()?;
        Ok(ValidatedCommand::new(
            node,
            Action::SetLog {
                level,
                class: parsed.value("class"),
            },
        ))
    }
}

pub struct SetDir;

impl NodeCommand for SetDir {
    fn name(&self) -> &'static str {
        "setdir"
    }

    fn describe(&self) -> &'static str {
        "Set the cassandra directory to use for the node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .option(
                OptionSpec::value(
                    "version",
                    "Use the given cassandra or dse version (takes precedence over --install-dir)",
                )
                .short('v'),
            )
            .option(
                OptionSpec::value("install-dir", "Path to the cassandra or dse directory to use")
                    .default_value("./"),
            )
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let install_dir = parsed
            .value("install-dir")
            .map(expand_tilde)
            .unwrap_or_else(|| PathBuf::from("./"));
        Ok(ValidatedCommand::new(
            node,
            Action::SetDir {
                install_dir,
                version: parsed.value("version"),
            },
        ))
    }
}

pub struct SetWorkload;

impl NodeCommand for SetWorkload {
    fn name(&self) -> &'static str {
        "setworkload"
    }

    fn describe(&self) -> &'static str {
        "Sets the workloads for a DSE node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage("ccm <node> setworkload [cassandra|solr|hadoop|spark|dsefs|cfs|graph],...")
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let list = parsed
            .args()
            .first()
            .ok_or_else(|| Error::invalid_arguments("Missing workload list"))?;
        let workloads = list
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Workload>>>()?;
        Ok(ValidatedCommand::new(node, Action::SetWorkload { workloads }))
    }
}
