//! Sstable introspection commands.

use std::path::{Path, PathBuf};

use ccm_core::{Error, Outcome, Result};
use ccm_node::SstableSelection;
use ccm_node::sstables::split_list;

use crate::command::{Action, Context, NodeCommand, ValidatedCommand};
use crate::options::{OptionSchema, OptionSpec, ParsedInvocation};

fn keyspace_option() -> OptionSpec {
    OptionSpec::value(
        "keyspace",
        "The keyspace to use [use all keyspaces by default]",
    )
    .short('k')
}

/// Selection from `-k`, the table option `table_id` and the positional data
/// files.
fn selection(
    parsed: &ParsedInvocation,
    table_id: &str,
    table_flag: &str,
    datafiles: Vec<String>,
) -> Result<SstableSelection> {
    let tables = parsed
        .value(table_id)
        .map(|v| split_list(&v))
        .unwrap_or_default();
    SstableSelection::new(parsed.value("keyspace"), tables, datafiles, table_flag)
}

/// Write a dump to `outfile`, or leave it for standard output.
pub(crate) fn write_dump(outcome: Outcome, outfile: Option<&Path>) -> Result<Outcome> {
    let Some(path) = outfile else {
        return Ok(outcome);
    };
    std::fs::write(path, &outcome.stdout).map_err(|e| Error::io_with_path(e, path))?;
    Ok(Outcome {
        stdout: String::new(),
        ..outcome
    })
}

pub struct Json;

impl NodeCommand for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn describe(&self) -> &'static str {
        "Call sstable2json/sstabledump on the sstables of this node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage("ccm <node> json [options] [file]")
            .option(keyspace_option())
            .option(
                OptionSpec::value(
                    "column-families",
                    "Comma separated list of column families to use (requires -k to be set)",
                )
                .short('c'),
            )
            .option(OptionSpec::append(
                "key",
                "The key to include (you may specify multiple --key)",
            ))
            .option(
                OptionSpec::flag("enumerate-keys", "Only enumerate keys").short('e'),
            )
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        if parsed.value("keyspace").is_none() {
            return Err(Error::invalid_arguments("You must specify a keyspace."));
        }
        let selection = selection(parsed, "column-families", "-c", Vec::new())?;
        Ok(ValidatedCommand::new(
            node,
            Action::DumpSstables {
                selection,
                keys: parsed.values("key"),
                enumerate: parsed.flag("enumerate-keys"),
                outfile: parsed.args().last().map(PathBuf::from),
            },
        ))
    }
}

pub struct SstableSplit;

impl NodeCommand for SstableSplit {
    fn name(&self) -> &'static str {
        "sstablesplit"
    }

    fn describe(&self) -> &'static str {
        "Run sstablesplit on the sstables of this node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage("ccm <node> sstablesplit [options] [file...]")
            .option(keyspace_option())
            .option(
                OptionSpec::value(
                    "column-families",
                    "Comma separated list of column families to use (requires -k to be set)",
                )
                .short('c'),
            )
            .option(
                OptionSpec::int(
                    "size",
                    "Maximum size in MB for the output sstables (default: 50 MB)",
                )
                .short('s'),
            )
            .option(OptionSpec::flag(
                "no-snapshot",
                "Don't snapshot the sstables before splitting",
            ))
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let selection = selection(parsed, "column-families", "-c", parsed.args().to_vec())?;
        Ok(ValidatedCommand::new(
            node,
            Action::SplitSstables {
                selection,
                size_mb: parsed.count("size")?,
                no_snapshot: parsed.flag("no-snapshot"),
            },
        ))
    }
}

pub struct GetSstables;

impl NodeCommand for GetSstables {
    fn name(&self) -> &'static str {
        "getsstables"
    }

    fn describe(&self) -> &'static str {
        "Get the absolute paths of the sstables of this node"
    }

    fn build_parser(&self) -> OptionSchema {
        OptionSchema::new(self.name(), self.describe())
            .usage("ccm <node> getsstables [options] [file...]")
            .option(keyspace_option())
            .option(
                OptionSpec::value(
                    "tables",
                    "Comma separated list of tables to use (requires -k to be set)",
                )
                .short('t'),
            )
    }

    fn validate(&self, parsed: &ParsedInvocation, ctx: &Context) -> Result<ValidatedCommand> {
        let node = ctx.resolve(parsed)?;
        let selection = selection(parsed, "tables", "-t", parsed.args().to_vec())?;
        Ok(ValidatedCommand::new(node, Action::ListSstables { selection }))
    }
}
