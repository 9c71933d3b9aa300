//! The table of node commands, keyed by name.

use ccm_core::{Error, Result};
use ccm_node::{Launcher, QueryShell};

use crate::command::NodeCommand;
use crate::commands::admin::{Decommission, Dsetool, Nodetool};
use crate::commands::config::{
    SetDir, SetLog, SetWorkload, UpdateConf, UpdateDseConf, UpdateLog4j,
};
use crate::commands::files::{GetSstables, Json, SstableSplit};
use crate::commands::info::{Show, VersionFromBuild};
use crate::commands::lifecycle::{Clear, Remove, Start, Stop, Suspend};
use crate::commands::tools::{Launch, Query, Shuffle, ShowLog};

type Constructor = Box<dyn Fn() -> Box<dyn NodeCommand> + Send + Sync>;

/// Append-only command table. A name registered twice resolves to its last
/// registration.
pub struct Registry {
    entries: Vec<(&'static str, Constructor)>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register<C, F>(&mut self, name: &'static str, make: F) -> &mut Self
    where
        C: NodeCommand + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let constructor: Constructor =
            Box::new(move || -> Box<dyn NodeCommand> { Box::new(make()) });
        self.entries.push((name, constructor));
        self
    }

    /// Every command `ccm <node>` understands.
    pub fn builtin() -> Self {
        let mut r = Self::empty();
        r.register("show", || Show)
            .register("remove", || Remove)
            .register("showlog", || ShowLog)
            .register("setlog", || SetLog)
            .register("clear", || Clear)
            .register("start", || Start)
            .register("stop", || Stop)
            .register("ring", || {
                Nodetool::keyword("ring", "Display the cluster ring (as seen by this node)")
            })
            .register("flush", || Nodetool::keyword("flush", "Flush node name"))
            .register("compact", || Nodetool::keyword("compact", "Compact node name"))
            .register("drain", || Nodetool::keyword("drain", "Drain node name"))
            .register("cleanup", || Nodetool::keyword("cleanup", "Run cleanup on node name"))
            .register("repair", || Nodetool::keyword("repair", "Run repair on node name"))
            .register("scrub", || {
                Launch::new("scrub", "Scrub an sstable offline", Launcher::Scrub)
            })
            .register("verify", || {
                Launch::new("verify", "Verify sstables offline", Launcher::Verify)
            })
            .register("shuffle", || Shuffle)
            .register("sstablesplit", || SstableSplit)
            .register("getsstables", || GetSstables)
            .register("decommission", || Decommission)
            .register("json", || Json)
            .register("updateconf", || UpdateConf)
            .register("updatedseconf", || UpdateDseConf)
            .register("updatelog4j", || UpdateLog4j)
            .register("stress", || {
                Launch::new("stress", "Run stress on a node", Launcher::Stress)
            })
            .register("cli", || Query {
                shell: QueryShell::Cli,
            })
            .register("cqlsh", || Query {
                shell: QueryShell::Cqlsh,
            })
            .register("scrub", || {
                Launch::new(
                    "scrub",
                    "Scrub the sstables of this node (offline)",
                    Launcher::Scrub,
                )
            })
            .register("verify", || {
                Launch::new(
                    "verify",
                    "Verify the sstables of this node (offline)",
                    Launcher::Verify,
                )
            })
            .register("status", || {
                Nodetool::keyword("status", "Display the cluster status (as seen by this node)")
            })
            .register("setdir", || SetDir)
            .register("bulkload", || {
                Launch::new(
                    "bulkload",
                    "Bulkload files into the cluster by connecting to this node",
                    Launcher::Bulkload,
                )
            })
            .register("version", || {
                Nodetool::keyword("version", "Print the version reported by this node")
            })
            .register("nodetool", Nodetool::raw)
            .register("dsetool", || Dsetool)
            .register("setworkload", || SetWorkload)
            .register("dse", || {
                Launch::new(
                    "dse",
                    "Launch a dse client application connected to this node",
                    Launcher::Dse(None),
                )
            });
        for (name, about) in DSE_CLIENTS {
            r.register(name, move || {
                Launch::new(name, about, Launcher::Dse(Some(name.to_string())))
            });
        }
        r.register("pause", || Suspend { pause: true })
            .register("resume", || Suspend { pause: false })
            .register("jconsole", || {
                Launch::new(
                    "jconsole",
                    "Opens jconsole client and connects to a running node",
                    Launcher::Jconsole,
                )
            })
            .register("versionfrombuild", || VersionFromBuild)
            .register("byteman", || {
                Launch::new("byteman", "Invoke byteman-submit", Launcher::Byteman)
            });
        r
    }

    /// Instantiate the command registered last under `name`.
    pub fn lookup(&self, name: &str) -> Result<Box<dyn NodeCommand>> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, make)| make())
            .ok_or_else(|| Error::UnknownCommand(name.to_string()))
    }

    /// Registered names in first-registration order, without repeats.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::with_capacity(self.entries.len());
        for &(name, _) in &self.entries {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Name and summary of every command, for the node-level listing.
    pub fn listing(&self) -> String {
        let names = self.names();
        let width = names.iter().map(|n| n.len()).max().unwrap_or(0);
        let mut out = String::from("Node commands:\n");
        for name in names {
            if let Ok(cmd) = self.lookup(name) {
                out.push_str(&format!("  {name:<width$}  {}\n", cmd.describe()));
            }
        }
        out
    }
}

const DSE_CLIENTS: [(&str, &str); 5] = [
    ("hadoop", "Launch a hadoop session connected to this node"),
    ("hive", "Launch a hive session connected to this node"),
    ("pig", "Launch a pig session connected to this node"),
    ("sqoop", "Launch a sqoop session connected to this node"),
    ("spark", "Launch a spark session connected to this node"),
];
