//! Per-command option parsing.
//!
//! Each command declares an [`OptionSchema`]. Parsing happens in two passes:
//! the raw tokens are first split into the ones the schema recognizes and
//! everything else, then the recognized tokens go through a `clap` command
//! built from the schema. Unrecognized tokens are either rejected or kept,
//! in their original order, for forwarding to a wrapped tool.

use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use ccm_core::{Error, Result};

// ============================================================================
// Schema
// ============================================================================

/// How an option consumes the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Present or absent.
    Flag,
    /// Takes one value; the last occurrence wins.
    Value,
    /// Takes one value per occurrence, all kept in order.
    Append,
    /// Takes one unsigned integer value.
    Int,
}

impl OptionKind {
    fn takes_value(self) -> bool {
        !matches!(self, Self::Flag)
    }
}

/// One recognized option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub id: &'static str,
    pub kind: OptionKind,
    pub short: Option<char>,
    pub long: Option<&'static str>,
    pub aliases: Vec<&'static str>,
    pub default: Option<&'static str>,
    pub help: &'static str,
}

impl OptionSpec {
    fn new(id: &'static str, kind: OptionKind, help: &'static str) -> Self {
        Self {
            id,
            kind,
            short: None,
            long: Some(id),
            aliases: Vec::new(),
            default: None,
            help,
        }
    }

    /// A toggle whose long name is `id`.
    pub fn flag(id: &'static str, help: &'static str) -> Self {
        Self::new(id, OptionKind::Flag, help)
    }

    pub fn value(id: &'static str, help: &'static str) -> Self {
        Self::new(id, OptionKind::Value, help)
    }

    pub fn append(id: &'static str, help: &'static str) -> Self {
        Self::new(id, OptionKind::Append, help)
    }

    pub fn int(id: &'static str, help: &'static str) -> Self {
        Self::new(id, OptionKind::Int, help)
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn long(mut self, long: &'static str) -> Self {
        self.long = Some(long);
        self
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    fn matches_long(&self, name: &str) -> bool {
        self.long == Some(name) || self.aliases.contains(&name)
    }

    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.id).help(self.help);
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        if let Some(long) = self.long {
            arg = arg.long(long);
        }
        if !self.aliases.is_empty() {
            arg = arg.visible_aliases(self.aliases.iter().copied());
        }
        arg = match self.kind {
            OptionKind::Flag => arg.action(ArgAction::SetTrue),
            OptionKind::Value => arg.action(ArgAction::Set).allow_hyphen_values(true),
            OptionKind::Append => arg.action(ArgAction::Append).allow_hyphen_values(true),
            OptionKind::Int => arg
                .action(ArgAction::Set)
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i64)),
        };
        if let Some(default) = self.default {
            arg = arg.default_value(default);
        }
        arg
    }
}

/// The options of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSchema {
    pub name: &'static str,
    pub usage: String,
    pub about: &'static str,
    pub options: Vec<OptionSpec>,
    /// Keep unrecognized tokens for the wrapped tool instead of rejecting
    /// them.
    pub pass_through: bool,
}

impl OptionSchema {
    pub fn new(name: &'static str, about: &'static str) -> Self {
        Self {
            name,
            usage: format!("ccm <node> {name} [options]"),
            about,
            options: Vec::new(),
            pass_through: false,
        }
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.push(spec);
        self
    }

    pub fn pass_through(mut self) -> Self {
        self.pass_through = true;
        self
    }

    fn find_long(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.matches_long(name))
    }

    fn find_short(&self, short: char) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.short == Some(short))
    }

    fn command(&self) -> Command {
        Command::new(self.name)
            .no_binary_name(true)
            .disable_version_flag(true)
            .args_override_self(true)
            .about(self.about)
            .override_usage(self.usage.clone())
            .args(self.options.iter().map(OptionSpec::to_arg))
    }

    /// Rendered help text.
    pub fn help(&self) -> String {
        self.command().render_help().to_string()
    }

    /// Parse the tokens of one invocation; `tokens[0]` is the node name.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArguments`] when the node name is missing, a
    /// recognized option is malformed, or unrecognized tokens are given to a
    /// command that does not forward them.
    pub fn parse(&self, tokens: &[String]) -> Result<ParseResult> {
        let (node, rest) = tokens
            .split_first()
            .ok_or_else(|| Error::invalid_arguments("missing node name"))?;
        let split = self.partition(rest);

        if !self.pass_through && !split.unrecognized.is_empty() {
            return Err(Error::invalid_arguments(format!(
                "{}: unrecognized option(s) {}\nusage: {}",
                self.name,
                split.unrecognized.join(" "),
                self.usage
            )));
        }

        let matches = match self.command().try_get_matches_from(&split.recognized) {
            Ok(matches) => matches,
            Err(e) if e.kind() == ErrorKind::DisplayHelp => {
                return Ok(ParseResult::Help(e.render().to_string()));
            }
            Err(e) => {
                return Err(Error::invalid_arguments(
                    e.render().to_string().trim_end().to_string(),
                ));
            }
        };

        let mut positionals = vec![node.clone()];
        positionals.extend(split.positionals);
        Ok(ParseResult::Parsed(ParsedInvocation {
            positionals,
            matches,
            unrecognized: split.unrecognized,
            forwarded: split.forwarded,
        }))
    }

    /// Sort tokens into recognized options, unrecognized options and
    /// positionals, keeping the order of everything that is not recognized.
    fn partition(&self, tokens: &[String]) -> Partition {
        let mut split = Partition::default();
        let mut iter = tokens.iter();

        while let Some(token) = iter.next() {
            if token == "--" {
                for rest in iter.by_ref() {
                    split.positional(rest);
                }
                break;
            }

            if let Some(body) = token.strip_prefix("--") {
                let (name, inline) = match body.split_once('=') {
                    Some((name, _)) => (name, true),
                    None => (body, false),
                };
                if name == "help" {
                    split.recognized.push(token.clone());
                    continue;
                }
                match self.find_long(name) {
                    Some(spec) => {
                        split.recognized.push(token.clone());
                        if spec.kind.takes_value() && !inline {
                            if let Some(value) = iter.next() {
                                split.recognized.push(value.clone());
                            }
                        }
                    }
                    None => split.unrecognized(token),
                }
                continue;
            }

            if let Some(cluster) = token.strip_prefix('-').filter(|c| !c.is_empty()) {
                match self.short_cluster(cluster) {
                    Some(needs_value) => {
                        split.recognized.push(token.clone());
                        if needs_value {
                            if let Some(value) = iter.next() {
                                split.recognized.push(value.clone());
                            }
                        }
                    }
                    None => split.unrecognized(token),
                }
                continue;
            }

            split.positional(token);
        }
        split
    }

    /// Whether every option of a short cluster such as `-vq` or `-kks1` is
    /// known. Returns whether the value of its last option is in the next
    /// token.
    fn short_cluster(&self, cluster: &str) -> Option<bool> {
        for (at, short) in cluster.char_indices() {
            if short == 'h' {
                continue;
            }
            let spec = self.find_short(short)?;
            if spec.kind.takes_value() {
                return Some(at + short.len_utf8() == cluster.len());
            }
        }
        Some(false)
    }
}

#[derive(Default)]
struct Partition {
    recognized: Vec<String>,
    unrecognized: Vec<String>,
    positionals: Vec<String>,
    forwarded: Vec<String>,
}

impl Partition {
    fn unrecognized(&mut self, token: &str) {
        self.unrecognized.push(token.to_string());
        self.forwarded.push(token.to_string());
    }

    fn positional(&mut self, token: &str) {
        self.positionals.push(token.to_string());
        self.forwarded.push(token.to_string());
    }
}

// ============================================================================
// Parse results
// ============================================================================

/// Outcome of parsing one invocation.
#[derive(Debug)]
pub enum ParseResult {
    Parsed(ParsedInvocation),
    /// `-h`/`--help` was given; carries the rendered help.
    Help(String),
}

/// Parsed options and leftover arguments of one invocation.
#[derive(Debug, Clone)]
pub struct ParsedInvocation {
    /// Positional arguments; index 0 is the node name.
    pub positionals: Vec<String>,
    pub matches: ArgMatches,
    /// Unrecognized option tokens, in order.
    pub unrecognized: Vec<String>,
    /// Every token after the node name not consumed by a recognized option,
    /// in order.
    pub forwarded: Vec<String>,
}

impl ParsedInvocation {
    pub fn node(&self) -> &str {
        self.positionals.first().map(String::as_str).unwrap_or_default()
    }

    /// Positional arguments after the node name.
    pub fn args(&self) -> &[String] {
        self.positionals.get(1..).unwrap_or_default()
    }

    pub fn flag(&self, id: &str) -> bool {
        self.matches
            .try_get_one::<bool>(id)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false)
    }

    pub fn value(&self, id: &str) -> Option<String> {
        self.matches.try_get_one::<String>(id).ok().flatten().cloned()
    }

    pub fn values(&self, id: &str) -> Vec<String> {
        self.matches
            .try_get_many::<String>(id)
            .ok()
            .flatten()
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    }

    pub fn int(&self, id: &str) -> Option<i64> {
        self.matches.try_get_one::<i64>(id).ok().flatten().copied()
    }

    /// An integer option that must fit a size or timeout.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArguments`] when the value is negative or larger than
    /// `u32::MAX`.
    pub fn count(&self, id: &str) -> Result<Option<u32>> {
        self.int(id)
            .map(|value| {
                u32::try_from(value).map_err(|_| {
                    Error::invalid_arguments(format!(
                        "invalid value '{value}' for '{id}': expected 0 to {}",
                        u32::MAX
                    ))
                })
            })
            .transpose()
    }

    /// The option among `ids` given last on the command line.
    pub fn last_of<'a>(&self, ids: &[&'a str]) -> Option<&'a str> {
        ids.iter()
            .copied()
            .filter(|id| self.matches.value_source(id) == Some(ValueSource::CommandLine))
            .filter_map(|id| self.matches.index_of(id).map(|at| (at, id)))
            .max_by_key(|(at, _)| *at)
            .map(|(_, id)| id)
    }
}

// ============================================================================
// Tests
// ============================================================================
