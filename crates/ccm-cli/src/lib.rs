//! Command dispatch for `ccm <node> <command>`.
//!
//! Each node command parses its own options, binds its node during
//! validation and performs its work only on execution.
//!
//! # Key Abstractions
//!
//! - [`command::NodeCommand`]: the parse / validate / execute contract
//! - [`registry::Registry`]: the name-keyed command table
//! - [`app::CcmCli`]: wires a cluster store into a [`command::Context`]

pub mod app;
pub mod cli;
pub mod command;
pub mod commands;
pub mod config;
pub mod options;
pub mod registry;
