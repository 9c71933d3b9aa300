//! Typed values handed to the installation collaborator.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Server configuration overrides, keyed by (possibly nested) setting name.
pub type Settings = serde_yaml::Mapping;

/// Server log levels accepted by `setlog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "OFF" => Ok(Self::Off),
            _ => Err(Error::invalid_arguments(format!(
                "Unknown log level {s} (use one of TRACE, DEBUG, INFO, WARN, ERROR, OFF)"
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Off => "OFF",
        };
        f.write_str(s)
    }
}

/// DSE workloads accepted by `setworkload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    Cassandra,
    Solr,
    Hadoop,
    Spark,
    Dsefs,
    Cfs,
    Graph,
}

impl Workload {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cassandra => "cassandra",
            Self::Solr => "solr",
            Self::Hadoop => "hadoop",
            Self::Spark => "spark",
            Self::Dsefs => "dsefs",
            Self::Cfs => "cfs",
            Self::Graph => "graph",
        }
    }
}

impl FromStr for Workload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cassandra" => Ok(Self::Cassandra),
            "solr" => Ok(Self::Solr),
            "hadoop" => Ok(Self::Hadoop),
            "spark" => Ok(Self::Spark),
            "dsefs" => Ok(Self::Dsefs),
            "cfs" => Ok(Self::Cfs),
            "graph" => Ok(Self::Graph),
            _ => Err(Error::invalid_arguments(format!(
                "{s} is not a valid workload"
            ))),
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_case_insensitive() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::Info.to_string(), "INFO");
    }

    #[test]
    fn test_log_level_unknown() {
        let err = "LOUD".parse::<LogLevel>().unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }

    #[test]
    fn test_workload_parse() {
        assert_eq!("spark".parse::<Workload>().unwrap(), Workload::Spark);
        assert!("Spark".parse::<Workload>().is_err());
        assert!("mesos".parse::<Workload>().is_err());
        assert_eq!(Workload::Dsefs.to_string(), "dsefs");
    }
}
