//! Edits of node configuration files.

use std::path::Path;

use regex::Regex;
use serde_yaml::{Mapping, Value};

use ccm_core::{Error, LogLevel, Result, Settings};

/// Merge `overrides` into `base`. Nested mappings merge key by key; any
/// other value replaces what was there.
pub fn merge_settings(base: &mut Mapping, overrides: &Settings) {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(nested)) => {
                merge_settings(existing, nested);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Apply settings to a YAML file, creating it when missing.
pub fn rewrite_yaml(path: &Path, overrides: &Settings, remove: &[&str]) -> Result<()> {
    let mut doc = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        match serde_yaml::from_str::<Value>(&content)? {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => {
                return Err(Error::invalid_data(format!(
                    "{} is not a YAML mapping",
                    path.display()
                )));
            }
        }
    } else {
        Mapping::new()
    };

    merge_settings(&mut doc, overrides);
    for key in remove {
        doc.remove(*key);
    }
    let content = serde_yaml::to_string(&doc)?;
    std::fs::write(path, content).map_err(|e| Error::io_with_path(e, path))?;
    log::debug!("Rewrote {}", path.display());
    Ok(())
}

/// Settings switching the commit log to batch or periodic sync, and the
/// key that no longer applies.
pub fn commit_log_settings(batch: bool) -> (Settings, &'static str) {
    let mut settings = Settings::new();
    if batch {
        settings.insert("commitlog_sync".into(), "batch".into());
        settings.insert("commitlog_sync_batch_window_in_ms".into(), 2.into());
        (settings, "commitlog_sync_period_in_ms")
    } else {
        settings.insert("commitlog_sync".into(), "periodic".into());
        settings.insert("commitlog_sync_period_in_ms".into(), 10000.into());
        (settings, "commitlog_sync_batch_window_in_ms")
    }
}

/// Set the root level, or one logger's level, in a logback document.
pub fn set_logback_level(xml: &str, level: LogLevel, class: Option<&str>) -> Result<String> {
    let bad_pattern = |e: regex::Error| Error::invalid_data(e.to_string());
    match class {
        None => {
            let root = Regex::new(r#"<root\s+level="[^"]*""#).map_err(bad_pattern)?;
            if !root.is_match(xml) {
                return Err(Error::invalid_data("no <root level=...> element in log config"));
            }
            Ok(root
                .replace(xml, format!(r#"<root level="{level}""#).as_str())
                .into_owned())
        }
        Some(class) => {
            let logger = Regex::new(&format!(
                r#"<logger\s+name="{}"\s+level="[^"]*""#,
                regex::escape(class)
            ))
            .map_err(bad_pattern)?;
            if logger.is_match(xml) {
                return Ok(logger
                    .replace(xml, format!(r#"<logger name="{class}" level="{level}""#).as_str())
                    .into_owned());
            }
            let element = format!("<logger name=\"{class}\" level=\"{level}\"/>\n  ");
            match xml.find("<root") {
                Some(at) => {
                    let mut out = String::with_capacity(xml.len() + element.len());
                    out.push_str(&xml[..at]);
                    out.push_str(&element);
                    out.push_str(&xml[at..]);
                    Ok(out)
                }
                None => Err(Error::invalid_data("no <root> element in log config")),
            }
        }
    }
}

/// Turn `key: value` strings into nested settings.
///
/// Dotted keys nest (`a.b: 1` becomes `{a: {b: 1}}`) and values are parsed
/// as YAML scalars.
pub fn parse_settings<S: AsRef<str>>(items: &[S]) -> Result<Settings> {
    let mut settings = Settings::new();
    for item in items {
        let item = item.as_ref();
        let (key, raw) = item.split_once(':').ok_or_else(|| {
            Error::invalid_arguments(format!("setting should be of the form key: value, got {item}"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::invalid_arguments(format!("empty key in setting {item}")));
        }
        let value: Value = serde_yaml::from_str(raw.trim())
            .map_err(|e| Error::invalid_arguments(format!("invalid value in {item}: {e}")))?;

        let mut nested = value;
        for part in key.rsplit('.') {
            let mut map = Mapping::new();
            map.insert(Value::String(part.to_string()), nested);
            nested = Value::Mapping(map);
        }
        if let Value::Mapping(map) = nested {
            merge_settings(&mut settings, &map);
        }
    }
    Ok(settings)
}

/// Parse literal YAML documents into settings.
pub fn parse_yaml_settings<S: AsRef<str>>(docs: &[S]) -> Result<Settings> {
    let mut settings = Settings::new();
    for doc in docs {
        match serde_yaml::from_str::<Value>(doc.as_ref()) {
            Ok(Value::Mapping(map)) => merge_settings(&mut settings, &map),
            Ok(_) => {
                return Err(Error::invalid_arguments(format!(
                    "expected a YAML mapping, got {}",
                    doc.as_ref()
                )));
            }
            Err(e) => return Err(Error::invalid_arguments(format!("invalid YAML: {e}"))),
        }
    }
    Ok(settings)
}
