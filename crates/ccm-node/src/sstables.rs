//! Sstable selection and discovery.

use std::path::{Path, PathBuf};

use glob::Pattern;

use ccm_core::{Error, NodeHandle, Result};

/// Keyspace, tables and data files an sstable command operates on.
///
/// Filters narrow from left to right: tables require a keyspace and
/// explicit data files require tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SstableSelection {
    keyspace: Option<String>,
    tables: Vec<String>,
    datafiles: Vec<String>,
}

impl SstableSelection {
    /// Build a selection, checking filter dependencies.
    ///
    /// `table_flag` names the option used for tables in diagnostics.
    ///
    /// # Errors
    ///
    /// [`Error::MissingDependency`] if tables are given without a keyspace or
    /// data files without tables.
    pub fn new(
        keyspace: Option<String>,
        tables: Vec<String>,
        datafiles: Vec<String>,
        table_flag: &str,
    ) -> Result<Self> {
        if !tables.is_empty() && keyspace.is_none() {
            return Err(Error::missing_dependency(
                "You need a keyspace (option -k) if you specify tables",
            ));
        }
        if !datafiles.is_empty() && tables.is_empty() {
            return Err(Error::missing_dependency(format!(
                "You need tables (option {table_flag}) if you specify datafiles"
            )));
        }
        Ok(Self {
            keyspace,
            tables,
            datafiles,
        })
    }

    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn datafiles(&self) -> &[String] {
        &self.datafiles
    }

    /// Data files of the node matching this selection, sorted.
    ///
    /// Explicit data files are matched by file name against the selected
    /// tables' sstables; absolute paths are taken as given.
    pub fn locate(&self, node: &NodeHandle) -> Result<Vec<PathBuf>> {
        let found = discover(&node.data_dir(), self.keyspace(), &self.tables)?;
        if self.datafiles.is_empty() {
            return Ok(found);
        }

        let mut selected = Vec::with_capacity(self.datafiles.len());
        for datafile in &self.datafiles {
            let path = Path::new(datafile);
            if path.is_absolute() {
                selected.push(path.to_path_buf());
                continue;
            }
            let matched = found
                .iter()
                .find(|p| p.file_name().is_some_and(|n| n == path.as_os_str()))
                .ok_or_else(|| {
                    Error::invalid_arguments(format!(
                        "no sstable named {datafile} in the selected tables"
                    ))
                })?;
            selected.push(matched.clone());
        }
        Ok(selected)
    }
}

/// Split a comma-separated option value, dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sstable data files under a node data directory.
///
/// Table directories are `<table>-<id>` on current servers and plain
/// `<table>` on old ones; both layouts are searched.
pub fn discover(data_dir: &Path, keyspace: Option<&str>, tables: &[String]) -> Result<Vec<PathBuf>> {
    let root = Pattern::escape(&data_dir.to_string_lossy());
    let ks = keyspace.map_or_else(|| "*".to_string(), Pattern::escape);

    let mut patterns = Vec::new();
    if tables.is_empty() {
        patterns.push(format!("{root}/{ks}/*/*-Data.db"));
    } else {
        for table in tables {
            let table = Pattern::escape(table);
            patterns.push(format!("{root}/{ks}/{table}-*/*-Data.db"));
            patterns.push(format!("{root}/{ks}/{table}/*-Data.db"));
        }
    }

    let mut files = Vec::new();
    for pattern in patterns {
        let paths = glob::glob(&pattern)
            .map_err(|e| Error::invalid_data(format!("bad sstable pattern {pattern}: {e}")))?;
        files.extend(paths.filter_map(|entry| entry.ok()));
    }
    files.sort();
    files.dedup();
    Ok(files)
}
