//! Table selection algebra.
//!
//! Three overlapping lists drive a dump:
//! - `tables`: an explicit whitelist. When non-empty it *is* the data dump.
//! - `skip`: tables left out of the backup entirely.
//! - `structure`: tables whose DDL is kept but whose rows are not dumped.
//!
//! Without a whitelist the data dump covers `all - (skip ∪ structure)`.
//! Structure-only tables are always excluded from the data dump.
//!
//! Names may contain `*` wildcards, expanded against the database's own table
//! list. Lists may also be pulled from named table sets in the configuration.

use crate::error::{DumperError, Result};
use crate::tables::TableLister;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Configured table lists, possibly containing wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSelection {
    /// Explicit whitelist; overrides `skip` and `structure` for the data dump
    pub tables: Vec<String>,
    /// Tables excluded from the backup
    pub skip: Vec<String>,
    /// Tables backed up as schema only
    pub structure: Vec<String>,
}

/// Keys into the configured named table sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSetKeys {
    /// Named set merged into `tables`
    pub tables_key: Option<String>,
    /// Named set merged into `skip`
    pub skip_tables_key: Option<String>,
    /// Named set merged into `structure`
    pub structure_tables_key: Option<String>,
}

impl TableSelection {
    /// Builder method to set the whitelist.
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the skip list.
    pub fn with_skip<I, S>(mut self, skip: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip = skip.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the structure-only list.
    pub fn with_structure<I, S>(mut self, structure: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.structure = structure.into_iter().map(Into::into).collect();
        self
    }

    /// Merges the named sets referenced by `keys` into the explicit lists.
    ///
    /// # Errors
    /// Returns a configuration error naming the first key that is not defined
    /// in `sets`.
    pub fn merge_named_sets(
        mut self,
        sets: &BTreeMap<String, Vec<String>>,
        keys: &TableSetKeys,
    ) -> Result<Self> {
        let lookup = |key: &Option<String>| -> Result<Vec<String>> {
            match key {
                None => Ok(Vec::new()),
                Some(name) => sets.get(name).cloned().ok_or_else(|| {
                    DumperError::configuration(format!("Unknown table set '{name}'"))
                }),
            }
        };

        self.tables.extend(lookup(&keys.tables_key)?);
        self.skip.extend(lookup(&keys.skip_tables_key)?);
        self.structure.extend(lookup(&keys.structure_tables_key)?);
        Ok(self)
    }

    /// Whether any list contains a wildcard.
    pub fn has_wildcards(&self) -> bool {
        self.tables
            .iter()
            .chain(&self.skip)
            .chain(&self.structure)
            .any(|name| name.contains('*'))
    }
}

/// Outcome of table selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTables {
    /// Tables passed to the parallel dump (`--tables-list`)
    pub dump: Vec<String>,
    /// Tables whose schema is extracted separately
    pub structure: Vec<String>,
    /// Whether `dump` came from an explicit whitelist
    pub explicit: bool,
}

/// Partitions a [`TableSelection`] into the effective dump set and the
/// structure-only set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableSelector;

impl TableSelector {
    /// Whether resolving `selection` requires the database's table list.
    pub fn needs_listing(selection: &TableSelection) -> bool {
        selection.tables.is_empty() || selection.has_wildcards()
    }

    /// Resolves `selection` against the full table list of the database.
    ///
    /// Output order follows `all_tables` for derived sets and configuration
    /// order for explicit names; duplicates are dropped.
    ///
    /// # Errors
    /// Returns a configuration error if a wildcard name cannot be compiled
    /// into a matcher.
    pub fn resolve(selection: &TableSelection, all_tables: &[String]) -> Result<ResolvedTables> {
        let tables = expand(&selection.tables, all_tables)?;
        let structure = expand(&selection.structure, all_tables)?;

        if !tables.is_empty() {
            return Ok(ResolvedTables {
                dump: tables,
                structure,
                explicit: true,
            });
        }

        let skip = expand(&selection.skip, all_tables)?;
        let excluded: HashSet<&str> = skip
            .iter()
            .chain(&structure)
            .map(String::as_str)
            .collect();

        let mut seen = HashSet::new();
        let dump = all_tables
            .iter()
            .filter(|table| !excluded.contains(table.as_str()) && seen.insert(*table))
            .cloned()
            .collect();

        Ok(ResolvedTables {
            dump,
            structure,
            explicit: false,
        })
    }

    /// Resolves `selection`, consulting `lister` only when needed.
    ///
    /// # Errors
    /// Propagates failures of the table lister and of [`resolve`](Self::resolve).
    pub async fn resolve_with(
        selection: &TableSelection,
        database: &str,
        lister: &dyn TableLister,
    ) -> Result<ResolvedTables> {
        let all_tables = if Self::needs_listing(selection) {
            lister.list_tables(database).await?
        } else {
            Vec::new()
        };
        Self::resolve(selection, &all_tables)
    }
}

/// Expands wildcard names against `all_tables`, keeping literal names
/// verbatim, without duplicates.
fn expand(names: &[String], all_tables: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut expanded = Vec::new();
    for name in names {
        if name.contains('*') {
            let pattern = wildcard_regex(name)?;
            for table in all_tables.iter().filter(|t| pattern.is_match(t)) {
                if seen.insert(table.clone()) {
                    expanded.push(table.clone());
                }
            }
        } else if seen.insert(name.clone()) {
            expanded.push(name.clone());
        }
    }
    Ok(expanded)
}

/// Compiles a table name where `*` matches any run of characters (including
/// none) into an anchored regex. Everything else matches literally.
fn wildcard_regex(name: &str) -> Result<Regex> {
    let pattern = format!("^{}$", regex::escape(name).replace(r"\*", ".*"));
    Regex::new(&pattern).map_err(|e| {
        DumperError::configuration(format!("Invalid table name pattern '{name}': {e}"))
    })
}
