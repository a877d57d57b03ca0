//! Table registry: one row per user table, with curator flags and a stable ID.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::config::{OrphanPolicy, Settings};
use crate::database_schema::{SchemaSource, SqliteSchema};
use crate::error::Result;
use crate::reconcile::{reconcile, Reconciled, Tally};
use crate::registry_file::{read_rows, write_rows, RegistryError, RegistryRow};
use crate::report::Report;
use crate::types::{parse_flag, TableEntry};

/// ID, name, Enabled, Event, Series.
pub const MIN_FIELDS: usize = 5;
/// Readers that only need ID, name and Enabled.
pub const MIN_LOOKUP_FIELDS: usize = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableMerge {
    /// Sorted by table name.
    pub entries: Vec<TableEntry>,
    pub tally: Tally<String>,
}

/// Loads the registry written by a previous run. Flags beyond `min_fields`
/// that are absent default to off; a repeated name takes the values of its
/// last row, at the position of its first.
pub fn read_table_registry(
    path: &Path,
    min_fields: usize,
    report: &mut Report,
) -> Result<Vec<TableEntry>, RegistryError> {
    let rows = read_rows(path, min_fields, report)?;

    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<TableEntry> = Vec::with_capacity(rows.len());
    for row in rows {
        let entry = parse_row(&row, report);
        if entry.name.is_empty() {
            report.warning(format!("Row {} has no table name. Skipping.", row.line));
            continue;
        }
        match slots.get(&entry.name) {
            Some(&slot) => {
                report.warning(format!(
                    "Row {} repeats table '{}'. It replaces the earlier entry.",
                    row.line, entry.name
                ));
                entries[slot] = entry;
            }
            None => {
                slots.insert(entry.name.clone(), entries.len());
                entries.push(entry);
            }
        }
    }
    Ok(entries)
}

fn parse_row(row: &RegistryRow, report: &mut Report) -> TableEntry {
    let id = match row.field(0).parse::<u32>() {
        Ok(id) => id,
        Err(_) => {
            report.warning(format!(
                "Row {} has an unreadable ID '{}'; using 0.",
                row.line,
                row.field(0)
            ));
            0
        }
    };

    let mut read_flag = |index: usize, name: &str| -> bool {
        if index >= row.fields.len() {
            return false;
        }
        let raw = row.field(index);
        parse_flag(raw).unwrap_or_else(|| {
            report.warning(format!(
                "Row {} has {} value '{}'; treating it as 0.",
                row.line, name, raw
            ));
            false
        })
    };

    TableEntry {
        id,
        name: row.field(1).to_string(),
        enabled: read_flag(2, "Enabled"),
        event: read_flag(3, "Event"),
        series: read_flag(4, "Series"),
    }
}

/// Reconciles the previous registry with the table names now in the database.
///
/// Existing rows keep their ID and flags untouched. New tables get
/// `max(existing ids) + 1` onwards in name order. Rows for tables that left
/// the database are reported as removed and either kept disabled or dropped,
/// per `orphans`. Fails if a new table needs an ID past `u32::MAX`.
pub fn merge_tables<I, S>(
    prior: Vec<TableEntry>,
    discovered: I,
    orphans: OrphanPolicy,
) -> Result<TableMerge, RegistryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut highest = prior.iter().map(|entry| entry.id).max().unwrap_or(0);

    let prior: BTreeMap<String, TableEntry> = prior
        .into_iter()
        .map(|entry| (entry.name.trim().to_string(), entry))
        .collect();
    let live: BTreeMap<String, ()> = discovered
        .into_iter()
        .map(|name| name.as_ref().trim().to_string())
        .filter(|name| !name.is_empty())
        .map(|name| (name, ()))
        .collect();

    let mut merge = TableMerge::default();
    for outcome in reconcile(prior, live) {
        merge.tally.record(&outcome);
        match outcome {
            Reconciled::Retained { key, prior, .. } => {
                merge.entries.push(TableEntry { name: key, ..prior });
            }
            Reconciled::Added { key, .. } => {
                let id = highest
                    .checked_add(1)
                    .ok_or_else(|| RegistryError::TableIdsExhausted {
                        highest,
                        table: key.clone(),
                    })?;
                merge.entries.push(TableEntry::discovered(id, key));
                highest = id;
            }
            Reconciled::Orphaned { key, prior } => {
                if orphans == OrphanPolicy::Retain {
                    merge.entries.push(TableEntry {
                        name: key,
                        enabled: false,
                        ..prior
                    });
                }
            }
        }
    }
    Ok(merge)
}

pub async fn discover_tables(
    source: &dyn SchemaSource,
    report: &mut Report,
) -> Result<Vec<String>> {
    report.step("Fetching table names");
    let tables = source.list_tables().await?;
    report.info(format!("Retrieved {} user tables from database", tables.len()));
    Ok(tables)
}

pub fn write_table_registry(path: &Path, entries: &[TableEntry]) -> Result<(), RegistryError> {
    write_rows(
        path,
        &TableEntry::HEADER,
        entries.iter().map(TableEntry::to_record),
    )
}

/// Runs the table stage end to end: read, discover, merge, write, summarize.
pub async fn run(settings: &Settings, report: &mut Report) -> Result<TableMerge> {
    report.section("Build table registry from source database");

    let path = settings.table_registry_path();
    let prior = if path.is_file() {
        report.info(format!(
            "Table registry already exists at '{}'. Will merge with database information.",
            path.display()
        ));
        let prior = read_table_registry(&path, MIN_FIELDS, report)?;
        report.info(format!("Read {} table entries from existing registry", prior.len()));
        prior
    } else {
        report.info(format!("No existing table registry found at '{}'.", path.display()));
        Vec::new()
    };

    let schema = SqliteSchema::connect(&settings.source_db_path()).await?;
    let discovered = discover_tables(&schema, report).await;
    schema.close().await;
    let discovered = discovered?;

    let merge = merge_tables(prior, discovered, settings.tables.orphans)?;

    report.step("Writing table registry");
    write_table_registry(&path, &merge.entries)?;
    summarize(&merge, settings, report);
    Ok(merge)
}

fn summarize(merge: &TableMerge, settings: &Settings, report: &mut Report) {
    report.info(format!(
        "Wrote {} table entries to '{}'",
        merge.entries.len(),
        settings.table_registry_file
    ));

    let tally = &merge.tally;
    if !tally.added.is_empty() {
        report.info(format!("Added {} new tables:", tally.added.len()));
        tally.added.iter().for_each(|name| report.detail(name));
    }
    if !tally.removed.is_empty() {
        let action = match settings.tables.orphans {
            OrphanPolicy::Retain => "kept disabled",
            OrphanPolicy::Drop => "dropped",
        };
        report.info(format!(
            "Removed {} tables not found in database ({}):",
            tally.removed.len(),
            action
        ));
        tally.removed.iter().for_each(|name| report.detail(name));
    }
    report.info(format!("Retained {} existing tables", tally.retained.len()));
}
