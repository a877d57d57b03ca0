//! Column registry: one row per (table, column) pair of every known table.
//!
//! Columns are only discovered for enabled tables. Rows carried over from the
//! previous run keep their column ID and curator rename; the Enabled flag is
//! always taken from the owning table, and rows whose table is unknown to the
//! table registry are switched off.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::config::Settings;
use crate::database_schema::{SchemaError, SchemaSource, SqliteSchema};
use crate::error::Result;
use crate::reconcile::{reconcile, Reconciled, Tally};
use crate::registry_file::{read_rows, require_file, write_rows, RegistryError, RegistryRow};
use crate::report::Report;
use crate::table_registry::{read_table_registry, MIN_LOOKUP_FIELDS};
use crate::types::{parse_flag, ColumnEntry, TableEntry};

/// Table_ID, Table_Name, Column_ID, Enabled, Column_Name, New_Column_Name.
pub const MIN_FIELDS: usize = 6;

pub type ColumnKey = (String, String);

/// What the column merge needs to know about an owning table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub id: u32,
    pub enabled: bool,
}

pub type TableLookup = BTreeMap<String, TableRef>;

pub fn table_lookup(tables: &[TableEntry]) -> TableLookup {
    tables
        .iter()
        .map(|table| {
            (
                table.name.trim().to_string(),
                TableRef {
                    id: table.id,
                    enabled: table.enabled,
                },
            )
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredColumn {
    pub table: TableRef,
    pub table_name: String,
    pub column_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Discovery {
    pub columns: Vec<DiscoveredColumn>,
    /// Enabled tables whose columns were listed.
    pub queried: Vec<String>,
    /// Disabled tables, never queried.
    pub skipped: Vec<String>,
    /// Enabled tables whose columns could not be listed.
    pub failed: Vec<String>,
}

/// Lists the columns of every enabled table. A table that cannot be queried
/// is reported and left out; the others are still processed.
pub async fn discover_columns(
    source: &dyn SchemaSource,
    tables: &[TableEntry],
    report: &mut Report,
) -> Discovery {
    report.step("Fetching column information for tables");

    let mut discovery = Discovery::default();
    for table in tables {
        let name = table.name.trim();
        if !table.enabled {
            discovery.skipped.push(name.to_string());
            continue;
        }

        match source.list_columns(name).await {
            Ok(columns) => {
                report.info(format!(
                    "Retrieved {} columns from table {}",
                    columns.len(),
                    name
                ));
                let table_ref = TableRef {
                    id: table.id,
                    enabled: table.enabled,
                };
                discovery
                    .columns
                    .extend(columns.into_iter().map(|column| DiscoveredColumn {
                        table: table_ref,
                        table_name: name.to_string(),
                        column_name: column.trim().to_string(),
                    }));
                discovery.queried.push(name.to_string());
            }
            Err(error) => {
                report_discovery_failure(&error, report);
                discovery.failed.push(name.to_string());
            }
        }
    }

    report.info(format!(
        "Retrieved {} total columns from all tables",
        discovery.columns.len()
    ));
    discovery
}

fn report_discovery_failure(error: &SchemaError, report: &mut Report) {
    report.warning(error.to_string());
    report.warning_more("Continuing with the remaining tables.");
}

/// Loads the column registry written by a previous run. A repeated
/// (table, column) pair takes the values of its last row.
pub fn read_column_registry(path: &Path, report: &mut Report) -> Result<Vec<ColumnEntry>, RegistryError> {
    let rows = read_rows(path, MIN_FIELDS, report)?;

    let mut slots: HashMap<ColumnKey, usize> = HashMap::new();
    let mut entries: Vec<ColumnEntry> = Vec::with_capacity(rows.len());
    for row in rows {
        let entry = parse_row(&row, report);
        if entry.table_name.is_empty() || entry.column_name.is_empty() {
            report.warning(format!("Row {} has no table or column name. Skipping.", row.line));
            continue;
        }
        match slots.get(&entry.key()) {
            Some(&slot) => {
                report.warning(format!(
                    "Row {} repeats column '{}' of table '{}'. It replaces the earlier entry.",
                    row.line, entry.column_name, entry.table_name
                ));
                entries[slot] = entry;
            }
            None => {
                slots.insert(entry.key(), entries.len());
                entries.push(entry);
            }
        }
    }
    Ok(entries)
}

fn parse_row(row: &RegistryRow, report: &mut Report) -> ColumnEntry {
    let table_id = row.field(0).parse::<u32>().unwrap_or_else(|_| {
        report.warning(format!(
            "Row {} has an unreadable Table_ID '{}'; using 0.",
            row.line,
            row.field(0)
        ));
        0
    });

    let column_id = match row.field(2) {
        "" => None,
        raw => match raw.parse::<u32>() {
            Ok(id) if id > 0 => Some(id),
            _ => {
                report.warning(format!(
                    "Row {} has an unreadable Column_ID '{}'; a new one will be assigned.",
                    row.line, raw
                ));
                None
            }
        },
    };

    let enabled = parse_flag(row.field(3)).unwrap_or_else(|| {
        report.warning(format!(
            "Row {} has Enabled value '{}'; treating it as 0.",
            row.line,
            row.field(3)
        ));
        false
    });

    ColumnEntry {
        table_id,
        table_name: row.field(1).to_string(),
        column_id,
        enabled,
        column_name: row.field(4).to_string(),
        new_column_name: row.field(5).to_string(),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMerge {
    /// Sorted by (table name, column name), every entry with an ID.
    pub entries: Vec<ColumnEntry>,
    pub tally: Tally<ColumnKey>,
    /// Orphaned rows whose table is missing from the table registry.
    pub unknown_table: Vec<ColumnKey>,
    pub assigned_ids: usize,
}

pub fn merge_columns(
    tables: &TableLookup,
    discovered: Vec<DiscoveredColumn>,
    prior: Vec<ColumnEntry>,
) -> ColumnMerge {
    let prior: BTreeMap<ColumnKey, ColumnEntry> = prior
        .into_iter()
        .map(|entry| {
            let key = (
                entry.table_name.trim().to_string(),
                entry.column_name.trim().to_string(),
            );
            (key, entry)
        })
        .collect();
    let live: BTreeMap<ColumnKey, TableRef> = discovered
        .into_iter()
        .map(|column| ((column.table_name, column.column_name), column.table))
        .collect();

    let mut merge = ColumnMerge::default();
    for outcome in reconcile(prior, live) {
        merge.tally.record(&outcome);
        let entry = match outcome {
            Reconciled::Retained { key, prior, live } => ColumnEntry {
                table_id: live.id,
                table_name: key.0,
                column_id: prior.column_id,
                enabled: live.enabled,
                column_name: key.1,
                new_column_name: prior.new_column_name,
            },
            Reconciled::Added { key, live } => {
                ColumnEntry::discovered(live.id, key.0, key.1, live.enabled)
            }
            Reconciled::Orphaned { key, prior } => {
                let enabled = match tables.get(&key.0) {
                    Some(table) => table.enabled,
                    None => {
                        merge.unknown_table.push(key.clone());
                        false
                    }
                };
                ColumnEntry {
                    table_name: key.0,
                    column_name: key.1,
                    enabled,
                    ..prior
                }
            }
        };
        merge.entries.push(entry);
    }

    merge.assigned_ids = assign_column_ids(&mut merge.entries);
    merge
}

/// Gives every entry without a column ID the lowest positive number not yet
/// used, walking in slice order. Existing IDs are never changed.
pub fn assign_column_ids(entries: &mut [ColumnEntry]) -> usize {
    let mut used: BTreeSet<u32> = entries.iter().filter_map(|e| e.column_id).collect();
    let mut candidate = 1;
    let mut assigned = 0;

    for entry in entries.iter_mut().filter(|e| e.column_id.is_none()) {
        while used.contains(&candidate) {
            candidate += 1;
        }
        entry.column_id = Some(candidate);
        used.insert(candidate);
        assigned += 1;
    }
    assigned
}

pub fn write_column_registry(path: &Path, entries: &[ColumnEntry]) -> Result<(), RegistryError> {
    write_rows(
        path,
        &ColumnEntry::HEADER,
        entries.iter().map(ColumnEntry::to_record),
    )
}

/// Runs the column stage end to end.
pub async fn run(settings: &Settings, report: &mut Report) -> Result<ColumnMerge> {
    report.section("Build column registry from source database");

    let table_path = settings.table_registry_path();
    let db_path = settings.source_db_path();
    require_file(&table_path)?;
    if !db_path.is_file() {
        return Err(SchemaError::DatabaseMissing(db_path).into());
    }

    report.step("Reading table names from table registry");
    let tables = read_table_registry(&table_path, MIN_LOOKUP_FIELDS, report)?;
    let enabled = tables.iter().filter(|t| t.enabled).count();
    report.info(format!("Read {} enabled table names from table registry", enabled));

    let schema = SqliteSchema::connect(&db_path).await?;
    let discovery = discover_columns(&schema, &tables, report).await;
    schema.close().await;

    let column_path = settings.column_registry_path();
    let prior = if column_path.is_file() {
        report.step("Reading existing column registry for merging");
        let prior = read_column_registry(&column_path, report)?;
        report.info(format!("Read {} columns from existing column registry", prior.len()));
        prior
    } else {
        Vec::new()
    };

    let merge = merge_columns(&table_lookup(&tables), discovery.columns.clone(), prior);

    report.step("Writing column registry");
    write_column_registry(&column_path, &merge.entries)?;
    summarize(&merge, &discovery, settings, report);
    Ok(merge)
}

fn summarize(merge: &ColumnMerge, discovery: &Discovery, settings: &Settings, report: &mut Report) {
    report.info(format!(
        "Wrote {} column entries to '{}'",
        merge.entries.len(),
        settings.column_registry_file
    ));
    report.info(format!(
        "Processed {} tables with {} columns",
        discovery.queried.len(),
        discovery.columns.len()
    ));

    if !discovery.skipped.is_empty() {
        report.info(format!("Skipped {} disabled tables:", discovery.skipped.len()));
        let mut skipped = discovery.skipped.clone();
        skipped.sort();
        skipped.iter().for_each(|name| report.detail(name));
    }
    if !discovery.failed.is_empty() {
        report.info(format!(
            "Could not read columns for {} tables:",
            discovery.failed.len()
        ));
        discovery.failed.iter().for_each(|name| report.detail(name));
    }

    let tally = &merge.tally;
    if !tally.added.is_empty() {
        report.info(format!("Added {} new columns:", tally.added.len()));
        for (table, column) in &tally.added {
            report.detail(format!("{}.{}", table, column));
        }
    }
    if !tally.removed.is_empty() {
        report.info(format!(
            "{} columns were not found in the database and were carried over:",
            tally.removed.len()
        ));
        for key in &tally.removed {
            let note = if merge.unknown_table.contains(key) {
                " (table unknown, disabled)"
            } else {
                ""
            };
            report.detail(format!("{}.{}{}", key.0, key.1, note));
        }
    }
    report.info(format!("Retained {} existing columns", tally.retained.len()));
    if merge.assigned_ids > 0 {
        report.info(format!("Assigned {} new column IDs", merge.assigned_ids));
    }
}
