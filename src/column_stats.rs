//! Frequency and completeness statistics over the column registry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::column_registry::MIN_FIELDS;
use crate::config::{Settings, StatsSettings};
use crate::error::Result;
use crate::registry_file::{read_rows, RegistryError};
use crate::report::Report;

const NAME_WIDTH: usize = 50;
const COUNT_WIDTH: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameFrequency {
    pub name: String,
    /// One per registry row, so a name shared by two tables counts twice.
    pub count: usize,
    pub tables: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingEssentials {
    pub table: String,
    pub missing: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnStatistics {
    total_rows: usize,
    // first-encounter order
    frequencies: Vec<NameFrequency>,
    index: HashMap<String, usize>,
    table_columns: BTreeMap<String, BTreeSet<String>>,
}

impl ColumnStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, table_name: &str, column_name: &str, new_column_name: &str) {
        self.total_rows += 1;

        self.table_columns
            .entry(table_name.to_string())
            .or_default()
            .insert(column_name.to_string());

        let slot = match self.index.get(new_column_name) {
            Some(&slot) => slot,
            None => {
                self.frequencies.push(NameFrequency {
                    name: new_column_name.to_string(),
                    count: 0,
                    tables: BTreeSet::new(),
                });
                let slot = self.frequencies.len() - 1;
                self.index.insert(new_column_name.to_string(), slot);
                slot
            }
        };
        let frequency = &mut self.frequencies[slot];
        frequency.count += 1;
        frequency.tables.insert(table_name.to_string());
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn distinct_names(&self) -> usize {
        self.frequencies.len()
    }

    pub fn distinct_tables(&self) -> usize {
        self.table_columns.len()
    }

    /// Most frequent first; equal counts stay in first-encounter order.
    pub fn by_frequency(&self) -> Vec<&NameFrequency> {
        let mut sorted: Vec<&NameFrequency> = self.frequencies.iter().collect();
        sorted.sort_by(|a, b| b.count.cmp(&a.count));
        sorted
    }

    /// Tables lacking any of `essential` among their raw column names, by table name.
    pub fn missing_essentials(&self, essential: &[String]) -> Vec<MissingEssentials> {
        self.table_columns
            .iter()
            .filter_map(|(table, columns)| {
                let missing: Vec<String> = essential
                    .iter()
                    .filter(|name| !columns.contains(name.as_str()))
                    .cloned()
                    .collect();
                (!missing.is_empty()).then(|| MissingEssentials {
                    table: table.clone(),
                    missing,
                })
            })
            .collect()
    }
}

pub fn read_statistics(path: &Path, report: &mut Report) -> Result<ColumnStatistics, RegistryError> {
    report.step("Reading column registry");

    let mut statistics = ColumnStatistics::new();
    for row in read_rows(path, MIN_FIELDS, report)? {
        statistics.record(row.field(1), row.field(4), row.field(5));
    }

    report.info(format!("Processed {} total columns", statistics.total_rows()));
    report.info(format!("Found {} unique column names", statistics.distinct_names()));
    report.info(format!("Found {} distinct tables", statistics.distinct_tables()));
    Ok(statistics)
}

pub fn report_frequencies(statistics: &ColumnStatistics, settings: &StatsSettings, report: &mut Report) {
    report.step("Column Name Frequency (Sorted by Count)");
    report.info(format!(
        "{:<name$} | {:<count$}",
        "Column Name",
        "Count",
        name = NAME_WIDTH,
        count = COUNT_WIDTH
    ));
    report.info("-".repeat(NAME_WIDTH + COUNT_WIDTH + 3));

    for frequency in statistics.by_frequency() {
        report.info(format!(
            "{:<name$} | {:<count$}",
            frequency.name,
            frequency.count,
            name = NAME_WIDTH,
            count = COUNT_WIDTH
        ));
        if frequency.count <= settings.low_frequency_threshold {
            let tables: Vec<&str> = frequency.tables.iter().map(String::as_str).collect();
            report.detail(format!("Found in tables: {}", tables.join(", ")));
        }
    }
}

pub fn report_missing_essentials(
    statistics: &ColumnStatistics,
    settings: &StatsSettings,
    report: &mut Report,
) -> Vec<MissingEssentials> {
    let essential = settings.essential_columns.join(", ");
    report.step(format!("Tables Missing Essential Columns ({})", essential));

    let missing = statistics.missing_essentials(&settings.essential_columns);
    if missing.is_empty() {
        report.info(format!("All tables contain the essential columns ({})", essential));
    } else {
        report.info(format!("Found {} tables missing essential columns:", missing.len()));
        for table in &missing {
            report.detail(format!(
                "Table: '{}' - Missing: {}",
                table.table,
                table.missing.join(", ")
            ));
        }
    }
    missing
}

pub fn run(settings: &Settings, report: &mut Report) -> Result<ColumnStatistics> {
    report.section("Column Name Statistics");

    let statistics = read_statistics(&settings.column_registry_path(), report)?;
    report_frequencies(&statistics, &settings.stats, report);
    report_missing_essentials(&statistics, &settings.stats, report);
    Ok(statistics)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn essentials() -> Vec<String> {
        vec!["Date".to_string(), "Title".to_string(), "Text".to_string()]
    }

    #[test]
    fn test_missing_essentials_lists_names_in_essential_order() {
        let mut statistics = ColumnStatistics::new();
        statistics.record("Speakers", "ID", "ID");
        statistics.record("Speakers", "Title", "Title");
        statistics.record("Sermons", "Date", "Date");
        statistics.record("Sermons", "Title", "Title");
        statistics.record("Sermons", "Text", "Body");

        assert_eq!(
            statistics.missing_essentials(&essentials()),
            vec![MissingEssentials {
                table: "Speakers".to_string(),
                missing: vec!["Date".to_string(), "Text".to_string()],
            }]
        );
    }

    #[test]
    fn test_frequency_counts_every_occurrence_and_keeps_tie_order() {
        let mut statistics = ColumnStatistics::new();
        statistics.record("A", "When", "Date");
        statistics.record("A", "Name", "Title");
        statistics.record("B", "Day", "Date");
        statistics.record("B", "Heading", "Title");
        statistics.record("B", "Notes", "Notes");
        statistics.record("C", "Dated", "Date");
        statistics.record("C", "Dated2", "Date");

        let ranked: Vec<(&str, usize)> = statistics
            .by_frequency()
            .iter()
            .map(|f| (f.name.as_str(), f.count))
            .collect();
        assert_eq!(ranked, vec![("Date", 4), ("Title", 2), ("Notes", 1)]);

        let date = statistics.by_frequency()[0].clone();
        assert_eq!(
            date.tables.into_iter().collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );
        assert_eq!(statistics.total_rows(), 7);
        assert_eq!(statistics.distinct_tables(), 3);
    }

    #[test]
    fn test_ties_keep_first_encounter_order() {
        let mut statistics = ColumnStatistics::new();
        for name in ["Zulu", "Alpha", "Mike"] {
            statistics.record("T", name, name);
        }

        let names: Vec<&str> = statistics
            .by_frequency()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Zulu", "Alpha", "Mike"]);
    }

    #[test]
    fn test_report_lists_tables_for_rare_names_only() {
        let mut statistics = ColumnStatistics::new();
        for table in ["A", "B", "C"] {
            statistics.record(table, "Date", "Date");
        }
        statistics.record("A", "Odd", "Odd");
        let settings = StatsSettings {
            low_frequency_threshold: 1,
            essential_columns: essentials(),
        };

        let mut report = Report::new();
        report_frequencies(&statistics, &settings, &mut report);

        let details: Vec<&String> = report
            .transcript()
            .iter()
            .filter(|line| line.contains("Found in tables"))
            .collect();
        assert_eq!(details, vec!["    -    Found in tables: A"]);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("columns.tsv");
        fs::write(
            &path,
            "Table_ID\tTable_Name\tColumn_ID\tEnabled\tColumn_Name\tNew_Column_Name\n\
             1\tSermons\t1\t1\tDate\tDate\n\
             1\tSermons\t2\n\
             2\tSpeakers\t3\t1\tTitle\tTitle\n",
        )
        .unwrap();

        let mut report = Report::new();
        let statistics = read_statistics(&path, &mut report).unwrap();

        assert_eq!(statistics.total_rows(), 2);
        assert_eq!(statistics.distinct_names(), 2);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.error_count(), 0);
    }
}
