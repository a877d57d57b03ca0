use std::fs;
use std::path::Path;

use schema_registry_builder::{
    column_registry, column_stats,
    config::Settings,
    database_schema::SchemaError,
    registry_file::RegistryError,
    report::Report,
    table_registry,
    workflow::{self, Stage},
    Error,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

async fn execute(path: &Path, statements: &[&str]) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    for statement in statements {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
}

fn settings_for(dir: &Path) -> Settings {
    Settings {
        data_dir: dir.to_path_buf(),
        source_db_file: "library.sqlite".to_string(),
        ..Settings::default()
    }
}

fn rows(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

fn find<'a>(rows: &'a [Vec<String>], table: &str, column: &str) -> &'a Vec<String> {
    rows.iter()
        .find(|row| row[1] == table && row[4] == column)
        .unwrap_or_else(|| panic!("no row for {}.{}", table, column))
}

#[tokio::test]
async fn test_registries_follow_schema_and_curator_edits() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(dir.path());
    execute(
        &settings.source_db_path(),
        &[
            "CREATE TABLE Sermons (ID INTEGER PRIMARY KEY, Date TEXT, Title TEXT, Text TEXT)",
            "CREATE TABLE Speakers (ID INTEGER PRIMARY KEY, Name TEXT)",
        ],
    )
    .await;

    // First run: everything is new
    let mut report = Report::new();
    table_registry::run(&settings, &mut report).await.unwrap();
    column_registry::run(&settings, &mut report).await.unwrap();
    assert!(report.succeeded());

    let table_path = settings.table_registry_path();
    let column_path = settings.column_registry_path();
    assert_eq!(
        fs::read_to_string(&table_path).unwrap(),
        "ID\tTable Name\tEnabled\tEvent\tSeries\n1\tSermons\t1\t0\t0\n2\tSpeakers\t1\t0\t0\n"
    );
    let columns = rows(&column_path);
    assert_eq!(
        columns,
        vec![
            vec!["1", "Sermons", "1", "1", "Date", "Date"],
            vec!["1", "Sermons", "2", "1", "ID", "ID"],
            vec!["1", "Sermons", "3", "1", "Text", "Text"],
            vec!["1", "Sermons", "4", "1", "Title", "Title"],
            vec!["2", "Speakers", "5", "1", "ID", "ID"],
            vec!["2", "Speakers", "6", "1", "Name", "Name"],
        ]
    );

    // Curator disables Speakers, renames Sermons.Date and leaves a stray row behind
    fs::write(
        &table_path,
        "ID\tTable Name\tEnabled\tEvent\tSeries\n1\tSermons\t1\t1\t0\n2\tSpeakers\t0\t0\t0\n",
    )
    .unwrap();
    let edited = fs::read_to_string(&column_path)
        .unwrap()
        .replace("Sermons\t1\t1\tDate\tDate", "Sermons\t1\t1\tDate\tSermonDate")
        + "9\tOldTable\t7\t1\tNotes\tNotes\n";
    fs::write(&column_path, edited).unwrap();

    // Schema moves on: a new table and a new column
    execute(
        &settings.source_db_path(),
        &[
            "CREATE TABLE Series (ID INTEGER PRIMARY KEY, Year INTEGER)",
            "ALTER TABLE Sermons ADD COLUMN Speaker TEXT",
        ],
    )
    .await;

    let mut report = Report::new();
    let tables = table_registry::run(&settings, &mut report).await.unwrap();
    assert_eq!(tables.tally.added, vec!["Series"]);
    let columns = column_registry::run(&settings, &mut report).await.unwrap();
    assert!(columns.unknown_table.contains(&("OldTable".to_string(), "Notes".to_string())));

    assert_eq!(
        fs::read_to_string(&table_path).unwrap(),
        "ID\tTable Name\tEnabled\tEvent\tSeries\n\
         3\tSeries\t1\t0\t0\n\
         1\tSermons\t1\t1\t0\n\
         2\tSpeakers\t0\t0\t0\n"
    );

    let columns = rows(&column_path);
    assert_eq!(columns.len(), 10);
    assert_eq!(
        find(&columns, "Sermons", "Date"),
        &vec!["1", "Sermons", "1", "1", "Date", "SermonDate"]
    );
    assert_eq!(
        find(&columns, "OldTable", "Notes"),
        &vec!["9", "OldTable", "7", "0", "Notes", "Notes"]
    );
    // Speakers was not queried, its rows persist switched off
    assert_eq!(
        find(&columns, "Speakers", "Name"),
        &vec!["2", "Speakers", "6", "0", "Name", "Name"]
    );
    // Fresh IDs go to the new rows in sorted order, skipping ones in use
    assert_eq!(find(&columns, "Series", "ID")[2], "8");
    assert_eq!(find(&columns, "Series", "Year")[2], "9");
    assert_eq!(find(&columns, "Sermons", "Speaker")[2], "10");

    let mut report = Report::new();
    let statistics = column_stats::run(&settings, &mut report).unwrap();
    let missing: Vec<(String, Vec<String>)> = statistics
        .missing_essentials(&settings.stats.essential_columns)
        .into_iter()
        .map(|m| (m.table, m.missing))
        .collect();
    let all = vec!["Date".to_string(), "Title".to_string(), "Text".to_string()];
    assert_eq!(
        missing,
        vec![
            ("OldTable".to_string(), all.clone()),
            ("Series".to_string(), all.clone()),
            ("Speakers".to_string(), all),
        ]
    );
    assert_eq!(report.warning_count(), 0);
}

#[tokio::test]
async fn test_all_stages_in_one_run() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(dir.path());
    execute(
        &settings.source_db_path(),
        &["CREATE TABLE Sermons (ID INTEGER PRIMARY KEY, Date TEXT, Title TEXT, Text TEXT)"],
    )
    .await;

    let mut report = Report::new();
    workflow::run(Stage::All, &settings, &mut report).await.unwrap();

    assert!(settings.table_registry_path().is_file());
    assert_eq!(rows(&settings.column_registry_path()).len(), 4);
    assert!(report
        .transcript()
        .iter()
        .any(|line| line.contains("All tables contain the essential columns")));
}

#[tokio::test]
async fn test_missing_database_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(dir.path());

    let mut report = Report::new();
    let error = table_registry::run(&settings, &mut report).await.unwrap_err();

    assert!(matches!(error, Error::Schema(SchemaError::DatabaseMissing(_))));
    assert!(error.hint().is_some());
    assert!(!settings.table_registry_path().exists());
}

#[tokio::test]
async fn test_exhausted_table_ids_leave_registry_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(dir.path());
    execute(
        &settings.source_db_path(),
        &[
            "CREATE TABLE Sermons (ID INTEGER)",
            "CREATE TABLE Speakers (ID INTEGER)",
        ],
    )
    .await;
    let registry = "ID\tTable Name\tEnabled\tEvent\tSeries\n4294967295\tSermons\t1\t0\t0\n";
    fs::write(settings.table_registry_path(), registry).unwrap();

    let mut report = Report::new();
    let error = table_registry::run(&settings, &mut report).await.unwrap_err();

    assert!(matches!(
        error,
        Error::Registry(RegistryError::TableIdsExhausted { highest: u32::MAX, .. })
    ));
    assert_eq!(
        fs::read_to_string(settings.table_registry_path()).unwrap(),
        registry
    );
}

#[tokio::test]
async fn test_column_stage_requires_table_registry() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(dir.path());
    execute(&settings.source_db_path(), &["CREATE TABLE Sermons (ID INTEGER)"]).await;

    let mut report = Report::new();
    let error = column_registry::run(&settings, &mut report).await.unwrap_err();

    assert!(matches!(error, Error::Registry(RegistryError::Missing(_))));
    assert!(!settings.column_registry_path().exists());
}

#[test]
fn test_stats_requires_column_registry() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(dir.path());

    let mut report = Report::new();
    let error = column_stats::run(&settings, &mut report).unwrap_err();

    assert!(matches!(error, Error::Registry(RegistryError::Missing(_))));
}
