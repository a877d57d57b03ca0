use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use schema_registry_builder::{
    config::{RunIdentity, Settings},
    report::Report,
    workflow::{self, Stage},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Rebuilds the table and column registries of a SQLite database.
#[derive(Parser)]
#[command(name = "registry-builder", version, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./registry.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the database and registry files; overrides the config
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Merge the database's tables into the table registry
    Tables,
    /// Merge the columns of enabled tables into the column registry
    Columns,
    /// Report column name frequencies and missing essential columns
    Stats,
    /// Run tables, columns and stats in order
    All,
}

impl From<Command> for Stage {
    fn from(command: Command) -> Self {
        match command {
            Command::Tables => Stage::Tables,
            Command::Columns => Stage::Columns,
            Command::Stats => Stage::Stats,
            Command::All => Stage::All,
        }
    }
}

/// Console output plus an appended plain-text log file. Returns the error if
/// the log file could not be opened; console logging is set up regardless.
fn init_tracing(log_path: &Path) -> Option<std::io::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = log_path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(log_path));
    let (file_layer, log_error) = match log_file {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        Err(error) => (None, Some(error)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .without_time()
                .with_target(false)
                .with_level(false),
        )
        .with(file_layer)
        .init();

    log_error
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("{}", error);
            return ExitCode::FAILURE;
        }
    };
    let settings = match cli.data_dir {
        Some(data_dir) => settings.with_data_dir(data_dir),
        None => settings,
    };

    let log_path = settings.log_path();
    let log_error = init_tracing(&log_path);

    let mut report = Report::new();
    report.header(&settings, &RunIdentity::from_env());
    if let Some(error) = log_error {
        report.warning(format!(
            "Could not open log file '{}': {}",
            log_path.display(),
            error
        ));
    }

    let outcome = workflow::run(cli.command.into(), &settings, &mut report).await;
    if let Err(error) = &outcome {
        report.error(error.to_string());
        if let Some(hint) = error.hint() {
            report.error_more(hint);
        }
    }
    report.finish();

    if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
