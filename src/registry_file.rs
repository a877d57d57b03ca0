use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::report::Report;

const DELIMITER: u8 = b'\t';

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("required file not found at '{}'", .0.display())]
    Missing(PathBuf),
    #[error("error reading '{}': {source}", .path.display())]
    Read { path: PathBuf, source: csv::Error },
    #[error("error writing '{}': {source}", .path.display())]
    Write { path: PathBuf, source: csv::Error },
    #[error("table ID {highest} is the largest possible; no ID is left for new table '{table}'")]
    TableIdsExhausted { highest: u32, table: String },
}

/// One data row of a registry file, fields trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryRow {
    pub line: u64,
    pub fields: Vec<String>,
}

impl RegistryRow {
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }
}

pub fn require_file(path: &Path) -> Result<(), RegistryError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RegistryError::Missing(path.to_path_buf()))
    }
}

/// Reads every data row after the header. Rows shorter than `min_fields`, or
/// rows that cannot be decoded, are reported as warnings and skipped.
pub fn read_rows(
    path: &Path,
    min_fields: usize,
    report: &mut Report,
) -> Result<Vec<RegistryRow>, RegistryError> {
    require_file(path)?;

    let read_error = |source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(error) if error.is_io_error() => return Err(read_error(error)),
            Err(error) => {
                let line = error.position().map(|p| p.line()).unwrap_or_default();
                report.warning(format!("Row {} could not be read ({}). Skipping.", line, error));
                continue;
            }
        };

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if is_blank(&record) {
            continue;
        }
        if record.len() < min_fields {
            report.warning(format!(
                "Row {} has fewer than {} fields. Skipping.",
                line, min_fields
            ));
            continue;
        }

        rows.push(RegistryRow {
            line,
            fields: record.iter().map(|field| field.trim().to_string()).collect(),
        });
    }

    Ok(rows)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Writes header and rows to a temporary file next to `path`, then renames it
/// into place. A failure at any point leaves the previous file untouched.
pub fn write_rows<I>(path: &Path, header: &[&str], rows: I) -> Result<(), RegistryError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let write_error = |source| RegistryError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(|e| write_error(e.into()))?;

    {
        let mut writer = WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_writer(staged.as_file_mut());
        writer.write_record(header).map_err(write_error)?;
        for row in rows {
            writer.write_record(&row).map_err(write_error)?;
        }
        writer.flush().map_err(|e| write_error(e.into()))?;
    }
    staged
        .as_file_mut()
        .sync_all()
        .map_err(|e| write_error(e.into()))?;

    staged
        .persist(path)
        .map_err(|e| write_error(e.error.into()))?;
    Ok(())
}
