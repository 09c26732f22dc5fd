pub mod body;
pub mod csv;
pub mod json;
pub mod l2t;
pub mod sqlite;
pub mod xml;

use std::path::Path;

use log::info;

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::mft::record::MftRecord;
use crate::models::OutputRow;

/// Every serializer consumes the same row schema; the driver picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    /// CSV variant with spreadsheet-friendly date columns.
    Excel,
    Json,
    Xml,
    /// mactime body file.
    Body,
    /// TSK timeline, one row per (record, timestamp).
    Timeline,
    /// TSK body-file alias.
    Tsk,
    /// log2timeline 17-column CSV.
    L2t,
    Sqlite,
}

impl OutputFormat {
    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Excel => "excel",
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
            OutputFormat::Body => "body",
            OutputFormat::Timeline => "timeline",
            OutputFormat::Tsk => "tsk",
            OutputFormat::L2t => "l2t",
            OutputFormat::Sqlite => "sqlite",
        }
    }
}

/// Serialize the rows to `path` in the chosen format. The SQLite writer
/// additionally persists per-attribute companion tables from the records.
pub fn write_output(
    format: OutputFormat,
    path: &Path,
    rows: &[OutputRow],
    records: &[MftRecord],
    config: &AnalysisConfig,
) -> Result<()> {
    info!("writing {} rows as {} to {}", rows.len(), format.name(), path.display());
    match format {
        OutputFormat::Csv => csv::write_csv(path, rows, csv::CsvStyle::Iso),
        OutputFormat::Excel => csv::write_csv(path, rows, csv::CsvStyle::Excel),
        OutputFormat::Json => json::write_json(path, rows),
        OutputFormat::Xml => xml::write_xml(path, rows),
        OutputFormat::Body | OutputFormat::Tsk => body::write_body(path, rows, config),
        OutputFormat::Timeline => body::write_timeline(path, rows),
        OutputFormat::L2t => l2t::write_l2t(path, rows),
        OutputFormat::Sqlite => sqlite::write_sqlite(path, rows, records),
    }
}
