use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use csv::WriterBuilder;

use crate::errors::Result;
use crate::models::OutputRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvStyle {
    /// ISO-8601 timestamps with offset.
    Iso,
    /// `YYYY-MM-DD HH:MM:SS`, the excel export variant.
    Excel,
}

/// RFC-4180 CSV with a header row derived from the row schema.
pub fn write_csv(path: &Path, rows: &[OutputRow], style: CsvStyle) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));
    for row in rows {
        match style {
            CsvStyle::Iso => writer.serialize(row)?,
            CsvStyle::Excel => {
                let mut excel = row.clone();
                excel.si_creation_time = row.timestamps.si_created.to_datetime_string();
                excel.si_modification_time = row.timestamps.si_modified.to_datetime_string();
                excel.si_mft_change_time = row.timestamps.si_mft_modified.to_datetime_string();
                excel.si_access_time = row.timestamps.si_accessed.to_datetime_string();
                excel.fn_creation_time = row.timestamps.fn_created.to_datetime_string();
                excel.fn_modification_time = row.timestamps.fn_modified.to_datetime_string();
                excel.fn_mft_change_time = row.timestamps.fn_mft_modified.to_datetime_string();
                excel.fn_access_time = row.timestamps.fn_accessed.to_datetime_string();
                writer.serialize(&excel)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

impl From<csv::Error> for crate::errors::MftError {
    fn from(err: csv::Error) -> Self {
        crate::errors::MftError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        ))
    }
}
