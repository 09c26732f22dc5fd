use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use csv::WriterBuilder;

use crate::errors::Result;
use crate::models::OutputRow;
use crate::mft::time::WinTimestamp;

const L2T_HEADER: [&str; 17] = [
    "date", "time", "timezone", "MACB", "source", "sourcetype", "type", "user", "host", "short",
    "desc", "version", "filename", "inode", "notes", "format", "extra",
];

/// FN timestamp kinds in MACB order (modified, accessed, changed, born).
const KINDS: [(&str, &str); 4] = [
    ("M...", "mtime"),
    (".A..", "atime"),
    ("..C.", "ctime"),
    ("...B", "crtime"),
];

/// The log2timeline 17-column CSV schema.
pub fn write_l2t(path: &Path, rows: &[OutputRow]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));
    writer.write_record(L2T_HEADER)?;

    for row in rows {
        let ts = &row.timestamps;
        let values: [WinTimestamp; 4] = [
            ts.fn_modified,
            ts.fn_accessed,
            ts.fn_mft_modified,
            ts.fn_created,
        ];
        let filename = if row.full_path.is_empty() {
            row.filename.clone()
        } else {
            row.full_path.clone()
        };
        for ((macb, kind), value) in KINDS.into_iter().zip(values.iter()) {
            if value.is_zero() || value.is_corrupt() {
                continue;
            }
            let (date, time) = value.to_l2t_parts();
            let desc = format!("{filename} {kind}");
            let inode = row.record_number.to_string();
            writer.write_record([
                date.as_str(),
                time.as_str(),
                "UTC",
                macb,
                "MFT",
                "FILESYSTEM",
                kind,
                "",
                "",
                "",
                desc.as_str(),
                "",
                filename.as_str(),
                inode.as_str(),
                row.notes.as_str(),
                "",
                "",
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}
