use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::models::OutputRow;

/// mactime body file:
/// `MD5|name|inode|mode_as_string|uid|gid|size|atime|mtime|ctime|crtime`.
/// Timestamps are epoch seconds from the FN group, or the STD group when
/// the config asks for it.
pub fn write_body(path: &Path, rows: &[OutputRow], config: &AnalysisConfig) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        let ts = &row.timestamps;
        let (atime, mtime, ctime, crtime) = if config.body_use_std_times {
            (
                ts.si_accessed.unix_seconds(),
                ts.si_modified.unix_seconds(),
                ts.si_mft_modified.unix_seconds(),
                ts.si_created.unix_seconds(),
            )
        } else {
            (
                ts.fn_accessed.unix_seconds(),
                ts.fn_modified.unix_seconds(),
                ts.fn_mft_modified.unix_seconds(),
                ts.fn_created.unix_seconds(),
            )
        };
        let md5 = if row.md5.is_empty() { "0" } else { &row.md5 };
        let name = if row.full_path.is_empty() {
            &row.filename
        } else {
            &row.full_path
        };
        writeln!(
            writer,
            "{md5}|{name}|{}|{}|0|0|{}|{atime}|{mtime}|{ctime}|{crtime}",
            row.record_number,
            row.mode_string(),
            row.real_size,
        )?;
    }
    writer.flush()?;
    Ok(())
}

const TIMELINE_EVENTS: [(&str, &str); 8] = [
    ("SI", "CREATE"),
    ("SI", "MODIFY"),
    ("SI", "CHANGE"),
    ("SI", "ACCESS"),
    ("FN", "CREATE"),
    ("FN", "MODIFY"),
    ("FN", "CHANGE"),
    ("FN", "ACCESS"),
];

/// TSK timeline: `time|source|event|name|inode`, one row per set
/// timestamp, up to eight per record.
pub fn write_timeline(path: &Path, rows: &[OutputRow]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        let ts = &row.timestamps;
        let values = [
            ts.si_created,
            ts.si_modified,
            ts.si_mft_modified,
            ts.si_accessed,
            ts.fn_created,
            ts.fn_modified,
            ts.fn_mft_modified,
            ts.fn_accessed,
        ];
        let name = if row.full_path.is_empty() {
            &row.filename
        } else {
            &row.full_path
        };
        for ((group, event), value) in TIMELINE_EVENTS.iter().zip(values.iter()) {
            if value.is_zero() || value.is_corrupt() {
                continue;
            }
            writeln!(
                writer,
                "{}|MFT|{group}_{event}|{name}|{}",
                value.unix_seconds(),
                row.record_number
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}
