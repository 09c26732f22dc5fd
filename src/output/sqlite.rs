use std::path::Path;

use log::debug;
use rusqlite::{params, Connection};

use crate::errors::{MftError, Result};
use crate::mft::attributes::{AttributeType, AttributeValue};
use crate::mft::record::MftRecord;
use crate::models::OutputRow;

fn db_error(err: rusqlite::Error) -> MftError {
    MftError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        err.to_string(),
    ))
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS mft_records (
    record_number INTEGER PRIMARY KEY,
    sequence_number INTEGER,
    is_active INTEGER,
    is_directory INTEGER,
    has_ads INTEGER,
    parent_record_number INTEGER,
    parent_sequence_number INTEGER,
    filename TEXT,
    short_filename TEXT,
    filepath TEXT,
    si_creation_time TEXT,
    si_modification_time TEXT,
    si_mft_change_time TEXT,
    si_access_time TEXT,
    fn_creation_time TEXT,
    fn_modification_time TEXT,
    fn_mft_change_time TEXT,
    fn_access_time TEXT,
    allocated_size INTEGER,
    real_size INTEGER,
    object_id TEXT,
    birth_volume_id TEXT,
    birth_object_id TEXT,
    birth_domain_id TEXT,
    md5 TEXT,
    sha256 TEXT,
    sha512 TEXT,
    crc32 TEXT,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS mft_attributes (
    record_number INTEGER,
    attr_type INTEGER,
    attr_type_name TEXT,
    attr_name TEXT,
    resident INTEGER,
    content_size INTEGER,
    FOREIGN KEY (record_number) REFERENCES mft_records (record_number)
);

CREATE TABLE IF NOT EXISTS alternate_data_streams (
    record_number INTEGER,
    stream_name TEXT,
    size INTEGER,
    FOREIGN KEY (record_number) REFERENCES mft_records (record_number)
);

CREATE TABLE IF NOT EXISTS security_descriptors (
    record_number INTEGER,
    revision INTEGER,
    control INTEGER,
    owner_sid TEXT,
    group_sid TEXT,
    dacl TEXT,
    sacl TEXT,
    FOREIGN KEY (record_number) REFERENCES mft_records (record_number)
);

CREATE INDEX IF NOT EXISTS idx_records_parent ON mft_records (parent_record_number);
CREATE INDEX IF NOT EXISTS idx_attributes_record ON mft_attributes (record_number);

CREATE VIEW IF NOT EXISTS active_records AS
    SELECT * FROM mft_records WHERE is_active = 1;
CREATE VIEW IF NOT EXISTS deleted_records AS
    SELECT * FROM mft_records WHERE is_active = 0;
CREATE VIEW IF NOT EXISTS directory_records AS
    SELECT * FROM mft_records WHERE is_directory = 1;

CREATE VIEW IF NOT EXISTS record_timeline AS
    SELECT record_number, filepath, 'si_creation' AS event, si_creation_time AS ts
        FROM mft_records WHERE si_creation_time != ''
    UNION ALL
    SELECT record_number, filepath, 'si_modification', si_modification_time
        FROM mft_records WHERE si_modification_time != ''
    UNION ALL
    SELECT record_number, filepath, 'si_mft_change', si_mft_change_time
        FROM mft_records WHERE si_mft_change_time != ''
    UNION ALL
    SELECT record_number, filepath, 'si_access', si_access_time
        FROM mft_records WHERE si_access_time != ''
    UNION ALL
    SELECT record_number, filepath, 'fn_creation', fn_creation_time
        FROM mft_records WHERE fn_creation_time != ''
    UNION ALL
    SELECT record_number, filepath, 'fn_modification', fn_modification_time
        FROM mft_records WHERE fn_modification_time != ''
    UNION ALL
    SELECT record_number, filepath, 'fn_mft_change', fn_mft_change_time
        FROM mft_records WHERE fn_mft_change_time != ''
    UNION ALL
    SELECT record_number, filepath, 'fn_access', fn_access_time
        FROM mft_records WHERE fn_access_time != '';
";

/// Persist rows plus the per-attribute companion tables. Everything goes
/// in one transaction; the batch either lands or the file is left intact.
pub fn write_sqlite(path: &Path, rows: &[OutputRow], records: &[MftRecord]) -> Result<()> {
    let mut conn = Connection::open(path).map_err(db_error)?;
    conn.execute_batch(SCHEMA).map_err(db_error)?;

    let tx = conn.transaction().map_err(db_error)?;
    {
        let mut insert_record = tx
            .prepare(
                "INSERT OR REPLACE INTO mft_records (
                    record_number, sequence_number, is_active, is_directory, has_ads,
                    parent_record_number, parent_sequence_number, filename, short_filename,
                    filepath, si_creation_time, si_modification_time, si_mft_change_time,
                    si_access_time, fn_creation_time, fn_modification_time, fn_mft_change_time,
                    fn_access_time, allocated_size, real_size, object_id, birth_volume_id,
                    birth_object_id, birth_domain_id, md5, sha256, sha512, crc32, notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                          ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)",
            )
            .map_err(db_error)?;
        for row in rows {
            insert_record
                .execute(params![
                    row.record_number,
                    row.sequence_number,
                    row.is_active,
                    row.is_directory,
                    row.has_ads,
                    row.parent_record_number,
                    row.parent_sequence_number,
                    row.filename,
                    row.short_filename,
                    row.full_path,
                    row.si_creation_time,
                    row.si_modification_time,
                    row.si_mft_change_time,
                    row.si_access_time,
                    row.fn_creation_time,
                    row.fn_modification_time,
                    row.fn_mft_change_time,
                    row.fn_access_time,
                    row.allocated_size,
                    row.real_size,
                    row.object_id,
                    row.birth_volume_id,
                    row.birth_object_id,
                    row.birth_domain_id,
                    row.md5,
                    row.sha256,
                    row.sha512,
                    row.crc32,
                    row.notes,
                ])
                .map_err(db_error)?;
        }

        let mut insert_attr = tx
            .prepare(
                "INSERT INTO mft_attributes
                    (record_number, attr_type, attr_type_name, attr_name, resident, content_size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(db_error)?;
        let mut insert_ads = tx
            .prepare(
                "INSERT INTO alternate_data_streams (record_number, stream_name, size)
                 VALUES (?1, ?2, ?3)",
            )
            .map_err(db_error)?;
        let mut insert_sd = tx
            .prepare(
                "INSERT INTO security_descriptors
                    (record_number, revision, control, owner_sid, group_sid, dacl, sacl)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(db_error)?;

        for record in records {
            for attrs in record.attributes.values() {
                for attr in attrs {
                    let type_name = attr
                        .attr_type()
                        .map(AttributeType::name)
                        .unwrap_or("UNKNOWN");
                    insert_attr
                        .execute(params![
                            record.record_number,
                            attr.type_code,
                            type_name,
                            attr.name,
                            attr.is_resident(),
                            attr.content_size(),
                        ])
                        .map_err(db_error)?;
                }
            }
            for ads in record.alternate_streams() {
                insert_ads
                    .execute(params![record.record_number, ads.name, ads.content_size()])
                    .map_err(db_error)?;
            }
            for attr in record.attributes_of(AttributeType::SecurityDescriptor) {
                if let AttributeValue::SecurityDescriptor(sd) = &attr.value {
                    insert_sd
                        .execute(params![
                            record.record_number,
                            sd.revision,
                            sd.control,
                            sd.owner_sid,
                            sd.group_sid,
                            sd.dacl,
                            sd.sacl,
                        ])
                        .map_err(db_error)?;
                }
            }
        }
    }
    tx.commit().map_err(db_error)?;
    debug!("sqlite output committed: {} rows", rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::mft::builder::RecordBuilder;
    use crate::mft::record::RecordAssembler;

    const T2020: u64 = 132_223_104_000_000_000;

    #[test]
    fn schema_rows_and_companion_tables() {
        let assembler = RecordAssembler::default();
        let mut bufs = vec![
            RecordBuilder::new(0)
                .in_use(true)
                .standard_info(T2020)
                .file_name(5, 1, "$MFT")
                .resident_data(b"x")
                .named_resident_data("Zone.Identifier", b"zone")
                .build(),
            RecordBuilder::new(1)
                .in_use(false)
                .standard_info(T2020)
                .file_name(5, 1, "dead.txt")
                .build(),
        ];
        let mut records = Vec::new();
        for (i, buf) in bufs.iter_mut().enumerate() {
            let mut r = assembler.assemble(buf, i as u64).unwrap();
            r.full_path = format!("\\f{i}");
            records.push(r);
        }
        let config = AnalysisConfig::default();
        let rows: Vec<OutputRow> = records
            .iter()
            .map(|r| OutputRow::from_record(r, &config))
            .collect();

        let mut path = std::env::temp_dir();
        path.push(format!("mftsift-sqlite-{}.db", std::process::id()));
        std::fs::remove_file(&path).ok();
        write_sqlite(&path, &rows, &records).unwrap();

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM mft_records", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let active: i64 = conn
            .query_row("SELECT COUNT(*) FROM active_records", [], |r| r.get(0))
            .unwrap();
        assert_eq!(active, 1);
        let deleted: i64 = conn
            .query_row("SELECT COUNT(*) FROM deleted_records", [], |r| r.get(0))
            .unwrap();
        assert_eq!(deleted, 1);
        let ads: i64 = conn
            .query_row("SELECT COUNT(*) FROM alternate_data_streams", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(ads, 1);
        let attrs: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM mft_attributes WHERE record_number = 0",
                [],
                |r| r.get(0),
            )
            .unwrap();
        // SI + FN + two $DATA streams.
        assert_eq!(attrs, 4);
        let timeline: i64 = conn
            .query_row("SELECT COUNT(*) FROM record_timeline", [], |r| r.get(0))
            .unwrap();
        // Each record carries 4 SI timestamps; FN times were zero.
        assert_eq!(timeline, 8);
        drop(conn);
        std::fs::remove_file(&path).ok();
    }
}
