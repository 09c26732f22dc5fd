use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::Result;
use crate::models::OutputRow;

/// One array of objects, snake_case keys matching the row schema.
pub fn write_json(path: &Path, rows: &[OutputRow]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, rows)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::mft::builder::RecordBuilder;
    use crate::mft::record::RecordAssembler;

    #[test]
    fn array_of_snake_case_objects() {
        let mut buf = RecordBuilder::new(3)
            .in_use(false)
            .file_name(5, 1, "gone.bin")
            .build();
        let mut record = RecordAssembler::default().assemble(&mut buf, 3).unwrap();
        record.full_path = "\\gone.bin".into();
        let rows = vec![OutputRow::from_record(&record, &AnalysisConfig::default())];

        let mut path = std::env::temp_dir();
        path.push(format!("mftsift-json-{}.json", std::process::id()));
        write_json(&path, &rows).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        let array = parsed.as_array().unwrap();
        assert_eq!(array.len(), 1);
        assert_eq!(array[0]["record_number"], 3);
        assert_eq!(array[0]["is_deleted"], true);
        assert_eq!(array[0]["filename"], "gone.bin");
        // Skipped internals must not leak into the serialization.
        assert!(array[0].get("timestamps").is_none());
        assert!(array[0].get("record_flags").is_none());
    }
}
