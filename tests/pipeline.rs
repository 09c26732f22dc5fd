//! End-to-end scenarios over synthesized MFT images: the image is built
//! record by record, written to disk, and driven through the full
//! open/analyze/project pipeline.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use mftsift::config::AnalysisConfig;
use mftsift::mft::builder::RecordBuilder;
use mftsift::mft::parser::{Analysis, CancelToken, MftParser};
use mftsift::models::OutputRow;
use mftsift::rules::PathFilter;

// 2020-01-01T00:00:00.000000Z
const T2020: u64 = 132_223_104_000_000_000;
// 2023-06-15T12:34:56.123456Z
const T2023: u64 = 133_313_060_961_234_560;

fn write_image(name: &str, records: Vec<Vec<u8>>) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("mftsift-e2e-{name}-{}.mft", std::process::id()));
    let mut f = File::create(&path).unwrap();
    for r in records {
        f.write_all(&r).unwrap();
    }
    path
}

fn analyze(path: &PathBuf, config: &AnalysisConfig) -> (Analysis, Vec<OutputRow>) {
    let mut parser = MftParser::open(path, config.clone(), CancelToken::new()).unwrap();
    let mut analysis = parser.analyze().unwrap();
    let rows = analysis.to_rows(config, &PathFilter::default());
    std::fs::remove_file(path).ok();
    (analysis, rows)
}

fn blank_record(n: u64) -> Vec<u8> {
    RecordBuilder::new(n).in_use(true).build()
}

fn root_record() -> Vec<u8> {
    RecordBuilder::new(5)
        .in_use(true)
        .directory(true)
        .index_root()
        .standard_info(T2020)
        .file_name_ns(5, 1, ".", 3)
        .build()
}

#[test]
fn s1_single_mft_record() {
    let path = write_image(
        "s1",
        vec![RecordBuilder::new(0)
            .in_use(true)
            .standard_info(T2020)
            .file_name(5, 1, "$MFT")
            .build()],
    );
    let (analysis, rows) = analyze(&path, &AnalysisConfig::default());
    assert_eq!(analysis.stats.total_records, 1);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.filename, "$MFT");
    assert_eq!(row.full_path, "\\$MFT");
    assert!(row.is_active);
    assert!(!row.is_directory);
}

#[test]
fn s2_deleted_file() {
    let mut records: Vec<Vec<u8>> = (0..5).map(blank_record).collect();
    records.push(root_record());
    records.extend((6..42).map(blank_record));
    records.push(
        RecordBuilder::new(42)
            .in_use(false)
            .sequence(3)
            .standard_info(T2020)
            .file_name(5, 1, "secret.txt")
            .build(),
    );
    let path = write_image("s2", records);
    let (_, rows) = analyze(&path, &AnalysisConfig::default());
    let row = rows.iter().find(|r| r.record_number == 42).unwrap();
    assert!(!row.is_active);
    assert!(row.is_deleted);
    assert_eq!(row.filename, "secret.txt");
    assert_eq!(row.full_path, "\\secret.txt");
    assert_eq!(row.sequence_number, 3);
}

#[test]
fn s3_timestomp_anomalies() {
    let path = write_image(
        "s3",
        vec![RecordBuilder::new(0)
            .in_use(true)
            .standard_info(T2020)
            .file_name_created(5, 1, "stomped.exe", T2023)
            .build()],
    );
    let (_, rows) = analyze(&path, &AnalysisConfig::default());
    assert!(rows[0].notes.contains("std-fn-shift"));
    assert!(rows[0].notes.contains("usec-zero"));
}

#[test]
fn s4_sparse_data_runs() {
    // 8 clusters at 0x1000, a 5-cluster hole, 4 clusters 16 back.
    let runs = [
        0x31, 0x08, 0x00, 0x10, 0x00, 0x01, 0x05, 0x31, 0x04, 0xF0, 0xFF, 0xFF, 0x00,
    ];
    let path = write_image(
        "s4",
        vec![RecordBuilder::new(0)
            .in_use(true)
            .file_name(5, 1, "sparse.bin")
            .nonresident_data(&runs, 17 * 4096, 17 * 4096 - 100)
            .build()],
    );
    let (analysis, rows) = analyze(&path, &AnalysisConfig::default());
    let data = analysis.records[0].primary_data().unwrap();
    match &data.residency {
        mftsift::mft::attributes::Residency::NonResident { runs, .. } => {
            assert_eq!(runs.len(), 3);
            assert_eq!(runs[0].length, 8);
            assert_eq!(runs[0].lcn, Some(0x1000));
            assert_eq!(runs[1].lcn, None); // sparse hole
            assert_eq!(runs[2].lcn, Some(0x0FF0)); // signed delta applied
        }
        other => panic!("expected non-resident data, got {other:?}"),
    }
    // Run lengths match the allocation, so no MalformedDataRun note.
    assert!(!rows[0].notes.contains("MalformedDataRun"));
}

#[test]
fn s4_run_length_sum_violation_is_flagged() {
    let runs = [0x31, 0x08, 0x00, 0x10, 0x00, 0x00];
    let path = write_image(
        "s4b",
        vec![RecordBuilder::new(0)
            .in_use(true)
            .file_name(5, 1, "short.bin")
            .nonresident_data(&runs, 16 * 4096, 16 * 4096) // needs 16, runs cover 8
            .build()],
    );
    let (_, rows) = analyze(&path, &AnalysisConfig::default());
    assert!(rows[0].notes.contains("MalformedDataRun"));
    assert!(rows[0].notes.contains("8 clusters"));
}

#[test]
fn s5_fixup_corruption() {
    let mut bad = RecordBuilder::new(0)
        .in_use(true)
        .standard_info(T2020)
        .file_name(5, 1, "torn.txt")
        .build();
    bad[510] ^= 0xFF; // break sector 1's tail
    let path = write_image("s5", vec![bad]);
    let (analysis, rows) = analyze(&path, &AnalysisConfig::default());
    assert_eq!(rows.len(), 1);
    assert!(rows[0].notes.contains("FixupMismatch"));
    // Best-effort: header fields survive, attributes are empty.
    assert!(rows[0].is_active);
    assert!(rows[0].filename.is_empty());
    assert!(analysis.records[0].attributes.is_empty());
}

#[test]
fn s6_cycle_in_path() {
    let mut records: Vec<Vec<u8>> = (0..5).map(blank_record).collect();
    records.push(root_record());
    records.push(
        RecordBuilder::new(6)
            .in_use(true)
            .directory(true)
            .index_root()
            .file_name(7, 1, "a")
            .build(),
    );
    records.push(
        RecordBuilder::new(7)
            .in_use(true)
            .directory(true)
            .index_root()
            .file_name(6, 1, "b")
            .build(),
    );
    let path = write_image("s6", records);
    let (_, rows) = analyze(&path, &AnalysisConfig::default());
    let a = rows.iter().find(|r| r.record_number == 6).unwrap();
    let b = rows.iter().find(|r| r.record_number == 7).unwrap();
    assert!(a.full_path.starts_with("<cycle>\\"), "got {}", a.full_path);
    assert!(b.full_path.starts_with("<cycle>\\"), "got {}", b.full_path);
    assert!(a.notes.contains("CycleInPath"));
    assert!(b.notes.contains("CycleInPath"));
}

#[test]
fn rows_are_ordered_and_in_range() {
    let mut records: Vec<Vec<u8>> = (0..5).map(blank_record).collect();
    records.push(root_record());
    for i in 6..30u64 {
        records.push(
            RecordBuilder::new(i)
                .in_use(i % 3 != 0)
                .standard_info(T2020)
                .file_name(5, 1, &format!("file-{i}.dat"))
                .build(),
        );
    }
    let total = records.len() as u64;
    let path = write_image("ordered", records);
    let (_, rows) = analyze(&path, &AnalysisConfig::default());
    for pair in rows.windows(2) {
        assert!(pair[0].record_number <= pair[1].record_number);
    }
    for row in &rows {
        assert!(row.record_number < total);
        assert!(row.allocated_size >= row.real_size);
        // Resolved paths start with the separator and carry no NULs.
        if row.full_path.starts_with('\\') {
            assert!(!row.full_path.contains('\0'));
        }
    }
}

#[test]
fn hashing_is_stable_across_parallelism() {
    let mut records: Vec<Vec<u8>> = (0..5).map(blank_record).collect();
    records.push(root_record());
    for i in 6..20u64 {
        records.push(
            RecordBuilder::new(i)
                .in_use(true)
                .file_name(5, 1, &format!("blob-{i}"))
                .resident_data(format!("content-{i}").as_bytes())
                .build(),
        );
    }
    let image = records.clone();
    let path_a = write_image("hash-par", records);
    let path_b = write_image("hash-seq", image);

    let mut parallel = AnalysisConfig::default();
    parallel.compute_hashes = true;
    parallel.hash_workers = Some(4);
    let mut sequential = parallel.clone();
    sequential.multiprocessing_hashes = false;

    let (_, rows_a) = analyze(&path_a, &parallel);
    let (_, rows_b) = analyze(&path_b, &sequential);
    assert_eq!(rows_a.len(), rows_b.len());
    for (a, b) in rows_a.iter().zip(rows_b.iter()) {
        assert_eq!(a.md5, b.md5);
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(a.sha512, b.sha512);
        assert_eq!(a.crc32, b.crc32);
    }
    let hashed = rows_a.iter().find(|r| r.record_number == 6).unwrap();
    assert!(!hashed.md5.is_empty());
}

#[test]
fn full_run_to_every_format() {
    let mut records: Vec<Vec<u8>> = (0..5).map(blank_record).collect();
    records.push(root_record());
    records.push(
        RecordBuilder::new(6)
            .in_use(true)
            .standard_info(T2020)
            .file_name_created(5, 1, "report.pdf", T2020)
            .resident_data(b"%PDF-1.4")
            .build(),
    );
    let path = write_image("formats", records);
    let mut config = AnalysisConfig::default();
    config.compute_hashes = true;
    let (analysis, rows) = analyze(&path, &config);

    for format in [
        mftsift::output::OutputFormat::Csv,
        mftsift::output::OutputFormat::Excel,
        mftsift::output::OutputFormat::Json,
        mftsift::output::OutputFormat::Xml,
        mftsift::output::OutputFormat::Body,
        mftsift::output::OutputFormat::Timeline,
        mftsift::output::OutputFormat::L2t,
        mftsift::output::OutputFormat::Sqlite,
    ] {
        let mut out = std::env::temp_dir();
        out.push(format!(
            "mftsift-e2e-out-{}-{}.bin",
            format.name(),
            std::process::id()
        ));
        std::fs::remove_file(&out).ok();
        mftsift::output::write_output(format, &out, &rows, &analysis.records, &config).unwrap();
        let written = std::fs::metadata(&out).unwrap().len();
        assert!(written > 0, "{} output is empty", format.name());
        std::fs::remove_file(&out).ok();
    }
}
