use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::anomaly::{AnomalyChecker, FLAGS_INCONSISTENT};
use crate::config::AnalysisConfig;
use crate::errors::{MftError, Result};
use crate::hashes::{HashPipeline, HashStats};
use crate::mft::attributes::Residency;
use crate::mft::datarun::total_clusters;
use crate::mft::path_builder::{PathBuilder, PathOutcome};
use crate::mft::record::{MftRecord, RecordAssembler, RecordHeader};
use crate::models::OutputRow;
use crate::rules::PathFilter;

pub const DEFAULT_RECORD_SIZE: usize = 1024;
const LARGE_RECORD_SIZE: usize = 4096;

/// Cooperative cancellation, checked between records. The in-progress
/// record always finishes; pending hashes drain; no partial row is written.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One captured per-record failure.
#[derive(Debug, Clone)]
pub struct RecordError {
    pub record: u64,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct AnalysisStats {
    pub total_records: u64,
    pub active_records: u64,
    pub deleted_records: u64,
    pub directories: u64,
    pub files: u64,
    pub error_records: u64,
    pub filtered_records: u64,
    pub bytes_processed: u64,
    pub chunks_processed: u64,
    pub truncated_tail: bool,
    pub cancelled: bool,
    /// Per attribute type code, for verbose summaries.
    pub attribute_counts: BTreeMap<u32, u64>,
    pub errors: Vec<RecordError>,
    pub hash_stats: HashStats,
}

impl AnalysisStats {
    fn record_error(&mut self, record: u64, err: &MftError) {
        self.errors.push(RecordError {
            record,
            kind: err.kind(),
            message: err.to_string(),
        });
    }
}

/// The complete result of a run: assembled records in ascending record
/// order plus the aggregate counters.
pub struct Analysis {
    pub records: Vec<MftRecord>,
    pub stats: AnalysisStats,
}

impl Analysis {
    /// Project the denormalized rows, applying the configured filters.
    /// Rows come out non-decreasing in record number.
    pub fn to_rows(&mut self, config: &AnalysisConfig, filter: &PathFilter) -> Vec<OutputRow> {
        let mut rows = Vec::with_capacity(self.records.len());
        for record in &self.records {
            if !config.include_deleted && record.is_deleted() {
                self.stats.filtered_records += 1;
                continue;
            }
            if !filter.is_empty() && !filter.admits(&record.full_path) {
                self.stats.filtered_records += 1;
                continue;
            }
            rows.push(OutputRow::from_record(record, config));
        }
        rows
    }
}

/// Streaming driver: reads the image one record-sized slice at a time,
/// feeds fixup + assembly, and owns the aggregate passes (extension
/// folding, path resolution, anomaly checks, hashing).
pub struct MftParser {
    reader: BufReader<File>,
    pub file_size: u64,
    pub record_size: usize,
    config: AnalysisConfig,
    assembler: RecordAssembler,
    cancel: CancelToken,
}

impl MftParser {
    /// Opens the image and infers the record size from the first record's
    /// allocated-size field. Failure to open, or a first record that is
    /// not a FILE record, is fatal.
    pub fn open(path: &Path, config: AnalysisConfig, cancel: CancelToken) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut probe = vec![0u8; DEFAULT_RECORD_SIZE.min(file_size as usize)];
        reader.read_exact(&mut probe)?;
        let header = RecordHeader::parse(&probe)?;
        let record_size = match header.allocated_size as usize {
            LARGE_RECORD_SIZE => LARGE_RECORD_SIZE,
            DEFAULT_RECORD_SIZE => DEFAULT_RECORD_SIZE,
            other => {
                warn!("unusual allocated size {other} in record 0, assuming {DEFAULT_RECORD_SIZE}");
                DEFAULT_RECORD_SIZE
            }
        };
        info!(
            "opened {} ({} bytes, {} byte records, ~{} records)",
            path.display(),
            file_size,
            record_size,
            file_size / record_size as u64
        );

        // Rewind by reopening; BufReader::seek would discard the buffer anyway.
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let assembler = RecordAssembler::new(
            crate::mft::fixup::DEFAULT_SECTOR_SIZE,
            config.resident_data_cap,
        );
        Ok(Self {
            reader,
            file_size,
            record_size,
            config,
            assembler,
            cancel,
        })
    }

    pub fn total_records(&self) -> u64 {
        self.file_size / self.record_size as u64
    }

    /// Run the full multi-pass analysis.
    pub fn analyze(&mut self) -> Result<Analysis> {
        let mut stats = AnalysisStats::default();
        let mut records: Vec<MftRecord> = Vec::with_capacity(self.total_records() as usize);

        self.read_pass(&mut records, &mut stats)?;
        self.fold_extensions(&mut records, &mut stats);
        self.resolve_paths(&mut records);
        if self.config.anomaly_detection {
            self.check_anomalies(&mut records);
        }
        if self.config.compute_hashes {
            self.hash_records(&mut records, &mut stats);
        }

        for record in &records {
            if record.is_active() {
                stats.active_records += 1;
            } else {
                stats.deleted_records += 1;
            }
            if record.is_directory() {
                stats.directories += 1;
            } else {
                stats.files += 1;
            }
            if !record.notes.is_empty() {
                stats.error_records += 1;
            }
        }

        Ok(Analysis { records, stats })
    }

    /// Pass 1: sequential chunked read and per-record assembly.
    fn read_pass(&mut self, records: &mut Vec<MftRecord>, stats: &mut AnalysisStats) -> Result<()> {
        let chunk_records = self.config.chunk_size.max(1);
        let mut record_number: u64 = 0;
        let mut buf = vec![0u8; self.record_size];

        'outer: loop {
            for _ in 0..chunk_records {
                if self.cancel.is_cancelled() {
                    info!("cancellation requested, stopping after record {record_number}");
                    stats.cancelled = true;
                    break 'outer;
                }
                let got = read_full(&mut self.reader, &mut buf)?;
                if got == 0 {
                    break 'outer;
                }
                if got < self.record_size {
                    // A short tail under 1% of a record is padding slop;
                    // anything bigger means the image was cut mid-record.
                    if got >= self.record_size / 100 {
                        warn!("input truncated mid-record at record {record_number}");
                        stats.truncated_tail = true;
                        stats.record_error(
                            record_number,
                            &MftError::Truncated {
                                expected: self.record_size,
                                got,
                            },
                        );
                    }
                    break 'outer;
                }

                stats.bytes_processed += self.record_size as u64;
                stats.total_records += 1;
                log::trace!(
                    "record {record_number} at offset {}",
                    record_number * self.record_size as u64
                );
                match self.assembler.assemble(&mut buf, record_number) {
                    Ok(mut record) => {
                        for attrs in record.attributes.values() {
                            *stats
                                .attribute_counts
                                .entry(attrs[0].type_code)
                                .or_default() += attrs.len() as u64;
                        }
                        self.check_run_lengths(&mut record);
                        records.push(record);
                    }
                    Err(err) => {
                        if record_number == 0 {
                            // Not an MFT at all.
                            return Err(err);
                        }
                        debug!("record {record_number}: {err}");
                        stats.record_error(record_number, &err);
                    }
                }

                record_number += 1;
                if record_number % 1000 == 0 {
                    info!("processed {record_number} records");
                }
            }
            stats.chunks_processed += 1;
        }
        Ok(())
    }

    /// Sum of run lengths must match the allocation; flagged, not fatal.
    fn check_run_lengths(&self, record: &mut MftRecord) {
        let cluster = self.config.cluster_size.max(1);
        let mut mismatches = Vec::new();
        for attrs in record.attributes.values() {
            for attr in attrs {
                if let Residency::NonResident {
                    allocated_size,
                    runs,
                    ..
                } = &attr.residency
                {
                    if runs.is_empty() {
                        continue;
                    }
                    let expected = allocated_size.div_ceil(cluster);
                    let actual = total_clusters(runs);
                    if actual != expected {
                        mismatches.push(format!(
                            "MalformedDataRun: attribute {:#x} covers {actual} clusters, allocation needs {expected}",
                            attr.type_code
                        ));
                    }
                }
            }
        }
        for m in mismatches {
            record.note(m);
        }
    }

    /// Pass 2a: fold extension records into their bases.
    fn fold_extensions(&self, records: &mut [MftRecord], stats: &mut AnalysisStats) {
        let index: HashMap<u64, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.record_number, i))
            .collect();

        // (base index, extension index) joins resolved up front so the
        // records vector can be borrowed mutably pairwise.
        let mut joins: Vec<(usize, u64)> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            for ext in &record.pending_extensions {
                joins.push((i, *ext));
            }
        }

        for (base_idx, ext_number) in joins {
            match index.get(&ext_number) {
                Some(&ext_idx) if ext_idx != base_idx => {
                    let extension = records[ext_idx].clone();
                    let base = &mut records[base_idx];
                    if extension.base_record_number() == base.record_number {
                        self.assembler.fold_extension(base, &extension);
                    } else {
                        let err = MftError::MissingExtension(ext_number);
                        base.note_error(&err);
                        stats.record_error(base.record_number, &err);
                    }
                }
                _ => {
                    let err = MftError::MissingExtension(ext_number);
                    let base = &mut records[base_idx];
                    base.note_error(&err);
                    stats.record_error(base.record_number, &err);
                }
            }
        }
    }

    /// Pass 2b: resolve full paths once every potential parent exists.
    fn resolve_paths(&self, records: &mut [MftRecord]) {
        let mut builder = PathBuilder::new(self.config.path_separator, self.config.max_path_depth);
        builder.reserve(records.len());
        for record in records.iter() {
            if let Some(fname) = record.preferred_file_name() {
                builder.add_entry(
                    record.record_number,
                    record.sequence,
                    fname.parent_record,
                    fname.parent_sequence,
                    fname.name.clone(),
                );
            }
        }
        for record in records.iter_mut() {
            if record.preferred_file_name().is_none() {
                continue;
            }
            let resolved = builder.resolve(record.record_number);
            record.full_path = resolved.path;
            match resolved.outcome {
                PathOutcome::Cycle => {
                    record.note_error(&MftError::CycleInPath(record.record_number))
                }
                PathOutcome::Orphan => {
                    let parent = record
                        .preferred_file_name()
                        .map(|f| f.parent_record)
                        .unwrap_or(0);
                    record.note_error(&MftError::OrphanRecord {
                        record: record.record_number,
                        parent,
                    });
                }
                PathOutcome::Deep => record.note("deep path: parent chain exceeds depth cap"),
                PathOutcome::Resolved => {}
            }
        }
    }

    /// Pass 3: anomaly checks that need the whole table.
    fn check_anomalies(&self, records: &mut [MftRecord]) {
        let checker = AnomalyChecker::new(self.config.cluster_size);
        let by_number: HashMap<u64, (bool, bool, u16)> = records
            .iter()
            .map(|r| (r.record_number, (r.is_active(), r.is_directory(), r.sequence)))
            .collect();

        for record in records.iter_mut() {
            let mut flags: Vec<&'static str> =
                checker.evaluate(record).into_iter().collect();
            if let Some(fname) = record.preferred_file_name() {
                if !record.is_active() {
                    if let Some((parent_active, parent_dir, parent_seq)) =
                        by_number.get(&fname.parent_record)
                    {
                        if *parent_active && *parent_dir && *parent_seq == fname.parent_sequence {
                            flags.push(FLAGS_INCONSISTENT);
                        }
                    }
                }
            }
            flags.sort_unstable();
            flags.dedup();
            for flag in flags {
                record.note(flag);
            }
        }
    }

    /// Pass 4: hash resident primary streams; results join back by record
    /// number so emission stays ordered no matter the worker count.
    fn hash_records(&self, records: &mut [MftRecord], stats: &mut AnalysisStats) {
        let pipeline = HashPipeline::new(
            self.config.multiprocessing_hashes,
            self.config.effective_hash_workers(),
        );
        let work: Vec<(u64, Vec<u8>)> = records
            .iter()
            .filter_map(|r| r.resident_data().map(|d| (r.record_number, d.to_vec())))
            .collect();
        if work.is_empty() {
            return;
        }
        debug!(
            "hashing {} resident streams ({})",
            work.len(),
            if pipeline.is_parallel() {
                "parallel"
            } else {
                "sequential"
            }
        );
        let results = pipeline.compute_batch(&work);
        let by_number: HashMap<u64, crate::mft::record::RecordHashes> =
            results.into_iter().collect();
        for record in records.iter_mut() {
            if let Some(hashes) = by_number.get(&record.record_number) {
                stats.hash_stats.add(hashes);
                record.hashes = Some(hashes.clone());
            }
        }
    }
}

/// Read as much of `buf` as the stream offers; 0 means clean EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
