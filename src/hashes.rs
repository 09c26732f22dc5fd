//! Hashing of resident $DATA content. The only parallel stage: records
//! fan out over a bounded worker pool and results come back keyed and
//! ordered by record number, so emission order never depends on worker
//! count.

use std::collections::HashSet;

use log::debug;
use md5::{Digest, Md5};
use rayon::prelude::*;
use sha2::{Sha256, Sha512};

use crate::mft::record::RecordHashes;

/// Hardware parallelism with a safe fallback when detection fails.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Hash one buffer. Deterministic by construction; used by both the
/// sequential and the pooled paths.
pub fn compute_hashes(data: &[u8]) -> RecordHashes {
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut sha512 = Sha512::new();
    let mut crc32 = crc32fast::Hasher::new();
    md5.update(data);
    sha256.update(data);
    sha512.update(data);
    crc32.update(data);
    RecordHashes {
        md5: format!("{:x}", md5.finalize()),
        sha256: format!("{:x}", sha256.finalize()),
        sha512: format!("{:x}", sha512.finalize()),
        crc32: format!("{:08x}", crc32.finalize()),
    }
}

pub struct HashPipeline {
    pool: Option<rayon::ThreadPool>,
}

impl HashPipeline {
    /// `workers` of 0 or 1, or `parallel = false`, reverts to sequential
    /// hashing on the caller's thread.
    pub fn new(parallel: bool, workers: usize) -> Self {
        let pool = if parallel && workers > 1 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .ok()
        } else {
            None
        };
        if let Some(pool) = &pool {
            debug!("hash pool running {} workers", pool.current_num_threads());
        }
        Self { pool }
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Hash a batch of (record number, content) pairs. The returned vector
    /// is in the same order as the input regardless of scheduling.
    pub fn compute_batch(&self, items: &[(u64, Vec<u8>)]) -> Vec<(u64, RecordHashes)> {
        match &self.pool {
            Some(pool) => pool.install(|| {
                items
                    .par_iter()
                    .map(|(record, data)| (*record, compute_hashes(data)))
                    .collect()
            }),
            None => items
                .iter()
                .map(|(record, data)| (*record, compute_hashes(data)))
                .collect(),
        }
    }
}

/// Unique-digest accounting for the final summary.
#[derive(Debug, Default)]
pub struct HashStats {
    md5: HashSet<String>,
    sha256: HashSet<String>,
    sha512: HashSet<String>,
    crc32: HashSet<String>,
}

impl HashStats {
    pub fn add(&mut self, hashes: &RecordHashes) {
        self.md5.insert(hashes.md5.clone());
        self.sha256.insert(hashes.sha256.clone());
        self.sha512.insert(hashes.sha512.clone());
        self.crc32.insert(hashes.crc32.clone());
    }

    pub fn unique_md5(&self) -> usize {
        self.md5.len()
    }

    pub fn unique_sha256(&self) -> usize {
        self.sha256.len()
    }

    pub fn unique_sha512(&self) -> usize {
        self.sha512.len()
    }

    pub fn unique_crc32(&self) -> usize {
        self.crc32.len()
    }
}
