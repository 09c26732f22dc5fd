use std::fs::File;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::errors::Result;

/// Named analysis profiles. Each one is just a preset over
/// `AnalysisConfig`; a config file and CLI flags layer on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Default,
    Quick,
    Forensic,
    Performance,
}

impl Profile {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Profile::Default),
            "quick" => Some(Profile::Quick),
            "forensic" => Some(Profile::Forensic),
            "performance" => Some(Profile::Performance),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Profile::Default => "default",
            Profile::Quick => "quick",
            Profile::Forensic => "forensic",
            Profile::Performance => "performance",
        }
    }
}

/// The one configuration record every stage reads. Defaults come from the
/// selected profile; a JSON config file and explicit CLI flags override.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub profile: Profile,
    /// Records per in-memory batch in the streaming driver.
    pub chunk_size: usize,
    pub compute_hashes: bool,
    pub multiprocessing_hashes: bool,
    /// None means use the detected hardware parallelism.
    pub hash_workers: Option<usize>,
    pub anomaly_detection: bool,
    /// Decode EA / logged-utility-stream detail columns.
    pub extended_attrs: bool,
    pub include_deleted: bool,
    pub file_types_include: Vec<String>,
    pub file_types_exclude: Vec<String>,
    /// Bytes of resident $DATA retained per record for hashing.
    pub resident_data_cap: usize,
    pub path_separator: char,
    pub use_localtime: bool,
    pub max_path_depth: usize,
    /// Bytes per cluster, for run-length invariants; raw MFT dumps carry
    /// no boot sector so this is a config input.
    pub cluster_size: u64,
    /// Body/timeline output uses STD timestamps instead of FN when set.
    pub body_use_std_times: bool,
}

impl AnalysisConfig {
    pub fn from_profile(profile: Profile) -> Self {
        let base = Self {
            profile,
            chunk_size: 1000,
            compute_hashes: false,
            multiprocessing_hashes: true,
            hash_workers: None,
            anomaly_detection: true,
            extended_attrs: true,
            include_deleted: true,
            file_types_include: Vec::new(),
            file_types_exclude: Vec::new(),
            resident_data_cap: 4096,
            path_separator: '\\',
            use_localtime: false,
            max_path_depth: crate::mft::path_builder::DEFAULT_MAX_DEPTH,
            cluster_size: 4096,
            body_use_std_times: false,
        };
        match profile {
            Profile::Default => base,
            Profile::Quick => Self {
                chunk_size: 5000,
                anomaly_detection: false,
                extended_attrs: false,
                ..base
            },
            Profile::Forensic => Self {
                chunk_size: 500,
                compute_hashes: true,
                ..base
            },
            Profile::Performance => Self {
                chunk_size: 10000,
                anomaly_detection: false,
                ..base
            },
        }
    }

    /// Merge a JSON config file over the profile defaults. Only fields
    /// present in the file change anything.
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        let overlay: ConfigFile = serde_json::from_reader(file).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        info!("loaded configuration from {}", path.display());
        self.apply_overlay(overlay);
        Ok(())
    }

    fn apply_overlay(&mut self, overlay: ConfigFile) {
        if let Some(v) = overlay.chunk_size {
            self.chunk_size = v;
        }
        if let Some(v) = overlay.compute_hashes {
            self.compute_hashes = v;
        }
        if let Some(v) = overlay.multiprocessing_hashes {
            self.multiprocessing_hashes = v;
        }
        if let Some(v) = overlay.hash_workers {
            self.hash_workers = Some(v);
        }
        if let Some(v) = overlay.anomaly_detection {
            self.anomaly_detection = v;
        }
        if let Some(v) = overlay.extended_attrs {
            self.extended_attrs = v;
        }
        if let Some(v) = overlay.include_deleted {
            self.include_deleted = v;
        }
        if let Some(v) = overlay.file_types_include {
            self.file_types_include = v;
        }
        if let Some(v) = overlay.file_types_exclude {
            self.file_types_exclude = v;
        }
        if let Some(v) = overlay.resident_data_cap {
            self.resident_data_cap = v;
        }
        if let Some(v) = overlay.path_separator {
            self.path_separator = v;
        }
        if let Some(v) = overlay.use_localtime {
            self.use_localtime = v;
        }
        if let Some(v) = overlay.max_path_depth {
            self.max_path_depth = v;
        }
        if let Some(v) = overlay.cluster_size {
            self.cluster_size = v;
        }
        if let Some(v) = overlay.body_use_std_times {
            self.body_use_std_times = v;
        }
    }

    pub fn effective_hash_workers(&self) -> usize {
        self.hash_workers
            .unwrap_or_else(crate::hashes::default_workers)
            .max(1)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::from_profile(Profile::Default)
    }
}

/// On-disk JSON configuration; every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub chunk_size: Option<usize>,
    pub compute_hashes: Option<bool>,
    pub multiprocessing_hashes: Option<bool>,
    pub hash_workers: Option<usize>,
    pub anomaly_detection: Option<bool>,
    pub extended_attrs: Option<bool>,
    pub include_deleted: Option<bool>,
    pub file_types_include: Option<Vec<String>>,
    pub file_types_exclude: Option<Vec<String>>,
    pub resident_data_cap: Option<usize>,
    pub path_separator: Option<char>,
    pub use_localtime: Option<bool>,
    pub max_path_depth: Option<usize>,
    pub cluster_size: Option<u64>,
    pub body_use_std_times: Option<bool>,
}
