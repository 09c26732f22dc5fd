use std::path::PathBuf;

use clap::{ArgAction, Args, Parser};

use crate::config::{AnalysisConfig, Profile};
use crate::output::OutputFormat;

pub const EXIT_OK: i32 = 0;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_INPUT_IO: i32 = 3;
pub const EXIT_OUTPUT_IO: i32 = 4;
pub const EXIT_FATAL_PARSE: i32 = 5;

fn parse_profile(name: &str) -> Result<Profile, String> {
    Profile::from_name(name)
        .ok_or_else(|| format!("unknown profile '{name}' (default, quick, forensic, performance)"))
}

#[derive(Parser, Debug)]
#[command(name = "mftsift", version)]
#[command(about = "Parse a raw NTFS MFT image into forensic report formats")]
pub struct Cli {
    /// Raw MFT image to analyze
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub input: PathBuf,

    /// Output file (database path for --sqlite)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: PathBuf,

    #[command(flatten)]
    pub format: FormatFlags,

    /// Hash resident $DATA content (MD5, SHA-256, SHA-512, CRC-32)
    #[arg(short = 'H', long = "hash")]
    pub hash: bool,

    /// Records per in-memory batch
    #[arg(long = "chunk-size", value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Hash worker count (defaults to hardware parallelism)
    #[arg(long = "hash-processes", value_name = "N")]
    pub hash_processes: Option<usize>,

    /// Hash sequentially instead of using the worker pool
    #[arg(long = "no-multiprocessing-hashes")]
    pub no_multiprocessing_hashes: bool,

    /// Analysis profile presets
    #[arg(long = "profile", value_name = "NAME", default_value = "default",
          value_parser = parse_profile)]
    pub profile: Profile,

    /// JSON configuration file layered over the profile
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (repeatable)
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Increase debug output (repeatable)
    #[arg(short = 'd', action = ArgAction::Count)]
    pub debug: u8,
}

/// Exactly one output format; plain CSV when none is given.
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct FormatFlags {
    /// CSV output (default)
    #[arg(long)]
    pub csv: bool,
    /// JSON array output
    #[arg(long)]
    pub json: bool,
    /// XML output
    #[arg(long)]
    pub xml: bool,
    /// CSV with spreadsheet-formatted dates
    #[arg(long)]
    pub excel: bool,
    /// mactime body file
    #[arg(long)]
    pub body: bool,
    /// TSK timeline (one row per timestamp)
    #[arg(long)]
    pub timeline: bool,
    /// SQLite database
    #[arg(long)]
    pub sqlite: bool,
    /// TSK body file
    #[arg(long)]
    pub tsk: bool,
    /// log2timeline CSV
    #[arg(long)]
    pub l2t: bool,
}

impl FormatFlags {
    pub fn resolve(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.xml {
            OutputFormat::Xml
        } else if self.excel {
            OutputFormat::Excel
        } else if self.body {
            OutputFormat::Body
        } else if self.timeline {
            OutputFormat::Timeline
        } else if self.sqlite {
            OutputFormat::Sqlite
        } else if self.tsk {
            OutputFormat::Tsk
        } else if self.l2t {
            OutputFormat::L2t
        } else {
            OutputFormat::Csv
        }
    }
}

impl Cli {
    /// env_logger filter derived from the -v / -d counts.
    pub fn log_level(&self) -> &'static str {
        if self.debug >= 2 {
            "trace"
        } else if self.debug == 1 {
            "debug"
        } else if self.verbose >= 1 {
            "info"
        } else {
            "warn"
        }
    }

    /// Explicit flags win over the config file, which wins over the profile.
    pub fn apply_to_config(&self, config: &mut AnalysisConfig) {
        if self.hash {
            config.compute_hashes = true;
        }
        if let Some(chunk) = self.chunk_size {
            config.chunk_size = chunk.max(1);
        }
        if let Some(workers) = self.hash_processes {
            config.hash_workers = Some(workers.max(1));
        }
        if self.no_multiprocessing_hashes {
            config.multiprocessing_hashes = false;
        }
    }
}
