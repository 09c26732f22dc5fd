//! Forensic analyzer for raw NTFS Master File Table images.
//!
//! The pipeline: the streaming driver reads fixed-size records, the fixup
//! engine undoes multi-sector protection, the attribute decoder walks each
//! record's chain, the assembler produces logical records, the path
//! resolver joins them by parent reference, the optional hash pipeline
//! digests resident data, and the output layer serializes one shared row
//! schema into the forensic formats.

pub mod anomaly;
pub mod cli;
pub mod config;
pub mod errors;
pub mod hashes;
pub mod mft;
pub mod models;
pub mod output;
pub mod rules;
