//! Cross-attribute consistency checks. Each hit contributes a short flag
//! string to the record's notes; none of them stop the record from being
//! emitted.

use crate::mft::attributes::AttributeType;
use crate::mft::record::MftRecord;

pub const STD_FN_SHIFT: &str = "std-fn-shift";
pub const USEC_ZERO: &str = "usec-zero";
pub const FLAGS_INCONSISTENT: &str = "flags-inconsistent";
pub const SIZE_MISMATCH: &str = "size-mismatch";
pub const TRUNCATED_ATTRIBUTES: &str = "truncated-attributes";

#[derive(Debug, Clone)]
pub struct AnomalyChecker {
    cluster_size: u64,
}

impl AnomalyChecker {
    pub fn new(cluster_size: u64) -> Self {
        Self { cluster_size }
    }

    /// Intra-record checks, run at assembly time.
    pub fn evaluate(&self, record: &MftRecord) -> Vec<&'static str> {
        let mut flags = Vec::new();
        let si = record.standard_information();
        let fname = record.preferred_file_name();

        if let (Some(si), Some(fname)) = (si, fname) {
            // FN timestamps are set on create/rename only; a creation time
            // newer than STD's is the classic timestomp footprint.
            if let (Some(fn_created), Some(si_created)) =
                (fname.created.datetime(), si.created.datetime())
            {
                if fn_created > si_created {
                    flags.push(STD_FN_SHIFT);
                }
            }
        }

        if let Some(si) = si {
            if !si.created.is_zero() && !si.created.is_corrupt() && si.created.microseconds() == 0 {
                flags.push(USEC_ZERO);
            }
        }

        // A directory flag without an $INDEX_ROOT to back it.
        if record.flags & crate::mft::record::FILE_RECORD_IS_DIRECTORY != 0
            && !record.has_attribute(AttributeType::IndexRoot)
        {
            flags.push(FLAGS_INCONSISTENT);
        }

        if let (Some(fname), Some(data)) = (fname, record.primary_data()) {
            let diff = fname.real_size.abs_diff(data.content_size());
            if diff > self.cluster_size {
                flags.push(SIZE_MISMATCH);
            }
        }

        if record
            .notes
            .iter()
            .any(|n| n.starts_with("AttributeOverflow"))
        {
            flags.push(TRUNCATED_ATTRIBUTES);
        }

        flags
    }

    /// Deleted record whose $FILE_NAME still points at an active directory:
    /// checked in pass 2 once every potential parent exists.
    pub fn parent_conflict(&self, record: &MftRecord, parent: Option<&MftRecord>) -> bool {
        if record.is_active() {
            return false;
        }
        match (record.preferred_file_name(), parent) {
            (Some(fname), Some(parent)) => {
                parent.is_active()
                    && parent.is_directory()
                    && parent.sequence == fname.parent_sequence
            }
            _ => false,
        }
    }
}

impl Default for AnomalyChecker {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mft::builder::RecordBuilder;
    use crate::mft::record::RecordAssembler;

    // 2020-01-01T00:00:00Z
    const T2020: u64 = 132_223_104_000_000_000;
    // 2023-06-15T12:34:56.123456Z
    const T2023: u64 = 133_313_060_961_234_560;

    fn assemble(buf: &mut [u8], num: u64) -> crate::mft::record::MftRecord {
        RecordAssembler::default().assemble(buf, num).unwrap()
    }

    #[test]
    fn timestomp_shift_and_zero_usec() {
        let mut buf = RecordBuilder::new(42)
            .in_use(true)
            .standard_info(T2020)
            .file_name_created(5, 1, "stomped.exe", T2023)
            .build();
        let record = assemble(&mut buf, 42);
        let flags = AnomalyChecker::default().evaluate(&record);
        assert!(flags.contains(&STD_FN_SHIFT));
        assert!(flags.contains(&USEC_ZERO));
    }

    #[test]
    fn ordinary_record_is_clean() {
        let mut buf = RecordBuilder::new(43)
            .in_use(true)
            .standard_info(T2023)
            .file_name_created(5, 1, "normal.txt", T2020)
            .build();
        let record = assemble(&mut buf, 43);
        let flags = AnomalyChecker::default().evaluate(&record);
        assert!(flags.is_empty(), "unexpected flags: {flags:?}");
    }

    #[test]
    fn directory_flag_without_index_root() {
        let mut buf = RecordBuilder::new(44)
            .in_use(true)
            .directory(true)
            .file_name(5, 1, "fake-dir")
            .build();
        let record = assemble(&mut buf, 44);
        assert!(AnomalyChecker::default()
            .evaluate(&record)
            .contains(&FLAGS_INCONSISTENT));
    }

    #[test]
    fn fn_and_data_size_divergence() {
        let mut buf = RecordBuilder::new(45)
            .in_use(true)
            .file_name_full(5, 1, "small.txt", 1, T2023, 10)
            .nonresident_data(&[0x31, 0x10, 0x00, 0x10, 0x00, 0x00], 65536, 65000)
            .build();
        let record = assemble(&mut buf, 45);
        assert!(AnomalyChecker::default()
            .evaluate(&record)
            .contains(&SIZE_MISMATCH));
    }

    #[test]
    fn deleted_record_under_active_directory() {
        let checker = AnomalyChecker::default();
        let mut child_buf = RecordBuilder::new(50)
            .in_use(false)
            .file_name(49, 2, "gone.txt")
            .build();
        let mut parent_buf = RecordBuilder::new(49)
            .in_use(true)
            .sequence(2)
            .directory(true)
            .index_root()
            .file_name(5, 1, "holder")
            .build();
        let child = assemble(&mut child_buf, 50);
        let parent = assemble(&mut parent_buf, 49);
        assert!(checker.parent_conflict(&child, Some(&parent)));
        assert!(!checker.parent_conflict(&parent, None));
    }
}
