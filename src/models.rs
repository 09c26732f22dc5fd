use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::mft::attributes::{AttributeType, AttributeValue, Residency};
use crate::mft::datarun::total_clusters;
use crate::mft::record::MftRecord;
use crate::mft::time::WinTimestamp;

/// The eight timestamps kept in decoded form for the epoch-based formats
/// (body file, TSK timeline, L2T).
#[derive(Debug, Clone, Copy, Default)]
pub struct RowTimestamps {
    pub si_created: WinTimestamp,
    pub si_modified: WinTimestamp,
    pub si_accessed: WinTimestamp,
    pub si_mft_modified: WinTimestamp,
    pub fn_created: WinTimestamp,
    pub fn_modified: WinTimestamp,
    pub fn_accessed: WinTimestamp,
    pub fn_mft_modified: WinTimestamp,
}

/// Denormalized projection of one logical record, shared by every
/// serializer. Field order here is the CSV column order.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRow {
    pub record_number: u64,
    pub sequence_number: u16,
    pub is_active: bool,
    pub is_deleted: bool,
    pub is_directory: bool,
    pub has_ads: bool,
    pub parent_record_number: u64,
    pub parent_sequence_number: u16,
    pub filename: String,
    pub short_filename: String,
    pub full_path: String,

    pub si_creation_time: String,
    pub si_modification_time: String,
    pub si_mft_change_time: String,
    pub si_access_time: String,
    pub fn_creation_time: String,
    pub fn_modification_time: String,
    pub fn_mft_change_time: String,
    pub fn_access_time: String,

    pub allocated_size: u64,
    pub real_size: u64,

    pub object_id: String,
    pub birth_volume_id: String,
    pub birth_object_id: String,
    pub birth_domain_id: String,

    pub has_standard_information: bool,
    pub has_attribute_list: bool,
    pub has_file_name: bool,
    pub has_object_id: bool,
    pub has_security_descriptor: bool,
    pub has_volume_name: bool,
    pub has_volume_information: bool,
    pub has_data: bool,
    pub has_index_root: bool,
    pub has_index_allocation: bool,
    pub has_bitmap: bool,
    pub has_reparse_point: bool,
    pub has_ea_information: bool,
    pub has_ea: bool,
    pub has_logged_utility_stream: bool,

    pub attribute_list_detail: String,
    pub security_descriptor: String,
    pub volume_name: String,
    pub volume_information: String,
    pub data_detail: String,
    pub reparse_point: String,
    pub extended_attrs_detail: String,

    pub md5: String,
    pub sha256: String,
    pub sha512: String,
    pub crc32: String,

    /// Corrupt/anomaly messages joined by ';'.
    pub notes: String,

    #[serde(skip)]
    pub timestamps: RowTimestamps,
    #[serde(skip)]
    pub record_flags: u16,
}

impl OutputRow {
    pub fn from_record(record: &MftRecord, config: &AnalysisConfig) -> Self {
        let fname = record.preferred_file_name();
        let short = record.short_file_name();
        let si = record.standard_information();
        let local = config.use_localtime;

        let mut timestamps = RowTimestamps::default();
        if let Some(si) = si {
            timestamps.si_created = si.created;
            timestamps.si_modified = si.modified;
            timestamps.si_accessed = si.accessed;
            timestamps.si_mft_modified = si.mft_modified;
        }
        if let Some(fname) = fname {
            timestamps.fn_created = fname.created;
            timestamps.fn_modified = fname.modified;
            timestamps.fn_accessed = fname.accessed;
            timestamps.fn_mft_modified = fname.mft_modified;
        }

        let object_id = record.object_id();
        let guid = |g: Option<&crate::mft::attributes::Guid>| {
            g.map(|g| g.to_string()).unwrap_or_default()
        };

        let mut notes = record.notes.clone();
        for ts in [
            timestamps.si_created,
            timestamps.si_modified,
            timestamps.si_accessed,
            timestamps.si_mft_modified,
            timestamps.fn_created,
            timestamps.fn_modified,
            timestamps.fn_accessed,
            timestamps.fn_mft_modified,
        ] {
            if ts.is_corrupt() {
                notes.push(format!("MalformedTimestamp: raw value {:#x}", ts.raw));
                break;
            }
        }

        Self {
            record_number: record.record_number,
            sequence_number: record.sequence,
            is_active: record.is_active(),
            is_deleted: record.is_deleted(),
            is_directory: record.is_directory(),
            has_ads: record.has_ads(),
            parent_record_number: fname.map(|f| f.parent_record).unwrap_or(0),
            parent_sequence_number: fname.map(|f| f.parent_sequence).unwrap_or(0),
            filename: fname.map(|f| f.name.clone()).unwrap_or_default(),
            short_filename: short.map(|f| f.name.clone()).unwrap_or_default(),
            full_path: record.full_path.clone(),

            si_creation_time: timestamps.si_created.to_iso8601(local),
            si_modification_time: timestamps.si_modified.to_iso8601(local),
            si_mft_change_time: timestamps.si_mft_modified.to_iso8601(local),
            si_access_time: timestamps.si_accessed.to_iso8601(local),
            fn_creation_time: timestamps.fn_created.to_iso8601(local),
            fn_modification_time: timestamps.fn_modified.to_iso8601(local),
            fn_mft_change_time: timestamps.fn_mft_modified.to_iso8601(local),
            fn_access_time: timestamps.fn_accessed.to_iso8601(local),

            allocated_size: fname.map(|f| f.allocated_size).unwrap_or(0),
            real_size: fname.map(|f| f.real_size).unwrap_or(0),

            object_id: guid(object_id.and_then(|o| o.object_id.as_ref())),
            birth_volume_id: guid(object_id.and_then(|o| o.birth_volume_id.as_ref())),
            birth_object_id: guid(object_id.and_then(|o| o.birth_object_id.as_ref())),
            birth_domain_id: guid(object_id.and_then(|o| o.birth_domain_id.as_ref())),

            has_standard_information: record.has_attribute(AttributeType::StandardInformation),
            has_attribute_list: record.has_attribute(AttributeType::AttributeList),
            has_file_name: record.has_attribute(AttributeType::FileName),
            has_object_id: record.has_attribute(AttributeType::ObjectId),
            has_security_descriptor: record.has_attribute(AttributeType::SecurityDescriptor),
            has_volume_name: record.has_attribute(AttributeType::VolumeName),
            has_volume_information: record.has_attribute(AttributeType::VolumeInformation),
            has_data: record.has_attribute(AttributeType::Data),
            has_index_root: record.has_attribute(AttributeType::IndexRoot),
            has_index_allocation: record.has_attribute(AttributeType::IndexAllocation),
            has_bitmap: record.has_attribute(AttributeType::Bitmap),
            has_reparse_point: record.has_attribute(AttributeType::ReparsePoint),
            has_ea_information: record.has_attribute(AttributeType::EaInformation),
            has_ea: record.has_attribute(AttributeType::Ea),
            has_logged_utility_stream: record.has_attribute(AttributeType::LoggedUtilityStream),

            attribute_list_detail: attribute_list_detail(record),
            security_descriptor: security_descriptor_detail(record),
            volume_name: volume_name_detail(record),
            volume_information: volume_information_detail(record),
            data_detail: data_detail(record),
            reparse_point: reparse_detail(record),
            extended_attrs_detail: if config.extended_attrs {
                extended_attrs_detail(record)
            } else {
                String::new()
            },

            md5: record.hashes.as_ref().map(|h| h.md5.clone()).unwrap_or_default(),
            sha256: record
                .hashes
                .as_ref()
                .map(|h| h.sha256.clone())
                .unwrap_or_default(),
            sha512: record
                .hashes
                .as_ref()
                .map(|h| h.sha512.clone())
                .unwrap_or_default(),
            crc32: record
                .hashes
                .as_ref()
                .map(|h| h.crc32.clone())
                .unwrap_or_default(),

            notes: notes.join("; "),
            timestamps,
            record_flags: record.flags,
        }
    }

    /// Octal rendering of the header flags, the body-file "mode" column.
    pub fn mode_string(&self) -> String {
        format!("{:04o}", self.record_flags)
    }
}

fn attribute_list_detail(record: &MftRecord) -> String {
    let entries: Vec<String> = record
        .attributes_of(AttributeType::AttributeList)
        .iter()
        .filter_map(|a| match &a.value {
            AttributeValue::AttributeList(entries) => Some(entries),
            _ => None,
        })
        .flatten()
        .map(|e| format!("{:#x}@{}", e.attr_type, e.record))
        .collect();
    entries.join(",")
}

fn security_descriptor_detail(record: &MftRecord) -> String {
    record
        .attributes_of(AttributeType::SecurityDescriptor)
        .iter()
        .find_map(|a| match &a.value {
            AttributeValue::SecurityDescriptor(sd) => {
                let mut parts = Vec::new();
                if !sd.owner_sid.is_empty() {
                    parts.push(format!("owner={}", sd.owner_sid));
                }
                if !sd.group_sid.is_empty() {
                    parts.push(format!("group={}", sd.group_sid));
                }
                if !sd.dacl.is_empty() {
                    parts.push(format!("dacl[{}]", sd.dacl));
                }
                if !sd.sacl.is_empty() {
                    parts.push(format!("sacl[{}]", sd.sacl));
                }
                Some(parts.join(" "))
            }
            _ => None,
        })
        .unwrap_or_default()
}

fn volume_name_detail(record: &MftRecord) -> String {
    record
        .attributes_of(AttributeType::VolumeName)
        .iter()
        .find_map(|a| match &a.value {
            AttributeValue::VolumeName(name) => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn volume_information_detail(record: &MftRecord) -> String {
    record
        .attributes_of(AttributeType::VolumeInformation)
        .iter()
        .find_map(|a| match &a.value {
            AttributeValue::VolumeInformation(vi) => Some(format!(
                "NTFS v{}.{} flags={:#06x}",
                vi.major_version, vi.minor_version, vi.flags
            )),
            _ => None,
        })
        .unwrap_or_default()
}

fn data_detail(record: &MftRecord) -> String {
    let mut parts = Vec::new();
    if let Some(data) = record.primary_data() {
        match &data.residency {
            Residency::Resident { content_size, .. } => {
                parts.push(format!("resident {content_size} bytes"));
            }
            Residency::NonResident {
                allocated_size,
                real_size,
                runs,
                ..
            } => {
                parts.push(format!(
                    "non-resident {real_size}/{allocated_size} bytes, {} runs, {} clusters",
                    runs.len(),
                    total_clusters(runs)
                ));
            }
        }
    }
    for ads in record.alternate_streams() {
        parts.push(format!("ads:{}", ads.name));
    }
    parts.join(" ")
}

fn reparse_detail(record: &MftRecord) -> String {
    record
        .attributes_of(AttributeType::ReparsePoint)
        .iter()
        .find_map(|a| match &a.value {
            AttributeValue::ReparsePoint(rp) => Some(rp.describe()),
            _ => None,
        })
        .unwrap_or_default()
}

fn extended_attrs_detail(record: &MftRecord) -> String {
    let mut parts = Vec::new();
    for attr in record.attributes_of(AttributeType::EaInformation) {
        if let AttributeValue::EaInformation(info) = &attr.value {
            parts.push(format!(
                "ea-info packed={} unpacked={} need={}",
                info.packed_size, info.unpacked_size, info.need_ea_count
            ));
        }
    }
    for attr in record.attributes_of(AttributeType::Ea) {
        if let AttributeValue::Ea(ea) = &attr.value {
            parts.push(format!("ea:{}={}B", ea.name, ea.value_length));
        }
    }
    for attr in record.attributes_of(AttributeType::LoggedUtilityStream) {
        if let AttributeValue::LoggedUtilityStream(size) = &attr.value {
            parts.push(format!("utility-stream {size}B"));
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mft::builder::RecordBuilder;
    use crate::mft::record::RecordAssembler;

    const T2020: u64 = 132_223_104_000_000_000;

    fn row_for(buf: &mut [u8], num: u64) -> OutputRow {
        let mut record = RecordAssembler::default().assemble(buf, num).unwrap();
        record.full_path = format!("\\file-{num}");
        OutputRow::from_record(&record, &AnalysisConfig::default())
    }

    #[test]
    fn deleted_file_projection() {
        let mut buf = RecordBuilder::new(42)
            .in_use(false)
            .sequence(3)
            .standard_info(T2020)
            .file_name(5, 1, "secret.txt")
            .build();
        let row = row_for(&mut buf, 42);
        assert_eq!(row.record_number, 42);
        assert!(!row.is_active);
        assert!(row.is_deleted);
        assert_eq!(row.filename, "secret.txt");
        assert_eq!(row.parent_record_number, 5);
        assert_eq!(row.si_creation_time, "2020-01-01T00:00:00+00:00");
        assert_eq!(row.mode_string(), "0000");
    }

    #[test]
    fn presence_flags_and_details() {
        let mut buf = RecordBuilder::new(7)
            .in_use(true)
            .standard_info(T2020)
            .file_name(5, 1, "carrier.bin")
            .resident_data(b"payload")
            .named_resident_data("Zone.Identifier", b"[ZoneTransfer]")
            .object_id([0x11; 16])
            .build();
        let row = row_for(&mut buf, 7);
        assert!(row.has_standard_information);
        assert!(row.has_data);
        assert!(row.has_object_id);
        assert!(!row.has_reparse_point);
        assert!(row.has_ads);
        assert!(row.data_detail.contains("resident 7 bytes"));
        assert!(row.data_detail.contains("ads:Zone.Identifier"));
        assert_eq!(row.object_id, "11111111-1111-1111-1111-111111111111");
        assert!(row.birth_volume_id.is_empty());
    }

    #[test]
    fn notes_join_with_semicolons() {
        let mut buf = RecordBuilder::new(8)
            .in_use(true)
            .file_name(5, 1, "x")
            .build();
        let mut record = RecordAssembler::default().assemble(&mut buf, 8).unwrap();
        record.note("first");
        record.note("second");
        let row = OutputRow::from_record(&record, &AnalysisConfig::default());
        assert_eq!(row.notes, "first; second");
    }
}
