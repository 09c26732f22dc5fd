use std::collections::BTreeMap;

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::errors::{MftError, Result};
use crate::mft::attributes::{
    decode_attribute, Attribute, AttributeType, AttributeValue, FileNameAttr, ObjectIdAttr,
    StandardInformation,
};
use crate::mft::fixup::apply_fixups;

pub const FILE_RECORD_IN_USE: u16 = 0x0001;
pub const FILE_RECORD_IS_DIRECTORY: u16 = 0x0002;
pub const FILE_RECORD_IS_EXTENSION: u16 = 0x0004;
pub const FILE_RECORD_HAS_SPECIAL_INDEX: u16 = 0x0008;

/// The NTFS root directory always lives in record 5.
pub const ROOT_RECORD: u64 = 5;

/// Fixed header at the front of every FILE record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordHeader {
    pub signature: [u8; 4],
    pub usa_offset: u16,
    pub usa_count: u16,
    pub logfile_sequence: u64,
    pub sequence: u16,
    pub hard_link_count: u16,
    pub attrs_offset: u16,
    pub flags: u16,
    pub used_size: u32,
    pub allocated_size: u32,
    pub base_record: u64,
    pub next_attr_id: u16,
    /// Stored record number, present on NTFS 3.x.
    pub record_number: u32,
}

impl RecordHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 48 {
            return Err(MftError::Truncated {
                expected: 48,
                got: data.len(),
            });
        }
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[0..4]);
        if &signature != b"FILE" && &signature != b"BAAD" {
            return Err(MftError::BadSignature { found: signature });
        }
        Ok(Self {
            signature,
            usa_offset: LittleEndian::read_u16(&data[4..6]),
            usa_count: LittleEndian::read_u16(&data[6..8]),
            logfile_sequence: LittleEndian::read_u64(&data[8..16]),
            sequence: LittleEndian::read_u16(&data[16..18]),
            hard_link_count: LittleEndian::read_u16(&data[18..20]),
            attrs_offset: LittleEndian::read_u16(&data[20..22]),
            flags: LittleEndian::read_u16(&data[22..24]),
            used_size: LittleEndian::read_u32(&data[24..28]),
            allocated_size: LittleEndian::read_u32(&data[28..32]),
            base_record: LittleEndian::read_u64(&data[32..40]),
            next_attr_id: LittleEndian::read_u16(&data[40..42]),
            record_number: LittleEndian::read_u32(&data[44..48]),
        })
    }

    pub fn is_in_use(&self) -> bool {
        self.flags & FILE_RECORD_IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & FILE_RECORD_IS_DIRECTORY != 0
    }

    pub fn is_extension(&self) -> bool {
        self.flags & FILE_RECORD_IS_EXTENSION != 0
    }

    pub fn has_special_index(&self) -> bool {
        self.flags & FILE_RECORD_HAS_SPECIAL_INDEX != 0
    }
}

/// Four hex digests over the unnamed resident $DATA stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordHashes {
    pub md5: String,
    pub sha256: String,
    pub sha512: String,
    pub crc32: String,
}

/// A fully assembled logical record: the fixed header plus attribute
/// instances bucketed by type code. Extension records are folded into
/// their base in a second pass; paths and hashes are attached later.
#[derive(Debug, Clone, Serialize)]
pub struct MftRecord {
    pub record_number: u64,
    pub signature: String,
    pub sequence: u16,
    pub hard_link_count: u16,
    pub flags: u16,
    pub used_size: u32,
    pub allocated_size: u32,
    pub base_record: u64,
    pub next_attr_id: u16,
    pub logfile_sequence: u64,
    /// Attribute instances keyed by type code; the same type may repeat.
    pub attributes: BTreeMap<u32, Vec<Attribute>>,
    /// Extension record numbers named by an $ATTRIBUTE_LIST, to be folded in.
    pub pending_extensions: Vec<u64>,
    /// Resolved by the path builder after pass 1.
    pub full_path: String,
    pub hashes: Option<RecordHashes>,
    /// Corrupt/anomaly messages, serialized joined by ';'.
    pub notes: Vec<String>,
    /// Fixup or signature trouble; attributes are best-effort or empty.
    pub corrupt: bool,
}

impl MftRecord {
    fn from_header(record_number: u64, header: &RecordHeader) -> Self {
        Self {
            record_number,
            signature: String::from_utf8_lossy(&header.signature).into_owned(),
            sequence: header.sequence,
            hard_link_count: header.hard_link_count,
            flags: header.flags,
            used_size: header.used_size,
            allocated_size: header.allocated_size,
            base_record: header.base_record,
            next_attr_id: header.next_attr_id,
            logfile_sequence: header.logfile_sequence,
            attributes: BTreeMap::new(),
            pending_extensions: Vec::new(),
            full_path: String::new(),
            hashes: None,
            notes: Vec::new(),
            corrupt: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.flags & FILE_RECORD_IN_USE != 0
    }

    pub fn is_deleted(&self) -> bool {
        !self.is_active()
    }

    /// Base records with the directory flag, or anything carrying an
    /// $INDEX_ROOT, classify as directories.
    pub fn is_directory(&self) -> bool {
        self.flags & FILE_RECORD_IS_DIRECTORY != 0 || self.has_attribute(AttributeType::IndexRoot)
    }

    pub fn is_extension(&self) -> bool {
        self.base_record != 0
    }

    /// Record number half of the base reference (the top 16 bits hold the
    /// expected sequence).
    pub fn base_record_number(&self) -> u64 {
        self.base_record & 0x0000_FFFF_FFFF_FFFF
    }

    pub fn has_attribute(&self, attr_type: AttributeType) -> bool {
        self.attributes.contains_key(&(attr_type as u32))
    }

    pub fn attributes_of(&self, attr_type: AttributeType) -> &[Attribute] {
        self.attributes
            .get(&(attr_type as u32))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn push_attribute(&mut self, attribute: Attribute) {
        self.attributes
            .entry(attribute.type_code)
            .or_default()
            .push(attribute);
    }

    pub fn standard_information(&self) -> Option<&StandardInformation> {
        self.attributes_of(AttributeType::StandardInformation)
            .iter()
            .find_map(|a| match &a.value {
                AttributeValue::StandardInformation(si) => Some(si),
                _ => None,
            })
    }

    /// The display $FILE_NAME: highest namespace priority wins.
    pub fn preferred_file_name(&self) -> Option<&FileNameAttr> {
        self.attributes_of(AttributeType::FileName)
            .iter()
            .filter_map(|a| match &a.value {
                AttributeValue::FileName(fname) => Some(fname),
                _ => None,
            })
            .max_by_key(|fname| fname.namespace.priority())
    }

    /// Shortest-priority name (the DOS 8.3 form when present).
    pub fn short_file_name(&self) -> Option<&FileNameAttr> {
        self.attributes_of(AttributeType::FileName)
            .iter()
            .filter_map(|a| match &a.value {
                AttributeValue::FileName(fname) => Some(fname),
                _ => None,
            })
            .min_by_key(|fname| fname.namespace.priority())
    }

    pub fn object_id(&self) -> Option<&ObjectIdAttr> {
        self.attributes_of(AttributeType::ObjectId)
            .iter()
            .find_map(|a| match &a.value {
                AttributeValue::ObjectId(oid) => Some(oid),
                _ => None,
            })
    }

    /// The unnamed $DATA attribute is the primary stream.
    pub fn primary_data(&self) -> Option<&Attribute> {
        self.attributes_of(AttributeType::Data)
            .iter()
            .find(|a| a.name.is_empty())
    }

    /// Named $DATA instances are alternate data streams.
    pub fn alternate_streams(&self) -> Vec<&Attribute> {
        self.attributes_of(AttributeType::Data)
            .iter()
            .filter(|a| !a.name.is_empty())
            .collect()
    }

    pub fn has_ads(&self) -> bool {
        !self.alternate_streams().is_empty()
    }

    /// Retained bytes of the unnamed resident $DATA stream, for hashing.
    pub fn resident_data(&self) -> Option<&[u8]> {
        self.primary_data().and_then(|a| match (&a.value, a.is_resident()) {
            (AttributeValue::Data(bytes), true) => Some(bytes.as_slice()),
            _ => None,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.primary_data()
            .map(|a| a.content_size())
            .or_else(|| self.preferred_file_name().map(|f| f.real_size))
            .unwrap_or(0)
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    pub fn note_error(&mut self, err: &MftError) {
        self.notes.push(format!("{}: {}", err.kind(), err));
    }
}

/// Assembles logical records from fixup-protected buffers.
///
/// Owns no shared state: every call yields an independent record, and the
/// caller owns the aggregate (folding extensions in a later pass).
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    pub sector_size: usize,
    pub resident_data_cap: usize,
}

impl Default for RecordAssembler {
    fn default() -> Self {
        Self {
            sector_size: crate::mft::fixup::DEFAULT_SECTOR_SIZE,
            resident_data_cap: 4096,
        }
    }
}

impl RecordAssembler {
    pub fn new(sector_size: usize, resident_data_cap: usize) -> Self {
        Self {
            sector_size,
            resident_data_cap,
        }
    }

    /// Decode one raw record buffer in place (fixups patch the buffer).
    ///
    /// Fails only when the signature is neither FILE nor BAAD or the
    /// buffer is too short for a header; every other problem is recorded
    /// as a note on the emitted record.
    pub fn assemble(&self, buf: &mut [u8], record_number: u64) -> Result<MftRecord> {
        let header = RecordHeader::parse(buf)?;
        let mut record = MftRecord::from_header(record_number, &header);

        if &header.signature == b"BAAD" {
            record.corrupt = true;
            record.note("BadSignature: record signature is BAAD");
        }

        if let Err(err) = apply_fixups(buf, header.usa_offset, header.usa_count, self.sector_size) {
            // Emit header fields best-effort, leave attributes empty.
            record.corrupt = true;
            record.note_error(&err);
            return Ok(record);
        }

        self.walk_attributes(buf, &header, &mut record);
        self.collect_extension_refs(&mut record);
        Ok(record)
    }

    fn walk_attributes(&self, buf: &[u8], header: &RecordHeader, record: &mut MftRecord) {
        let mut offset = header.attrs_offset as usize;
        // used_size bounds the walk; tolerate headers that lie by falling
        // back to the full record.
        let mut bound = (header.used_size as usize).min(buf.len());
        if bound < offset {
            bound = buf.len();
        }

        loop {
            match decode_attribute(buf, offset, bound, self.resident_data_cap) {
                Ok(Some(decoded)) => {
                    if let Some(note) = decoded.note {
                        record.note_error(&note);
                    }
                    record.push_attribute(decoded.attribute);
                    offset += decoded.advance;
                }
                Ok(None) => break,
                Err(err) => {
                    // The chain is unusable past this point; the anomaly
                    // pass turns this note into truncated-attributes.
                    record.note_error(&err);
                    break;
                }
            }
        }
    }

    fn collect_extension_refs(&self, record: &mut MftRecord) {
        let own = record.record_number;
        let mut refs: Vec<u64> = record
            .attributes_of(AttributeType::AttributeList)
            .iter()
            .filter_map(|a| match &a.value {
                AttributeValue::AttributeList(entries) => Some(entries),
                _ => None,
            })
            .flatten()
            .map(|entry| entry.record)
            .filter(|r| *r != own && *r != 0)
            .collect();
        refs.sort_unstable();
        refs.dedup();
        record.pending_extensions = refs;
    }

    /// Merge an extension record's attributes into its base, keeping the
    /// per-type buckets. The extension's own bookkeeping attributes stay
    /// where they are.
    pub fn fold_extension(&self, base: &mut MftRecord, extension: &MftRecord) {
        for attrs in extension.attributes.values() {
            for attr in attrs {
                base.push_attribute(attr.clone());
            }
        }
    }
}
