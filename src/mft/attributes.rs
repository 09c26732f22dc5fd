use std::convert::TryFrom;
use std::fmt;

use serde::Serialize;

use crate::errors::{MftError, Result};
use crate::mft::bytes::ByteReader;
use crate::mft::datarun::{decode_data_runs, DataRun};
use crate::mft::time::WinTimestamp;

pub const END_OF_ATTRIBUTES: u32 = 0xFFFF_FFFF;

const REPARSE_TAG_MOUNT_POINT: u32 = 0xA000_0003;
const REPARSE_TAG_SYMLINK: u32 = 0xA000_000C;

/// NTFS attribute type codes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AttributeType {
    StandardInformation = 0x10,
    AttributeList = 0x20,
    FileName = 0x30,
    ObjectId = 0x40,
    SecurityDescriptor = 0x50,
    VolumeName = 0x60,
    VolumeInformation = 0x70,
    Data = 0x80,
    IndexRoot = 0x90,
    IndexAllocation = 0xA0,
    Bitmap = 0xB0,
    ReparsePoint = 0xC0,
    EaInformation = 0xD0,
    Ea = 0xE0,
    LoggedUtilityStream = 0x100,
}

impl AttributeType {
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::StandardInformation => "$STANDARD_INFORMATION",
            AttributeType::AttributeList => "$ATTRIBUTE_LIST",
            AttributeType::FileName => "$FILE_NAME",
            AttributeType::ObjectId => "$OBJECT_ID",
            AttributeType::SecurityDescriptor => "$SECURITY_DESCRIPTOR",
            AttributeType::VolumeName => "$VOLUME_NAME",
            AttributeType::VolumeInformation => "$VOLUME_INFORMATION",
            AttributeType::Data => "$DATA",
            AttributeType::IndexRoot => "$INDEX_ROOT",
            AttributeType::IndexAllocation => "$INDEX_ALLOCATION",
            AttributeType::Bitmap => "$BITMAP",
            AttributeType::ReparsePoint => "$REPARSE_POINT",
            AttributeType::EaInformation => "$EA_INFORMATION",
            AttributeType::Ea => "$EA",
            AttributeType::LoggedUtilityStream => "$LOGGED_UTILITY_STREAM",
        }
    }
}

impl TryFrom<u32> for AttributeType {
    type Error = MftError;

    fn try_from(value: u32) -> Result<Self> {
        use AttributeType::*;
        Ok(match value {
            0x10 => StandardInformation,
            0x20 => AttributeList,
            0x30 => FileName,
            0x40 => ObjectId,
            0x50 => SecurityDescriptor,
            0x60 => VolumeName,
            0x70 => VolumeInformation,
            0x80 => Data,
            0x90 => IndexRoot,
            0xA0 => IndexAllocation,
            0xB0 => Bitmap,
            0xC0 => ReparsePoint,
            0xD0 => EaInformation,
            0xE0 => Ea,
            0x100 => LoggedUtilityStream,
            other => return Err(MftError::UnknownAttributeType(other)),
        })
    }
}

/// $FILE_NAME namespace. Display preference: Win32+DOS > Win32 > POSIX > DOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum FileNamespace {
    Posix = 0,
    Win32 = 1,
    Dos = 2,
    Win32AndDos = 3,
}

impl FileNamespace {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FileNamespace::Posix),
            1 => Some(FileNamespace::Win32),
            2 => Some(FileNamespace::Dos),
            3 => Some(FileNamespace::Win32AndDos),
            _ => None,
        }
    }

    pub fn priority(self) -> u8 {
        match self {
            FileNamespace::Win32AndDos => 3,
            FileNamespace::Win32 => 2,
            FileNamespace::Posix => 1,
            FileNamespace::Dos => 0,
        }
    }
}

/// A 16-byte NTFS GUID. The first three fields are stored little-endian,
/// the last two big-endian, matching the standard string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    pub fn from_slice(raw: &[u8]) -> Option<Self> {
        if raw.len() < 16 {
            return None;
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&raw[..16]);
        Some(Guid(bytes))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12], b[13],
            b[14], b[15]
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StandardInformation {
    pub created: WinTimestamp,
    pub modified: WinTimestamp,
    pub mft_modified: WinTimestamp,
    pub accessed: WinTimestamp,
    pub file_attributes: u32,
    pub max_versions: u32,
    pub version: u32,
    pub class_id: u32,
    pub owner_id: u32,
    pub security_id: u32,
    pub quota_charged: u64,
    pub usn: u64,
}

impl StandardInformation {
    /// Length must be at least 48; the NTFS 3.x fields (owner, security,
    /// quota, USN) appear only when the payload reaches 72 bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let r = ByteReader::new(data);
        if data.len() < 48 {
            return Err(MftError::OutOfBounds {
                offset: 0,
                length: 48,
                buffer: data.len(),
            });
        }
        let mut si = Self {
            created: WinTimestamp::from_filetime(r.read_u64(0)?),
            modified: WinTimestamp::from_filetime(r.read_u64(8)?),
            mft_modified: WinTimestamp::from_filetime(r.read_u64(16)?),
            accessed: WinTimestamp::from_filetime(r.read_u64(24)?),
            file_attributes: r.read_u32(32)?,
            max_versions: r.read_u32(36)?,
            version: r.read_u32(40)?,
            class_id: r.read_u32(44)?,
            owner_id: 0,
            security_id: 0,
            quota_charged: 0,
            usn: 0,
        };
        if data.len() >= 72 {
            si.owner_id = r.read_u32(48)?;
            si.security_id = r.read_u32(52)?;
            si.quota_charged = r.read_u64(56)?;
            si.usn = r.read_u64(64)?;
        }
        Ok(si)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileNameAttr {
    pub parent_record: u64,
    pub parent_sequence: u16,
    pub created: WinTimestamp,
    pub modified: WinTimestamp,
    pub mft_modified: WinTimestamp,
    pub accessed: WinTimestamp,
    pub allocated_size: u64,
    pub real_size: u64,
    pub flags: u32,
    pub namespace: FileNamespace,
    pub name: String,
}

impl FileNameAttr {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let r = ByteReader::new(data);
        let parent_raw = r.read_u64(0)?;
        let name_len = r.read_u8(64)? as usize;
        let namespace = FileNamespace::from_u8(r.read_u8(65)?).unwrap_or(FileNamespace::Posix);
        let name = r.read_utf16(66, name_len)?;
        Ok(Self {
            parent_record: parent_raw & 0x0000_FFFF_FFFF_FFFF,
            parent_sequence: (parent_raw >> 48) as u16,
            created: WinTimestamp::from_filetime(r.read_u64(8)?),
            modified: WinTimestamp::from_filetime(r.read_u64(16)?),
            mft_modified: WinTimestamp::from_filetime(r.read_u64(24)?),
            accessed: WinTimestamp::from_filetime(r.read_u64(32)?),
            allocated_size: r.read_u64(40)?,
            real_size: r.read_u64(48)?,
            flags: r.read_u32(56)?,
            namespace,
            name,
        })
    }
}

/// One entry of an $ATTRIBUTE_LIST: where to find a given attribute of the
/// base record, possibly in an extension record.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeListEntry {
    pub attr_type: u32,
    pub name: String,
    pub starting_vcn: u64,
    pub record: u64,
}

fn parse_attribute_list(data: &[u8]) -> Result<Vec<AttributeListEntry>> {
    let r = ByteReader::new(data);
    let mut entries = Vec::new();
    let mut off = 0usize;
    while off + 26 <= data.len() {
        let attr_type = r.read_u32(off)?;
        if attr_type == 0 {
            break;
        }
        let entry_len = r.read_u16(off + 4)? as usize;
        if entry_len == 0 || off + entry_len > data.len() {
            break;
        }
        let name_len = r.read_u8(off + 6)? as usize;
        let name_off = r.read_u8(off + 7)? as usize;
        let name = if name_len > 0 {
            r.read_utf16(off + name_off, name_len).unwrap_or_default()
        } else {
            String::new()
        };
        entries.push(AttributeListEntry {
            attr_type,
            name,
            starting_vcn: r.read_u64(off + 8)?,
            record: r.read_u64(off + 16)? & 0x0000_FFFF_FFFF_FFFF,
        });
        off += entry_len;
    }
    Ok(entries)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectIdAttr {
    pub object_id: Option<Guid>,
    pub birth_volume_id: Option<Guid>,
    pub birth_object_id: Option<Guid>,
    pub birth_domain_id: Option<Guid>,
}

impl ObjectIdAttr {
    /// Only the object id itself is mandatory; the birth GUIDs appear only
    /// when the payload is long enough.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(MftError::OutOfBounds {
                offset: 0,
                length: 16,
                buffer: data.len(),
            });
        }
        Ok(Self {
            object_id: Guid::from_slice(&data[0..]),
            birth_volume_id: data.get(16..).and_then(Guid::from_slice),
            birth_object_id: data.get(32..).and_then(Guid::from_slice),
            birth_domain_id: data.get(48..).and_then(Guid::from_slice),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityDescriptorAttr {
    pub revision: u8,
    pub control: u16,
    pub owner_sid: String,
    pub group_sid: String,
    pub dacl: String,
    pub sacl: String,
}

fn parse_sid(data: &[u8], offset: usize) -> Option<String> {
    let r = ByteReader::new(data);
    let revision = r.read_u8(offset).ok()?;
    let count = r.read_u8(offset + 1).ok()? as usize;
    if revision != 1 || count > 15 {
        return None;
    }
    let auth_bytes = r.read_bytes(offset + 2, 6).ok()?;
    let mut authority = 0u64;
    for b in auth_bytes {
        authority = (authority << 8) | u64::from(*b);
    }
    let mut sid = format!("S-{revision}-{authority}");
    for i in 0..count {
        let sub = r.read_u32(offset + 8 + i * 4).ok()?;
        sid.push_str(&format!("-{sub}"));
    }
    Some(sid)
}

fn parse_acl_summary(data: &[u8], offset: usize) -> Option<String> {
    let r = ByteReader::new(data);
    let revision = r.read_u8(offset).ok()?;
    let size = r.read_u16(offset + 2).ok()?;
    let ace_count = r.read_u16(offset + 4).ok()?;
    Some(format!("rev={revision} aces={ace_count} size={size}"))
}

impl SecurityDescriptorAttr {
    /// Best-effort: a malformed owner/group/ACL yields an empty field
    /// rather than failing the whole attribute.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let r = ByteReader::new(data);
        if data.len() < 20 {
            return Err(MftError::OutOfBounds {
                offset: 0,
                length: 20,
                buffer: data.len(),
            });
        }
        let owner_offset = r.read_u32(4)? as usize;
        let group_offset = r.read_u32(8)? as usize;
        let sacl_offset = r.read_u32(12)? as usize;
        let dacl_offset = r.read_u32(16)? as usize;
        Ok(Self {
            revision: r.read_u8(0)?,
            control: r.read_u16(2)?,
            owner_sid: (owner_offset > 0)
                .then(|| parse_sid(data, owner_offset))
                .flatten()
                .unwrap_or_default(),
            group_sid: (group_offset > 0)
                .then(|| parse_sid(data, group_offset))
                .flatten()
                .unwrap_or_default(),
            dacl: (dacl_offset > 0)
                .then(|| parse_acl_summary(data, dacl_offset))
                .flatten()
                .unwrap_or_default(),
            sacl: (sacl_offset > 0)
                .then(|| parse_acl_summary(data, sacl_offset))
                .flatten()
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeInformationAttr {
    pub major_version: u8,
    pub minor_version: u8,
    pub flags: u16,
}

impl VolumeInformationAttr {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let r = ByteReader::new(data);
        Ok(Self {
            major_version: r.read_u8(8)?,
            minor_version: r.read_u8(9)?,
            flags: r.read_u16(10)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexRootAttr {
    pub indexed_attr_type: u32,
    pub collation_rule: u32,
    pub index_block_size: u32,
    pub clusters_per_block: u8,
}

impl IndexRootAttr {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let r = ByteReader::new(data);
        Ok(Self {
            indexed_attr_type: r.read_u32(0)?,
            collation_rule: r.read_u32(4)?,
            index_block_size: r.read_u32(8)?,
            clusters_per_block: r.read_u8(12)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReparsePointAttr {
    pub tag: u32,
    pub data_length: u16,
    pub substitute_name: Option<String>,
    pub print_name: Option<String>,
}

impl ReparsePointAttr {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let r = ByteReader::new(data);
        let tag = r.read_u32(0)?;
        let data_length = r.read_u16(4)?;
        let mut attr = Self {
            tag,
            data_length,
            substitute_name: None,
            print_name: None,
        };
        // Path buffers exist only for the two Microsoft link tags. Symbolic
        // links carry a 4-byte flags field before the buffer, junctions do
        // not.
        let buffer_base = match tag {
            REPARSE_TAG_SYMLINK => Some(20),
            REPARSE_TAG_MOUNT_POINT => Some(16),
            _ => None,
        };
        if let Some(base) = buffer_base {
            let sub_off = r.read_u16(8)? as usize;
            let sub_len = r.read_u16(10)? as usize;
            let print_off = r.read_u16(12)? as usize;
            let print_len = r.read_u16(14)? as usize;
            attr.substitute_name = r.read_utf16(base + sub_off, sub_len / 2).ok();
            attr.print_name = r.read_utf16(base + print_off, print_len / 2).ok();
        }
        Ok(attr)
    }

    pub fn describe(&self) -> String {
        match (&self.substitute_name, &self.print_name) {
            (Some(sub), Some(print)) if !print.is_empty() => {
                format!("reparse tag {:#010x} -> {} ({})", self.tag, sub, print)
            }
            (Some(sub), _) => format!("reparse tag {:#010x} -> {}", self.tag, sub),
            _ => format!("reparse tag {:#010x}", self.tag),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EaInformationAttr {
    pub packed_size: u16,
    pub need_ea_count: u16,
    pub unpacked_size: u32,
}

impl EaInformationAttr {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let r = ByteReader::new(data);
        Ok(Self {
            packed_size: r.read_u16(0)?,
            need_ea_count: r.read_u16(2)?,
            unpacked_size: r.read_u32(4)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EaAttr {
    pub flags: u8,
    pub name: String,
    pub value_length: u16,
}

impl EaAttr {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let r = ByteReader::new(data);
        let flags = r.read_u8(4)?;
        let name_len = r.read_u8(5)? as usize;
        let value_length = r.read_u16(6)?;
        let name = String::from_utf8_lossy(r.read_bytes(8, name_len)?).into_owned();
        Ok(Self {
            flags,
            name,
            value_length,
        })
    }
}

/// Decoded payload of one attribute, tagged by type.
#[derive(Debug, Clone, Serialize)]
pub enum AttributeValue {
    StandardInformation(StandardInformation),
    AttributeList(Vec<AttributeListEntry>),
    FileName(FileNameAttr),
    ObjectId(ObjectIdAttr),
    SecurityDescriptor(SecurityDescriptorAttr),
    VolumeName(String),
    VolumeInformation(VolumeInformationAttr),
    /// Retained resident $DATA content, truncated at the configured cap.
    Data(Vec<u8>),
    IndexRoot(IndexRootAttr),
    IndexAllocation,
    Bitmap,
    ReparsePoint(ReparsePointAttr),
    EaInformation(EaInformationAttr),
    Ea(EaAttr),
    LoggedUtilityStream(u64),
    /// Type is known but the payload failed to decode.
    Corrupt,
    /// Type code outside the known space; skipped by declared length.
    Unknown(u32),
}

/// Residency-specific header fields.
#[derive(Debug, Clone, Serialize)]
pub enum Residency {
    Resident {
        content_size: u32,
        content_offset: u16,
    },
    NonResident {
        starting_vcn: u64,
        ending_vcn: u64,
        compression_unit: u16,
        allocated_size: u64,
        real_size: u64,
        initialized_size: u64,
        runs: Vec<DataRun>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub type_code: u32,
    pub name: String,
    pub length: u32,
    pub flags: u16,
    pub id: u16,
    pub residency: Residency,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn attr_type(&self) -> Option<AttributeType> {
        AttributeType::try_from(self.type_code).ok()
    }

    pub fn is_resident(&self) -> bool {
        matches!(self.residency, Residency::Resident { .. })
    }

    /// Logical content size regardless of residency.
    pub fn content_size(&self) -> u64 {
        match &self.residency {
            Residency::Resident { content_size, .. } => u64::from(*content_size),
            Residency::NonResident { real_size, .. } => *real_size,
        }
    }
}

/// Outcome of decoding one attribute: the attribute itself, how far to
/// advance, and any recoverable decode error to surface in record notes.
pub struct DecodedAttribute {
    pub attribute: Attribute,
    pub advance: usize,
    pub note: Option<MftError>,
}

/// Decode the attribute whose header begins at `offset`. Returns `None`
/// at the 0xFFFFFFFF end marker or a zero total length.
pub fn decode_attribute(
    buf: &[u8],
    offset: usize,
    bound: usize,
    resident_data_cap: usize,
) -> Result<Option<DecodedAttribute>> {
    let r = ByteReader::new(buf);
    if offset + 8 > bound {
        return Ok(None);
    }
    let type_code = r.read_u32(offset)?;
    if type_code == END_OF_ATTRIBUTES || type_code == 0 {
        return Ok(None);
    }
    let length = r.read_u32(offset + 4)?;
    if length == 0 {
        return Ok(None);
    }
    let end = offset
        .checked_add(length as usize)
        .filter(|e| *e <= bound)
        .ok_or(MftError::AttributeOverflow { offset, length })?;

    let non_resident = r.read_u8(offset + 8)? != 0;
    let name_length = r.read_u8(offset + 9)? as usize;
    let name_offset = r.read_u16(offset + 10)? as usize;
    let flags = r.read_u16(offset + 12)?;
    let id = r.read_u16(offset + 14)?;
    let name = if name_length > 0 {
        r.read_utf16(offset + name_offset, name_length)
            .unwrap_or_default()
    } else {
        String::new()
    };

    let mut note = None;
    let (residency, content): (Residency, &[u8]) = if non_resident {
        let run_offset = r.read_u16(offset + 32)? as usize;
        let run_slice = if offset + run_offset <= end {
            &buf[offset + run_offset..end]
        } else {
            &[]
        };
        let runs = match decode_data_runs(run_slice) {
            Ok(runs) => runs,
            Err(err) => {
                note = Some(err);
                Vec::new()
            }
        };
        (
            Residency::NonResident {
                starting_vcn: r.read_u64(offset + 16)?,
                ending_vcn: r.read_u64(offset + 24)?,
                compression_unit: r.read_u16(offset + 34)?,
                allocated_size: r.read_u64(offset + 40)?,
                real_size: r.read_u64(offset + 48)?,
                initialized_size: r.read_u64(offset + 56)?,
                runs,
            },
            &[],
        )
    } else {
        let content_size = r.read_u32(offset + 16)?;
        let content_offset = r.read_u16(offset + 20)?;
        let start = offset + content_offset as usize;
        let stop = (start.saturating_add(content_size as usize)).min(end);
        let content = if start <= stop && stop <= buf.len() {
            &buf[start..stop]
        } else {
            &[]
        };
        (
            Residency::Resident {
                content_size,
                content_offset,
            },
            content,
        )
    };

    let value = match AttributeType::try_from(type_code) {
        Ok(attr_type) => match decode_payload(attr_type, content, &residency, resident_data_cap) {
            Ok(value) => value,
            Err(err) => {
                note = Some(err);
                AttributeValue::Corrupt
            }
        },
        Err(err) => {
            note = Some(err);
            AttributeValue::Unknown(type_code)
        }
    };

    Ok(Some(DecodedAttribute {
        attribute: Attribute {
            type_code,
            name,
            length,
            flags,
            id,
            residency,
            value,
        },
        advance: length as usize,
        note,
    }))
}

fn decode_payload(
    attr_type: AttributeType,
    content: &[u8],
    residency: &Residency,
    resident_data_cap: usize,
) -> Result<AttributeValue> {
    Ok(match attr_type {
        AttributeType::StandardInformation => {
            AttributeValue::StandardInformation(StandardInformation::parse(content)?)
        }
        AttributeType::AttributeList => {
            AttributeValue::AttributeList(parse_attribute_list(content)?)
        }
        AttributeType::FileName => AttributeValue::FileName(FileNameAttr::parse(content)?),
        AttributeType::ObjectId => AttributeValue::ObjectId(ObjectIdAttr::parse(content)?),
        AttributeType::SecurityDescriptor => {
            AttributeValue::SecurityDescriptor(SecurityDescriptorAttr::parse(content)?)
        }
        AttributeType::VolumeName => {
            let units: Vec<u16> = content
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            AttributeValue::VolumeName(
                String::from_utf16_lossy(&units)
                    .trim_end_matches('\0')
                    .to_string(),
            )
        }
        AttributeType::VolumeInformation => {
            AttributeValue::VolumeInformation(VolumeInformationAttr::parse(content)?)
        }
        AttributeType::Data => {
            let kept = match residency {
                Residency::Resident { .. } => {
                    content[..content.len().min(resident_data_cap)].to_vec()
                }
                Residency::NonResident { .. } => Vec::new(),
            };
            AttributeValue::Data(kept)
        }
        AttributeType::IndexRoot => AttributeValue::IndexRoot(IndexRootAttr::parse(content)?),
        AttributeType::IndexAllocation => AttributeValue::IndexAllocation,
        AttributeType::Bitmap => AttributeValue::Bitmap,
        AttributeType::ReparsePoint => {
            AttributeValue::ReparsePoint(ReparsePointAttr::parse(content)?)
        }
        AttributeType::EaInformation => {
            AttributeValue::EaInformation(EaInformationAttr::parse(content)?)
        }
        AttributeType::Ea => AttributeValue::Ea(EaAttr::parse(content)?),
        AttributeType::LoggedUtilityStream => {
            AttributeValue::LoggedUtilityStream(content.len() as u64)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    fn si_payload(created: u64) -> Vec<u8> {
        let mut data = vec![0u8; 72];
        LittleEndian::write_u64(&mut data[0..8], created);
        LittleEndian::write_u64(&mut data[8..16], created + 10_000_000);
        LittleEndian::write_u64(&mut data[16..24], created + 20_000_000);
        LittleEndian::write_u64(&mut data[24..32], created + 30_000_000);
        LittleEndian::write_u32(&mut data[32..36], 0x20); // archive
        LittleEndian::write_u32(&mut data[52..56], 261); // security id
        LittleEndian::write_u64(&mut data[64..72], 0xABCD);
        data
    }

    #[test]
    fn standard_information_long_form() {
        let si = StandardInformation::parse(&si_payload(132_223_104_000_000_000)).unwrap();
        assert_eq!(si.file_attributes, 0x20);
        assert_eq!(si.security_id, 261);
        assert_eq!(si.usn, 0xABCD);
        assert_eq!(si.created.to_iso8601(false), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn standard_information_short_form_has_no_ntfs3_fields() {
        let si = StandardInformation::parse(&si_payload(0)[..48]).unwrap();
        assert_eq!(si.security_id, 0);
        assert_eq!(si.usn, 0);
        assert!(StandardInformation::parse(&[0u8; 40]).is_err());
    }

    fn fn_payload(parent: u64, seq: u16, namespace: u8, name: &str) -> Vec<u8> {
        let encoded: Vec<u16> = name.encode_utf16().collect();
        let mut data = vec![0u8; 66 + encoded.len() * 2];
        LittleEndian::write_u64(&mut data[0..8], parent | (u64::from(seq) << 48));
        LittleEndian::write_u64(&mut data[40..48], 4096);
        LittleEndian::write_u64(&mut data[48..56], 1234);
        data[64] = encoded.len() as u8;
        data[65] = namespace;
        for (i, unit) in encoded.iter().enumerate() {
            LittleEndian::write_u16(&mut data[66 + i * 2..68 + i * 2], *unit);
        }
        data
    }

    #[test]
    fn file_name_parent_reference_split() {
        let fname = FileNameAttr::parse(&fn_payload(5, 7, 1, "secret.txt")).unwrap();
        assert_eq!(fname.parent_record, 5);
        assert_eq!(fname.parent_sequence, 7);
        assert_eq!(fname.name, "secret.txt");
        assert_eq!(fname.namespace, FileNamespace::Win32);
        assert_eq!(fname.real_size, 1234);
    }

    #[test]
    fn namespace_priority_ordering() {
        assert!(FileNamespace::Win32AndDos.priority() > FileNamespace::Win32.priority());
        assert!(FileNamespace::Win32.priority() > FileNamespace::Posix.priority());
        assert!(FileNamespace::Posix.priority() > FileNamespace::Dos.priority());
    }

    #[test]
    fn guid_mixed_endian_rendering() {
        let guid = Guid([
            0x78, 0x56, 0x34, 0x12, 0xCD, 0xAB, 0xF0, 0xDE, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB,
            0xCD, 0xEF,
        ]);
        assert_eq!(guid.to_string(), "12345678-abcd-def0-0123-456789abcdef");
    }

    #[test]
    fn object_id_optional_birth_guids() {
        let attr = ObjectIdAttr::parse(&[0xAA; 16]).unwrap();
        assert!(attr.object_id.is_some());
        assert!(attr.birth_volume_id.is_none());
        let attr = ObjectIdAttr::parse(&[0xAA; 64]).unwrap();
        assert!(attr.birth_domain_id.is_some());
        assert!(ObjectIdAttr::parse(&[0u8; 8]).is_err());
    }

    #[test]
    fn sid_rendering() {
        // S-1-5-21-100-200
        let mut data = vec![0u8; 40];
        data[20] = 1; // revision
        data[21] = 3; // sub-authority count
        data[27] = 5; // authority, big-endian
        LittleEndian::write_u32(&mut data[28..32], 21);
        LittleEndian::write_u32(&mut data[32..36], 100);
        LittleEndian::write_u32(&mut data[36..40], 200);
        assert_eq!(parse_sid(&data, 20).unwrap(), "S-1-5-21-100-200");
    }

    #[test]
    fn attribute_list_entries() {
        let mut data = vec![0u8; 32];
        LittleEndian::write_u32(&mut data[0..4], 0x80);
        LittleEndian::write_u16(&mut data[4..6], 32);
        LittleEndian::write_u64(&mut data[16..24], 40 | (3u64 << 48));
        let entries = parse_attribute_list(&data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attr_type, 0x80);
        assert_eq!(entries[0].record, 40);
    }

    fn resident_attr(type_code: u32, payload: &[u8]) -> Vec<u8> {
        let content_offset = 24u16;
        let length = (content_offset as usize + payload.len() + 7) & !7;
        let mut buf = vec![0u8; length + 8];
        LittleEndian::write_u32(&mut buf[0..4], type_code);
        LittleEndian::write_u32(&mut buf[4..8], length as u32);
        buf[8] = 0; // resident
        LittleEndian::write_u32(&mut buf[16..20], payload.len() as u32);
        LittleEndian::write_u16(&mut buf[20..22], content_offset);
        buf[24..24 + payload.len()].copy_from_slice(payload);
        LittleEndian::write_u32(&mut buf[length..length + 4], END_OF_ATTRIBUTES);
        buf
    }

    #[test]
    fn decode_resident_standard_information() {
        let buf = resident_attr(0x10, &si_payload(132_223_104_000_000_000));
        let decoded = decode_attribute(&buf, 0, buf.len(), 1024).unwrap().unwrap();
        assert!(decoded.note.is_none());
        assert!(matches!(
            decoded.attribute.value,
            AttributeValue::StandardInformation(_)
        ));
    }

    #[test]
    fn corrupt_payload_is_survivable() {
        // SI payload too short: attribute kept, value marked corrupt.
        let buf = resident_attr(0x10, &[0u8; 16]);
        let decoded = decode_attribute(&buf, 0, buf.len(), 1024).unwrap().unwrap();
        assert!(decoded.note.is_some());
        assert!(matches!(decoded.attribute.value, AttributeValue::Corrupt));
    }

    #[test]
    fn unknown_type_is_skipped_with_note() {
        let buf = resident_attr(0xF4, &[1, 2, 3]);
        let decoded = decode_attribute(&buf, 0, buf.len(), 1024).unwrap().unwrap();
        assert!(matches!(
            decoded.attribute.value,
            AttributeValue::Unknown(0xF4)
        ));
        assert_eq!(decoded.advance as u32, decoded.attribute.length);
    }

    #[test]
    fn end_marker_stops_the_walk() {
        let mut buf = vec![0u8; 8];
        LittleEndian::write_u32(&mut buf[0..4], END_OF_ATTRIBUTES);
        assert!(decode_attribute(&buf, 0, buf.len(), 1024)
            .unwrap()
            .is_none());
    }

    #[test]
    fn overflowing_attribute_is_an_error() {
        let mut buf = vec![0u8; 32];
        LittleEndian::write_u32(&mut buf[0..4], 0x80);
        LittleEndian::write_u32(&mut buf[4..8], 4096); // way past the bound
        assert!(decode_attribute(&buf, 0, buf.len(), 1024).is_err());
    }

    #[test]
    fn resident_data_respects_cap() {
        let buf = resident_attr(0x80, &[0xAB; 100]);
        let decoded = decode_attribute(&buf, 0, buf.len(), 16).unwrap().unwrap();
        match decoded.attribute.value {
            AttributeValue::Data(bytes) => assert_eq!(bytes.len(), 16),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn reparse_symlink_names() {
        let sub: Vec<u16> = r"\??\C:\t".encode_utf16().collect();
        let print: Vec<u16> = r"C:\t".encode_utf16().collect();
        let mut payload = vec![0u8; 20 + (sub.len() + print.len()) * 2];
        LittleEndian::write_u32(&mut payload[0..4], REPARSE_TAG_SYMLINK);
        LittleEndian::write_u16(&mut payload[8..10], 0);
        LittleEndian::write_u16(&mut payload[10..12], (sub.len() * 2) as u16);
        LittleEndian::write_u16(&mut payload[12..14], (sub.len() * 2) as u16);
        LittleEndian::write_u16(&mut payload[14..16], (print.len() * 2) as u16);
        for (i, unit) in sub.iter().chain(print.iter()).enumerate() {
            LittleEndian::write_u16(&mut payload[20 + i * 2..22 + i * 2], *unit);
        }
        let attr = ReparsePointAttr::parse(&payload).unwrap();
        assert_eq!(attr.substitute_name.as_deref(), Some(r"\??\C:\t"));
        assert_eq!(attr.print_name.as_deref(), Some(r"C:\t"));
        assert!(attr.describe().contains(r"\??\C:\t"));
    }
}
