//! Synthesis of valid FILE records, used by the test suite to build small
//! MFT images without shipping binary fixtures.

use byteorder::{ByteOrder, LittleEndian};

use crate::mft::attributes::END_OF_ATTRIBUTES;
use crate::mft::fixup::DEFAULT_SECTOR_SIZE;

const USA_OFFSET: usize = 48;

fn utf16_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Builds one protected FILE record. Attributes are appended in call
/// order; `build` lays them out, terminates the chain, and applies the
/// update-sequence protection so the buffer round-trips through fixups.
pub struct RecordBuilder {
    record_number: u64,
    signature: [u8; 4],
    sequence: u16,
    flags: u16,
    hard_links: u16,
    base_record: u64,
    record_size: usize,
    allocated_size: Option<u32>,
    next_attr_id: u16,
    attributes: Vec<Vec<u8>>,
}

impl RecordBuilder {
    pub fn new(record_number: u64) -> Self {
        Self {
            record_number,
            signature: *b"FILE",
            sequence: 1,
            flags: 0,
            hard_links: 1,
            base_record: 0,
            record_size: 1024,
            allocated_size: None,
            next_attr_id: 0,
            attributes: Vec::new(),
        }
    }

    pub fn signature(mut self, signature: [u8; 4]) -> Self {
        self.signature = signature;
        self
    }

    pub fn sequence(mut self, sequence: u16) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn in_use(mut self, in_use: bool) -> Self {
        if in_use {
            self.flags |= 0x0001;
        } else {
            self.flags &= !0x0001;
        }
        self
    }

    pub fn directory(mut self, directory: bool) -> Self {
        if directory {
            self.flags |= 0x0002;
        } else {
            self.flags &= !0x0002;
        }
        self
    }

    pub fn base_record(mut self, base: u64) -> Self {
        self.base_record = base;
        self
    }

    pub fn record_size(mut self, size: usize) -> Self {
        self.record_size = size;
        self
    }

    /// Override the header's allocated-size field (record-size inference).
    pub fn allocated_size(mut self, size: u32) -> Self {
        self.allocated_size = Some(size);
        self
    }

    fn next_id(&mut self) -> u16 {
        let id = self.next_attr_id;
        self.next_attr_id += 1;
        id
    }

    fn push_resident(&mut self, type_code: u32, name: &str, payload: &[u8]) {
        let id = self.next_id();
        let name_bytes = utf16_bytes(name);
        let name_offset = 24usize;
        let content_offset = name_offset + name_bytes.len();
        let length = align8(content_offset + payload.len());
        let mut blob = vec![0u8; length];
        LittleEndian::write_u32(&mut blob[0..4], type_code);
        LittleEndian::write_u32(&mut blob[4..8], length as u32);
        blob[8] = 0;
        blob[9] = (name_bytes.len() / 2) as u8;
        LittleEndian::write_u16(&mut blob[10..12], name_offset as u16);
        LittleEndian::write_u16(&mut blob[14..16], id);
        LittleEndian::write_u32(&mut blob[16..20], payload.len() as u32);
        LittleEndian::write_u16(&mut blob[20..22], content_offset as u16);
        blob[name_offset..name_offset + name_bytes.len()].copy_from_slice(&name_bytes);
        blob[content_offset..content_offset + payload.len()].copy_from_slice(payload);
        self.attributes.push(blob);
    }

    fn push_nonresident(
        &mut self,
        type_code: u32,
        name: &str,
        runs: &[u8],
        allocated: u64,
        real: u64,
        ending_vcn: u64,
    ) {
        let id = self.next_id();
        let name_bytes = utf16_bytes(name);
        let name_offset = 64usize;
        let run_offset = name_offset + name_bytes.len();
        let length = align8(run_offset + runs.len());
        let mut blob = vec![0u8; length];
        LittleEndian::write_u32(&mut blob[0..4], type_code);
        LittleEndian::write_u32(&mut blob[4..8], length as u32);
        blob[8] = 1;
        blob[9] = (name_bytes.len() / 2) as u8;
        LittleEndian::write_u16(&mut blob[10..12], name_offset as u16);
        LittleEndian::write_u16(&mut blob[14..16], id);
        LittleEndian::write_u64(&mut blob[24..32], ending_vcn);
        LittleEndian::write_u16(&mut blob[32..34], run_offset as u16);
        LittleEndian::write_u64(&mut blob[40..48], allocated);
        LittleEndian::write_u64(&mut blob[48..56], real);
        LittleEndian::write_u64(&mut blob[56..64], real);
        blob[name_offset..name_offset + name_bytes.len()].copy_from_slice(&name_bytes);
        blob[run_offset..run_offset + runs.len()].copy_from_slice(runs);
        self.attributes.push(blob);
    }

    /// $STANDARD_INFORMATION with explicit FILETIME values.
    pub fn standard_info_times(mut self, created: u64, modified: u64, mft: u64, accessed: u64) -> Self {
        let mut payload = vec![0u8; 72];
        LittleEndian::write_u64(&mut payload[0..8], created);
        LittleEndian::write_u64(&mut payload[8..16], modified);
        LittleEndian::write_u64(&mut payload[16..24], mft);
        LittleEndian::write_u64(&mut payload[24..32], accessed);
        LittleEndian::write_u32(&mut payload[32..36], 0x20);
        self.push_resident(0x10, "", &payload);
        self
    }

    pub fn standard_info(self, filetime: u64) -> Self {
        self.standard_info_times(filetime, filetime, filetime, filetime)
    }

    /// $FILE_NAME in the Win32 namespace with zeroed timestamps.
    pub fn file_name(self, parent: u64, parent_seq: u16, name: &str) -> Self {
        self.file_name_full(parent, parent_seq, name, 1, 0, 0)
    }

    pub fn file_name_ns(self, parent: u64, parent_seq: u16, name: &str, namespace: u8) -> Self {
        self.file_name_full(parent, parent_seq, name, namespace, 0, 0)
    }

    pub fn file_name_created(self, parent: u64, parent_seq: u16, name: &str, created: u64) -> Self {
        self.file_name_full(parent, parent_seq, name, 1, created, 0)
    }

    pub fn file_name_full(
        mut self,
        parent: u64,
        parent_seq: u16,
        name: &str,
        namespace: u8,
        created: u64,
        real_size: u64,
    ) -> Self {
        let encoded = utf16_bytes(name);
        let mut payload = vec![0u8; 66 + encoded.len()];
        LittleEndian::write_u64(
            &mut payload[0..8],
            (parent & 0x0000_FFFF_FFFF_FFFF) | (u64::from(parent_seq) << 48),
        );
        LittleEndian::write_u64(&mut payload[8..16], created);
        LittleEndian::write_u64(&mut payload[16..24], created);
        LittleEndian::write_u64(&mut payload[24..32], created);
        LittleEndian::write_u64(&mut payload[32..40], created);
        LittleEndian::write_u64(&mut payload[40..48], align8(real_size as usize) as u64);
        LittleEndian::write_u64(&mut payload[48..56], real_size);
        payload[64] = (encoded.len() / 2) as u8;
        payload[65] = namespace;
        payload[66..].copy_from_slice(&encoded);
        self.push_resident(0x30, "", &payload);
        self
    }

    pub fn resident_data(mut self, content: &[u8]) -> Self {
        self.push_resident(0x80, "", content);
        self
    }

    pub fn named_resident_data(mut self, name: &str, content: &[u8]) -> Self {
        self.push_resident(0x80, name, content);
        self
    }

    pub fn nonresident_data(mut self, runs: &[u8], allocated: u64, real: u64) -> Self {
        let ending_vcn = (allocated / 4096).saturating_sub(1);
        self.push_nonresident(0x80, "", runs, allocated, real, ending_vcn);
        self
    }

    pub fn index_root(mut self) -> Self {
        let mut payload = vec![0u8; 32];
        LittleEndian::write_u32(&mut payload[0..4], 0x30);
        LittleEndian::write_u32(&mut payload[4..8], 0x01);
        LittleEndian::write_u32(&mut payload[8..12], 4096);
        payload[12] = 1;
        self.push_resident(0x90, "$I30", &payload);
        self
    }

    pub fn object_id(mut self, guid: [u8; 16]) -> Self {
        self.push_resident(0x40, "", &guid);
        self
    }

    /// $ATTRIBUTE_LIST naming (type, record) pairs.
    pub fn attribute_list(mut self, entries: &[(u32, u64)]) -> Self {
        let mut payload = Vec::new();
        for (attr_type, record) in entries {
            let mut entry = vec![0u8; 32];
            LittleEndian::write_u32(&mut entry[0..4], *attr_type);
            LittleEndian::write_u16(&mut entry[4..6], 32);
            entry[7] = 26;
            LittleEndian::write_u64(&mut entry[16..24], *record);
            payload.extend_from_slice(&entry);
        }
        self.push_resident(0x20, "", &payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let record_size = self.record_size;
        let mut buf = vec![0u8; record_size];
        let sectors = record_size / DEFAULT_SECTOR_SIZE;
        let usa_count = (sectors + 1) as u16;
        // First attribute lands just past the update-sequence array.
        let attrs_offset = align8(USA_OFFSET + usa_count as usize * 2);

        buf[0..4].copy_from_slice(&self.signature);
        LittleEndian::write_u16(&mut buf[4..6], USA_OFFSET as u16);
        LittleEndian::write_u16(&mut buf[6..8], usa_count);
        LittleEndian::write_u64(&mut buf[8..16], 0x1000 + self.record_number);
        LittleEndian::write_u16(&mut buf[16..18], self.sequence);
        LittleEndian::write_u16(&mut buf[18..20], self.hard_links);
        LittleEndian::write_u16(&mut buf[20..22], attrs_offset as u16);
        LittleEndian::write_u16(&mut buf[22..24], self.flags);
        LittleEndian::write_u32(
            &mut buf[28..32],
            self.allocated_size.unwrap_or(record_size as u32),
        );
        LittleEndian::write_u64(&mut buf[32..40], self.base_record);
        LittleEndian::write_u16(&mut buf[40..42], self.next_attr_id);
        LittleEndian::write_u32(&mut buf[44..48], self.record_number as u32);

        let mut offset = attrs_offset;
        for blob in &self.attributes {
            buf[offset..offset + blob.len()].copy_from_slice(blob);
            offset += blob.len();
        }
        LittleEndian::write_u32(&mut buf[offset..offset + 4], END_OF_ATTRIBUTES);
        LittleEndian::write_u32(&mut buf[24..28], (offset + 8) as u32);

        // Protect: save the real sector tails into the USA, then stamp the
        // update sequence number over them.
        let usn: u16 = 0x0001;
        LittleEndian::write_u16(&mut buf[USA_OFFSET..USA_OFFSET + 2], usn);
        for sector in 1..=sectors {
            let tail = sector * DEFAULT_SECTOR_SIZE - 2;
            let saved = USA_OFFSET + sector * 2;
            let original = [buf[tail], buf[tail + 1]];
            buf[saved] = original[0];
            buf[saved + 1] = original[1];
            LittleEndian::write_u16(&mut buf[tail..tail + 2], usn);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mft::fixup::apply_fixups;
    use crate::mft::record::RecordHeader;

    #[test]
    fn built_record_survives_fixups() {
        let mut buf = RecordBuilder::new(12)
            .in_use(true)
            .file_name(5, 1, "fixture.bin")
            .resident_data(&[0x55; 700]) // crosses the first sector tail
            .build();
        let header = RecordHeader::parse(&buf).unwrap();
        apply_fixups(&mut buf, header.usa_offset, header.usa_count, DEFAULT_SECTOR_SIZE).unwrap();
        // The data attribute's bytes at the sector boundary are restored.
        assert!(buf[510] == 0x55 || buf[511] == 0x55);
    }

    #[test]
    fn used_size_is_within_allocation() {
        let buf = RecordBuilder::new(1).in_use(true).build();
        let header = RecordHeader::parse(&buf).unwrap();
        assert!(header.used_size <= header.allocated_size);
        assert_eq!(header.allocated_size, 1024);
    }
}
