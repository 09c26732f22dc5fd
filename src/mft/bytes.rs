use byteorder::{ByteOrder, LittleEndian};

use crate::errors::{MftError, Result};

/// Bounds-checked little-endian reader over a record buffer.
///
/// Every accessor fails with `OutOfBounds` instead of panicking; record
/// buffers come straight off disk and slack space routinely lies about
/// offsets and lengths.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn check(&self, offset: usize, length: usize) -> Result<()> {
        if offset.checked_add(length).map_or(true, |end| end > self.buf.len()) {
            return Err(MftError::OutOfBounds {
                offset,
                length,
                buffer: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.check(offset, 1)?;
        Ok(self.buf[offset])
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        self.check(offset, 2)?;
        Ok(LittleEndian::read_u16(&self.buf[offset..offset + 2]))
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset, 4)?;
        Ok(LittleEndian::read_u32(&self.buf[offset..offset + 4]))
    }

    pub fn read_u64(&self, offset: usize) -> Result<u64> {
        self.check(offset, 8)?;
        Ok(LittleEndian::read_u64(&self.buf[offset..offset + 8]))
    }

    pub fn read_i8(&self, offset: usize) -> Result<i8> {
        Ok(self.read_u8(offset)? as i8)
    }

    pub fn read_i16(&self, offset: usize) -> Result<i16> {
        Ok(self.read_u16(offset)? as i16)
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        Ok(self.read_u32(offset)? as i32)
    }

    pub fn read_i64(&self, offset: usize) -> Result<i64> {
        Ok(self.read_u64(offset)? as i64)
    }

    /// Borrow `length` bytes at `offset`.
    pub fn read_bytes(&self, offset: usize, length: usize) -> Result<&'a [u8]> {
        self.check(offset, length)?;
        Ok(&self.buf[offset..offset + length])
    }

    /// Decode a UTF-16LE string of `chars` code units at `offset`.
    pub fn read_utf16(&self, offset: usize, chars: usize) -> Result<String> {
        let raw = self.read_bytes(offset, chars * 2)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }
}
