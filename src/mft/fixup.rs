use byteorder::{ByteOrder, LittleEndian};

use crate::errors::{MftError, Result};

pub const DEFAULT_SECTOR_SIZE: usize = 512;

/// Verify and undo the multi-sector transfer protection of one record.
///
/// The update-sequence array starts with the expected USN; the remaining
/// entries hold the bytes that belong at the end of each sector. The last
/// two bytes of every sector must match the USN before they are restored.
/// On any mismatch the buffer is left partially patched and the record is
/// decoded best-effort by the caller.
pub fn apply_fixups(
    data: &mut [u8],
    usa_offset: u16,
    usa_count: u16,
    bytes_per_sector: usize,
) -> Result<()> {
    if bytes_per_sector == 0 || data.len() % bytes_per_sector != 0 {
        return Err(MftError::OutOfBounds {
            offset: 0,
            length: bytes_per_sector,
            buffer: data.len(),
        });
    }
    let sectors = data.len() / bytes_per_sector;
    let usa_offset = usa_offset as usize;
    let usa_count = usa_count as usize;

    // The array holds the signature plus one saved entry per sector.
    if usa_count != sectors + 1 {
        return Err(MftError::FixupMismatch {
            sector: 0,
            expected: (sectors + 1) as u16,
            found: usa_count as u16,
        });
    }
    let usa_end = usa_offset
        .checked_add(usa_count * 2)
        .ok_or(MftError::OutOfBounds {
            offset: usa_offset,
            length: usa_count * 2,
            buffer: data.len(),
        })?;
    if usa_end > data.len() {
        return Err(MftError::OutOfBounds {
            offset: usa_offset,
            length: usa_count * 2,
            buffer: data.len(),
        });
    }

    let usn = LittleEndian::read_u16(&data[usa_offset..usa_offset + 2]);
    for sector in 1..=sectors {
        let tail = sector * bytes_per_sector - 2;
        let found = LittleEndian::read_u16(&data[tail..tail + 2]);
        if found != usn {
            return Err(MftError::FixupMismatch {
                sector,
                expected: usn,
                found,
            });
        }
        let saved = usa_offset + sector * 2;
        data[tail] = data[saved];
        data[tail + 1] = data[saved + 1];
    }
    Ok(())
}
