use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// On-disk size of one offset-table record.
pub const RECORD_SIZE: usize = 8;
/// Bit 31 of the size field marks an LZ-compressed subfile.
pub const COMPRESSED_FLAG: u32 = 0x8000_0000;
/// Bits 0..=30 of the size field.
pub const SIZE_MASK: u32 = 0x7FFF_FFFF;
/// Raw size field of the end-of-table sentinel record.
pub const TERMINATOR_SIZE: u32 = 0xFFFF;
/// Subfile bodies start on this boundary.
pub const BODY_ALIGNMENT: u64 = 4;

/// One `{offset, size_and_flag}` record exactly as stored in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRecord {
    pub offset:        u32,
    pub size_and_flag: u32,
}

impl HeaderRecord {
    pub fn terminator(offset: u32) -> Self {
        Self { offset, size_and_flag: TERMINATOR_SIZE }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size_and_flag & SIZE_MASK
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.size_and_flag & COMPRESSED_FLAG != 0
    }

    /// True for the sentinel that closes the table at `file_len`.
    pub fn is_terminator(&self, file_len: u64) -> bool {
        u64::from(self.offset) == file_len && self.size_and_flag == TERMINATOR_SIZE
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.size_and_flag)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            offset:        reader.read_u32::<LittleEndian>()?,
            size_and_flag: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// A subfile slot in the archive.
///
/// For compressed entries `size` is the decoded length, not the number of
/// bytes the body occupies on disk.  Gap slots have `size == 0`, no flag and
/// no data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubfileEntry {
    pub offset:     u32,
    pub size:       u32,
    pub compressed: bool,
    pub data:       Vec<u8>,
}

impl SubfileEntry {
    pub fn gap(offset: u32) -> Self {
        Self { offset, ..Self::default() }
    }

    pub fn is_gap(&self) -> bool {
        self.size == 0 && !self.compressed && self.data.is_empty()
    }

    pub fn record(&self) -> HeaderRecord {
        let flag = if self.compressed { COMPRESSED_FLAG } else { 0 };
        HeaderRecord {
            offset:        self.offset,
            size_and_flag: (self.size & SIZE_MASK) | flag,
        }
    }
}

impl From<HeaderRecord> for SubfileEntry {
    fn from(record: HeaderRecord) -> Self {
        Self {
            offset:     record.offset,
            size:       record.size(),
            compressed: record.is_compressed(),
            data:       Vec::new(),
        }
    }
}

/// Round `pos` up to the next multiple of [`BODY_ALIGNMENT`].
#[inline]
pub fn align_up(pos: u64) -> u64 {
    (pos + BODY_ALIGNMENT - 1) & !(BODY_ALIGNMENT - 1)
}
