use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, trace};

use super::ArchiveError;
use crate::codec::{decode, MAX_DECODED_SIZE};
use crate::entry::{HeaderRecord, SubfileEntry, RECORD_SIZE};

/// Default cap on the stored length of a single subfile: 64 MiB.
pub const DEFAULT_MAX_SUBFILE_SIZE: u64 = 64 * 1024 * 1024;

/// Configuration for [`ArchiveReader::with_options`].
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Largest stored body the reader will allocate for.
    pub max_subfile_size: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { max_subfile_size: DEFAULT_MAX_SUBFILE_SIZE }
    }
}

/// Read the offset table from the start of `reader`.
///
/// Records are consumed until the read position meets the smallest offset
/// seen so far.  The trailing sentinel record, if any, is dropped.  Returned
/// entries carry no data.
pub fn parse_header<R: Read + Seek>(reader: &mut R) -> Result<Vec<SubfileEntry>, ArchiveError> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut header_end = file_len;
    let mut position   = 0u64;
    let mut records    = Vec::new();

    while position < header_end {
        if position + RECORD_SIZE as u64 > file_len {
            return Err(ArchiveError::TruncatedHeader { position });
        }
        let record = HeaderRecord::read(&mut *reader)?;
        position += RECORD_SIZE as u64;
        header_end = header_end.min(u64::from(record.offset));
        trace!(offset = record.offset, size = record.size(), compressed = record.is_compressed(), "table record");
        records.push(record);
    }

    if position != header_end {
        return Err(ArchiveError::MalformedHeader { position, header_end });
    }

    if matches!(records.last(), Some(r) if r.is_terminator(file_len)) {
        records.pop();
        trace!("dropped terminator record");
    }

    debug!(entries = records.len(), header_end, file_len, "parsed offset table");
    Ok(records.into_iter().map(SubfileEntry::from).collect())
}

/// Extract every subfile's stored bytes from an archive stream.
pub fn extract<R: Read + Seek>(reader: R) -> Result<Vec<Vec<u8>>, ArchiveError> {
    ArchiveReader::new(reader)?.extract_all()
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct ArchiveReader<R: Read + Seek> {
    reader:      R,
    file_len:    u64,
    entries:     Vec<SubfileEntry>,
    pub options: ReaderOptions,
}

impl<R: Read + Seek> ArchiveReader<R> {
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        Self::with_options(reader, ReaderOptions::default())
    }

    /// Open an archive stream and parse its offset table.  A malformed
    /// table fails here; nothing is extracted lazily from a bad header.
    pub fn with_options(mut reader: R, options: ReaderOptions) -> Result<Self, ArchiveError> {
        let entries  = parse_header(&mut reader)?;
        let file_len = reader.seek(SeekFrom::End(0))?;
        Ok(Self { reader, file_len, entries, options })
    }

    pub fn entries(&self) -> &[SubfileEntry] {
        &self.entries
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    fn entry(&self, index: usize) -> Result<&SubfileEntry, ArchiveError> {
        self.entries.get(index).ok_or(ArchiveError::NoSuchEntry(index))
    }

    /// Number of bytes subfile `index` occupies on disk, excluding padding.
    ///
    /// For compressed entries this decodes the body and checks that the
    /// decoded length matches the table.
    pub fn stored_len(&mut self, index: usize) -> Result<u64, ArchiveError> {
        let (offset, size, compressed) = {
            let e = self.entry(index)?;
            (u64::from(e.offset), u64::from(e.size), e.compressed)
        };

        let len = if compressed {
            self.decode_at(index, offset, size)?;
            let end = self.reader.stream_position()?;
            end.checked_sub(offset).ok_or(ArchiveError::OutOfBounds {
                index,
                offset,
                len: 0,
                file_len: self.file_len,
            })?
        } else {
            size
        };

        if len > self.options.max_subfile_size {
            return Err(ArchiveError::SubfileTooLarge { index, len, max: self.options.max_subfile_size });
        }
        if offset + len > self.file_len {
            return Err(ArchiveError::OutOfBounds { index, offset, len, file_len: self.file_len });
        }
        Ok(len)
    }

    /// Return subfile `index` exactly as stored, still compressed if it was.
    pub fn extract_entry(&mut self, index: usize) -> Result<Vec<u8>, ArchiveError> {
        let len    = self.stored_len(index)?;
        let offset = u64::from(self.entry(index)?.offset);

        self.reader.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; len as usize];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }

    /// Return the stored bytes of every subfile in index order.
    pub fn extract_all(&mut self) -> Result<Vec<Vec<u8>>, ArchiveError> {
        (0..self.entries.len()).map(|i| self.extract_entry(i)).collect()
    }

    /// Return the decoded contents of subfile `index`.  Raw entries are
    /// returned as stored.
    pub fn decompress_entry(&mut self, index: usize) -> Result<Vec<u8>, ArchiveError> {
        let (offset, size, compressed) = {
            let e = self.entry(index)?;
            (u64::from(e.offset), u64::from(e.size), e.compressed)
        };
        if !compressed {
            return self.extract_entry(index);
        }
        self.decode_at(index, offset, size)
    }

    fn decode_at(&mut self, index: usize, offset: u64, size: u64) -> Result<Vec<u8>, ArchiveError> {
        if size > MAX_DECODED_SIZE as u64 {
            return Err(ArchiveError::SubfileTooLarge { index, len: size, max: MAX_DECODED_SIZE as u64 });
        }
        if offset >= self.file_len {
            return Err(ArchiveError::OutOfBounds { index, offset, len: 0, file_len: self.file_len });
        }

        self.reader.seek(SeekFrom::Start(offset))?;
        let mut decoded = Vec::new();
        decode(&mut self.reader, &mut decoded)
            .map_err(|source| ArchiveError::Decode { index, source })?;

        if decoded.len() as u64 != size {
            return Err(ArchiveError::SizeMismatch { index, declared: size, actual: decoded.len() as u64 });
        }
        Ok(decoded)
    }
}
