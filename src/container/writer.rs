use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use tracing::{debug, trace};

use super::ArchiveError;
use crate::entry::{align_up, HeaderRecord, SubfileEntry, RECORD_SIZE, SIZE_MASK};
use crate::probe::{get_probe, Classification, CompressionProbe};

// ── PackOptions ──────────────────────────────────────────────────────────────

/// Configuration for [`ArchiveWriter::with_options`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Flag files that decode as LZ streams as compressed.  When off, every
    /// file is stored as raw.
    pub detect_compression: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self { detect_compression: true }
    }
}

// ── Layout ───────────────────────────────────────────────────────────────────

/// Placement of every slot, computed before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// One entry per index, gaps included.  `data` is left empty.
    pub entries: Vec<SubfileEntry>,
    /// Final archive length; also the terminator record's offset.
    pub end:     u32,
}

impl Layout {
    pub fn header_size(&self) -> u64 {
        (self.entries.len() as u64 + 1) * RECORD_SIZE as u64
    }

    /// Table records in write order, terminator last.
    pub fn records(&self) -> Vec<HeaderRecord> {
        self.entries
            .iter()
            .map(SubfileEntry::record)
            .chain(std::iter::once(HeaderRecord::terminator(self.end)))
            .collect()
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct ArchiveWriter {
    entries: BTreeMap<usize, SubfileEntry>,
    probe:   Box<dyn CompressionProbe>,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::with_options(PackOptions::default())
    }

    pub fn with_options(opts: PackOptions) -> Self {
        Self::with_probe(get_probe(opts.detect_compression))
    }

    pub fn with_probe(probe: Box<dyn CompressionProbe>) -> Self {
        Self { entries: BTreeMap::new(), probe }
    }

    /// Classify `data` and store it at `index`.
    ///
    /// The bytes are kept unchanged either way; classification only decides
    /// the compressed flag and the size written to the table.
    pub fn add_file(&mut self, index: usize, data: Vec<u8>) -> Result<(), ArchiveError> {
        if self.entries.contains_key(&index) {
            return Err(ArchiveError::DuplicateIndex(index));
        }

        let (size, compressed) = match self.probe.classify(&data) {
            Classification::Compressed { decoded_size } => (decoded_size as u64, true),
            Classification::Raw                         => (data.len() as u64, false),
        };
        if size > u64::from(SIZE_MASK) {
            return Err(ArchiveError::SizeOverflow { index, size });
        }
        trace!(index, size, compressed, stored = data.len(), "classified subfile");

        self.entries.insert(index, SubfileEntry { offset: 0, size: size as u32, compressed, data });
        Ok(())
    }

    /// Number of table slots, gaps included: highest index + 1, saturating.
    pub fn len(&self) -> usize {
        self.entries.keys().next_back().map_or(0, |&i| i.saturating_add(1))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&SubfileEntry> {
        self.entries.get(&index)
    }

    /// Assign offsets.  Bodies follow the table in index order, each padded
    /// to a 4-byte boundary; gaps take a record but no space.
    pub fn layout(&self) -> Result<Layout, ArchiveError> {
        let (count, header_size) = match self.entries.keys().next_back() {
            None         => (0, RECORD_SIZE as u64),
            // The table alone must fit in 32-bit offsets before anything
            // is sized from it.
            Some(&index) => index
                .checked_add(1)
                .and_then(|count| {
                    (count as u64)
                        .checked_add(1)
                        .and_then(|n| n.checked_mul(RECORD_SIZE as u64))
                        .filter(|&size| size <= u64::from(u32::MAX))
                        .map(|size| (count, size))
                })
                .ok_or(ArchiveError::OffsetOverflow { index })?,
        };

        let mut cursor  = header_size;
        let mut entries = Vec::with_capacity(count);

        for index in 0..count {
            let offset = u32::try_from(cursor).map_err(|_| ArchiveError::OffsetOverflow { index })?;
            match self.entries.get(&index) {
                None => entries.push(SubfileEntry::gap(offset)),
                Some(e) => {
                    cursor = align_up(cursor + e.data.len() as u64);
                    if cursor > u64::from(u32::MAX) {
                        return Err(ArchiveError::OffsetOverflow { index });
                    }
                    entries.push(SubfileEntry {
                        offset,
                        size:       e.size,
                        compressed: e.compressed,
                        data:       Vec::new(),
                    });
                }
            }
        }

        let end = u32::try_from(cursor).map_err(|_| ArchiveError::OffsetOverflow { index: count })?;
        debug!(entries = count, end, "computed archive layout");
        Ok(Layout { entries, end })
    }

    /// Serialize the archive into `writer`.  Returns the number of bytes
    /// written.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<u64, ArchiveError> {
        let layout = self.layout()?;

        let mut position = 0u64;
        for record in layout.records() {
            record.write(&mut writer)?;
            position += RECORD_SIZE as u64;
        }

        for (index, slot) in layout.entries.iter().enumerate() {
            let Some(entry) = self.entries.get(&index) else { continue };
            let offset = u64::from(slot.offset);
            write_zeros(&mut writer, offset - position)?;
            writer.write_all(&entry.data)?;
            position = offset + entry.data.len() as u64;
        }

        let end = u64::from(layout.end);
        write_zeros(&mut writer, end - position)?;
        writer.flush()?;
        Ok(end)
    }

    /// Serialize the archive into memory.
    pub fn build(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

fn write_zeros<W: Write>(writer: &mut W, count: u64) -> io::Result<()> {
    io::copy(&mut io::repeat(0).take(count), writer)?;
    Ok(())
}

/// Build an archive from `(index, bytes)` pairs using compression detection.
pub fn build<I>(files: I) -> Result<Vec<u8>, ArchiveError>
where
    I: IntoIterator<Item = (usize, Vec<u8>)>,
{
    let mut writer = ArchiveWriter::new();
    for (index, data) in files {
        writer.add_file(index, data)?;
    }
    writer.build()
}
