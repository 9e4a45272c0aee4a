//! High-level [`Archive`] API — filesystem glue over the container engine.
//!
//! ```no_run
//! use lzpak::archive::{pack_dir, Archive};
//! use lzpak::container::PackOptions;
//!
//! // Unpack
//! let mut ar = Archive::open("data.bin")?;
//! ar.extract_all("data_dir")?;
//!
//! // Repack
//! pack_dir("data_dir", "data_new.bin", &PackOptions::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::container::{ArchiveError, ArchiveReader, ArchiveWriter, Layout, PackOptions, ReaderOptions};
use crate::naming::{file_name_for_index, index_from_file_name};

// ── EntryInfo ─────────────────────────────────────────────────────────────────

/// Lightweight descriptor returned by [`Archive::list`].
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub index:      usize,
    pub offset:     u32,
    /// Decoded size for compressed entries, stored size otherwise.
    pub size:       u32,
    pub compressed: bool,
    pub stored_len: u64,
    /// CRC-32 of the stored bytes.
    pub crc32:      u32,
}

// ── Archive ───────────────────────────────────────────────────────────────────

pub struct Archive {
    path:   PathBuf,
    reader: ArchiveReader<BufReader<File>>,
}

impl Archive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        Self::open_with_options(path, ReaderOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, opts: ReaderOptions) -> Result<Self, ArchiveError> {
        let path   = path.as_ref().to_owned();
        let reader = ArchiveReader::with_options(BufReader::new(File::open(&path)?), opts)?;
        Ok(Self { path, reader })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn len(&self) -> usize { self.reader.entries().len() }

    pub fn is_empty(&self) -> bool { self.reader.entries().is_empty() }

    pub fn file_len(&self) -> u64 { self.reader.file_len() }

    /// Describe every slot.  Compressed entries are decoded to find their
    /// stored length, so a corrupt body fails the listing.
    pub fn list(&mut self) -> Result<Vec<EntryInfo>, ArchiveError> {
        let mut infos = Vec::with_capacity(self.len());
        for index in 0..self.len() {
            let data  = self.reader.extract_entry(index)?;
            let entry = &self.reader.entries()[index];
            infos.push(EntryInfo {
                index,
                offset:     entry.offset,
                size:       entry.size,
                compressed: entry.compressed,
                stored_len: data.len() as u64,
                crc32:      crc32fast::hash(&data),
            });
        }
        Ok(infos)
    }

    /// Stored bytes of one subfile.
    pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>, ArchiveError> {
        self.reader.extract_entry(index)
    }

    /// Decoded bytes of one subfile.
    pub fn read_decompressed(&mut self, index: usize) -> Result<Vec<u8>, ArchiveError> {
        self.reader.decompress_entry(index)
    }

    /// Write every populated subfile into `dest` as `NNNN.bin`, creating the
    /// directory if necessary.  Gap slots produce no file.  Returns the number
    /// of files written.
    ///
    /// All subfiles are extracted before anything is written, so a corrupt
    /// archive leaves `dest` untouched.
    pub fn extract_all<P: AsRef<Path>>(&mut self, dest: P) -> Result<usize, ArchiveError> {
        let dest  = dest.as_ref();
        let files = self.reader.extract_all()?;

        if !dest.exists() { fs::create_dir_all(dest)?; }

        let mut written = 0;
        for (index, data) in files.iter().enumerate() {
            if self.reader.entries()[index].is_gap() {
                continue;
            }
            fs::write(dest.join(file_name_for_index(index)), data)?;
            written += 1;
        }
        info!(archive = %self.path.display(), files = written, "extracted archive");
        Ok(written)
    }
}

// ── Packing ───────────────────────────────────────────────────────────────────

/// Collect the files of `src` keyed by the index in their names.
///
/// Entries that are not regular files or whose names carry no index are
/// skipped.
pub fn read_indexed_dir<P: AsRef<Path>>(src: P) -> Result<BTreeMap<usize, PathBuf>, ArchiveError> {
    let mut files = BTreeMap::new();
    for dir_entry in fs::read_dir(src)? {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type()?.is_file() {
            continue;
        }
        let path = dir_entry.path();
        let name = dir_entry.file_name();
        let Some(index) = index_from_file_name(&name.to_string_lossy()) else {
            warn!(path = %path.display(), "no subfile index in file name, skipping");
            continue;
        };
        if files.insert(index, path).is_some() {
            return Err(ArchiveError::DuplicateIndex(index));
        }
    }
    Ok(files)
}

/// Pack the indexed files of `src` into a new archive at `dest`.
pub fn pack_dir<P: AsRef<Path>, Q: AsRef<Path>>(
    src:  P,
    dest: Q,
    opts: &PackOptions,
) -> Result<Layout, ArchiveError> {
    let mut writer = ArchiveWriter::with_options(opts.clone());
    for (index, path) in read_indexed_dir(src)? {
        writer.add_file(index, fs::read(&path)?)?;
    }

    let layout = writer.layout()?;
    writer.write_to(BufWriter::new(File::create(dest.as_ref())?))?;
    info!(archive = %dest.as_ref().display(), entries = layout.entries.len(), bytes = layout.end, "packed archive");
    Ok(layout)
}
