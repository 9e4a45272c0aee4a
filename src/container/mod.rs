//! Offset-table archive engine — reader and writer.
//!
//! # Layout
//! ```text
//! +----------------------+----------------------+-----+------------------+
//! | record 0 (8 bytes)   | record 1             | ... | subfile bodies   |
//! +----------------------+----------------------+-----+------------------+
//! ```
//! Each record is `{u32 offset, u32 size_and_flag}`, little-endian.  Bit 31
//! of the size field marks an LZ-compressed body, in which case the size is
//! the *decoded* length.  There is no record count: the table ends where the
//! smallest offset it references begins.  Writers append a sentinel record
//! `{file_len, 0xFFFF}`; readers drop it.
//!
//! Bodies are 4-byte aligned and zero padded.  Unused indices keep a record
//! with size 0 that points at the current end of data.
//!
//! # Reader
//! [`ArchiveReader`] parses the table once on open.  Compressed bodies carry
//! no stored length, so extraction runs the LZ decoder over the body purely
//! to find where it ends, then returns the stored bytes verbatim.
//!
//! # Writer
//! [`ArchiveWriter`] classifies each file as compressed or raw with a
//! [`CompressionProbe`](crate::probe::CompressionProbe), lays the bodies out
//! linearly after the table and serializes everything in one pass.

mod reader;
mod writer;

pub use reader::{extract, parse_header, ArchiveReader, ReaderOptions, DEFAULT_MAX_SUBFILE_SIZE};
pub use writer::{build, ArchiveWriter, Layout, PackOptions};

use std::io;
use thiserror::Error;

use crate::codec::CodecError;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Malformed offset table: records end at {position} but the smallest offset is {header_end}")]
    MalformedHeader { position: u64, header_end: u64 },
    #[error("Offset table truncated at byte {position}")]
    TruncatedHeader { position: u64 },
    #[error("Subfile {index}: {source}")]
    Decode { index: usize, source: CodecError },
    #[error("Subfile {index}: decoded {actual} bytes but the table declares {declared}")]
    SizeMismatch { index: usize, declared: u64, actual: u64 },
    #[error("Subfile {index}: {len} bytes exceeds the {max} byte limit")]
    SubfileTooLarge { index: usize, len: u64, max: u64 },
    #[error("Subfile {index}: {len} bytes at offset {offset} run past the end of the archive ({file_len} bytes)")]
    OutOfBounds { index: usize, offset: u64, len: u64, file_len: u64 },
    #[error("Subfile {index}: offset exceeds the 32-bit range")]
    OffsetOverflow { index: usize },
    #[error("Subfile {index}: size {size} does not fit in 31 bits")]
    SizeOverflow { index: usize, size: u64 },
    #[error("Subfile {0} does not exist")]
    NoSuchEntry(usize),
    #[error("Duplicate subfile index {0}")]
    DuplicateIndex(usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
