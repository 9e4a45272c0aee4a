//! LZ10 / LZ11 decoder — the LZ77 variants found in subfile bodies.
//!
//! # Stream layout
//! ```text
//! +-----+-----------------+------------------------------------------+
//! | tag | size (u24 LE)   | flag group | flag group | ...             |
//! +-----+-----------------+------------------------------------------+
//! ```
//! `tag` is `0x10` (LZ10) or `0x11` (LZ11).  `size` is the decoded length.
//!
//! Each flag group is one flag byte followed by up to eight units.  Flag
//! bits are scanned MSB first: `0` is a literal byte, `1` is a
//! back-reference.  Once the output reaches `size` the remaining flag bits
//! are ignored and nothing further is read.
//!
//! # Back-references
//! Every back-reference starts with a big-endian `u16` (`block`); `top` is
//! its high nibble.
//!
//! | Format | `top` | Extra input   | `count`                                 | `displacement`               |
//! |--------|-------|---------------|-----------------------------------------|------------------------------|
//! | LZ10   | any   | —             | `top + 3`                               | `(block & 0xFFF) + 1`        |
//! | LZ11   | 0     | `u8 b2`       | `(block >> 4) + 17`                     | `(block & 0xF) : b2` + 1     |
//! | LZ11   | 1     | `u16 block2`  | `(block & 0xFFF) : (block2 >> 12)` + 273 | `(block2 & 0xFFF) + 1`      |
//! | LZ11   | 2..15 | —             | `top + 1`                               | `(block & 0xFFF) + 1`        |
//!
//! `a : b` is bit concatenation, `a` in the high bits.
//!
//! Copies are byte-by-byte from `displacement` bytes behind the write
//! position, so a displacement shorter than the count repeats the pattern.

use std::io::{self, Cursor, Read};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use thiserror::Error;
use tracing::trace;

/// Tag byte selecting the fixed-width LZ10 back-reference encoding.
pub const TAG_LZ10: u8 = 0x10;
/// Tag byte selecting the variable-width LZ11 back-reference encoding.
pub const TAG_LZ11: u8 = 0x11;
/// Size of the tag + u24 size header in bytes.
pub const LZ_HEADER_SIZE: usize = 4;
/// Largest decoded size a u24 header can declare.
pub const MAX_DECODED_SIZE: usize = 0xFF_FFFF;

// ── Format ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzFormat {
    Lz10,
    Lz11,
}

impl LzFormat {
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            LzFormat::Lz10 => TAG_LZ10,
            LzFormat::Lz11 => TAG_LZ11,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_LZ10 => Some(LzFormat::Lz10),
            TAG_LZ11 => Some(LzFormat::Lz11),
            _        => None,
        }
    }

    /// Human-readable name (diagnostics only).
    pub fn name(self) -> &'static str {
        match self {
            LzFormat::Lz10 => "lz10",
            LzFormat::Lz11 => "lz11",
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unknown compression tag {0:#04x}")]
    UnknownTag(u8),
    #[error("Compressed stream is truncated")]
    Truncated,
    #[error("Back-reference displacement {displacement} exceeds the {produced} bytes decoded so far")]
    Displacement { displacement: usize, produced: usize },
    #[error("Back-reference of {count} bytes at {position} overruns the declared size {declared}")]
    Overrun { position: usize, count: usize, declared: usize },
    #[error("Cannot allocate {0} bytes for the decoded output")]
    Allocation(usize),
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for CodecError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::Truncated
        } else {
            CodecError::Io(error)
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzHeader {
    pub format:       LzFormat,
    pub decoded_size: usize,
}

impl LzHeader {
    /// Read the 4-byte tag + size header from the current position.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, CodecError> {
        let tag = reader.read_u8()?;
        let format = LzFormat::from_tag(tag).ok_or(CodecError::UnknownTag(tag))?;
        let decoded_size = reader.read_u24::<LittleEndian>()? as usize;
        Ok(Self { format, decoded_size })
    }
}

/// Parse only the stream header.  See [`LzHeader::read`].
pub fn read_header<R: Read>(reader: R) -> Result<LzHeader, CodecError> {
    LzHeader::read(reader)
}

// ── Back-references ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BackRef {
    count:        usize,
    displacement: usize,
}

impl BackRef {
    fn read<R: Read>(format: LzFormat, reader: &mut R) -> Result<Self, CodecError> {
        let block = reader.read_u16::<BigEndian>()? as usize;
        let top = block >> 12;

        let backref = match format {
            LzFormat::Lz10 => BackRef {
                count:        top + 3,
                displacement: (block & 0x0FFF) + 1,
            },
            LzFormat::Lz11 => match top {
                0 => {
                    let b2 = reader.read_u8()? as usize;
                    BackRef {
                        count:        (block >> 4) + 17,
                        displacement: (((block & 0x000F) << 8) | b2) + 1,
                    }
                }
                1 => {
                    let block2 = reader.read_u16::<BigEndian>()? as usize;
                    BackRef {
                        count:        (((block & 0x0FFF) << 4) | (block2 >> 12)) + 273,
                        displacement: (block2 & 0x0FFF) + 1,
                    }
                }
                // top is 2..15 here, so count is 3..16.
                _ => BackRef {
                    count:        top + 1,
                    displacement: (block & 0x0FFF) + 1,
                },
            },
        };
        Ok(backref)
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────────

/// Decode one LZ10/LZ11 stream from `input` into `output`.
///
/// Reading starts at the current position of `input`.  On success `output`
/// holds exactly the declared number of bytes and `input` is positioned
/// directly after the last byte of the compressed payload.  On failure
/// `output` is cleared and the position of `input` is unspecified.
pub fn decode<R: Read>(mut input: R, output: &mut Vec<u8>) -> Result<(), CodecError> {
    output.clear();
    let header = LzHeader::read(&mut input)?;
    output
        .try_reserve_exact(header.decoded_size)
        .map_err(|_| CodecError::Allocation(header.decoded_size))?;

    trace!(format = header.format.name(), size = header.decoded_size, "decoding lz stream");

    let result = decode_body(&mut input, header, output);
    if result.is_err() {
        output.clear();
    }
    result
}

fn decode_body<R: Read>(input: &mut R, header: LzHeader, output: &mut Vec<u8>) -> Result<(), CodecError> {
    let declared = header.decoded_size;

    while output.len() < declared {
        let flags = input.read_u8()?;

        for bit in (0..8).rev() {
            if output.len() >= declared {
                break;
            }

            if (flags >> bit) & 1 == 0 {
                output.push(input.read_u8()?);
                continue;
            }

            let BackRef { count, displacement } = BackRef::read(header.format, input)?;
            let produced = output.len();
            if displacement > produced {
                return Err(CodecError::Displacement { displacement, produced });
            }
            if produced + count > declared {
                return Err(CodecError::Overrun { position: produced, count, declared });
            }

            // Byte-wise: the source may run into bytes pushed by this copy.
            let mut src = produced - displacement;
            for _ in 0..count {
                let byte = output[src];
                output.push(byte);
                src += 1;
            }
        }
    }

    Ok(())
}

/// Decode a complete stream held in memory.
pub fn decode_to_vec(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    decode_measured(data).map(|(decoded, _)| decoded)
}

/// Decode a stream held in memory and report how many input bytes it used.
///
/// Bytes after the compressed payload (e.g. alignment padding) are left
/// untouched and are not counted.
pub fn decode_measured(data: &[u8]) -> Result<(Vec<u8>, usize), CodecError> {
    let mut cursor = Cursor::new(data);
    let mut decoded = Vec::new();
    decode(&mut cursor, &mut decoded)?;
    Ok((decoded, cursor.position() as usize))
}
