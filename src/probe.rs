//! Compressed/raw classification for files about to be packed.
//!
//! The archive format has no marker telling a compressed body from a raw
//! one other than the flag in the offset table, so the writer has to guess.
//! [`DecodeProbe`] runs a full LZ decode over the file; anything that
//! decodes cleanly is taken to be compressed.  [`RawProbe`] skips the
//! guess and stores every file as raw.

use tracing::debug;

use crate::codec::decode_measured;

/// Outcome of probing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The bytes are an LZ stream decoding to `decoded_size` bytes.
    Compressed { decoded_size: usize },
    Raw,
}

pub trait CompressionProbe {
    fn classify(&self, data: &[u8]) -> Classification;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeProbe;

impl CompressionProbe for DecodeProbe {
    fn classify(&self, data: &[u8]) -> Classification {
        match decode_measured(data) {
            Ok((decoded, consumed)) => {
                if consumed < data.len() {
                    debug!(trailing = data.len() - consumed, "lz stream followed by trailing bytes");
                }
                Classification::Compressed { decoded_size: decoded.len() }
            }
            Err(e) => {
                debug!(error = %e, "not an lz stream");
                Classification::Raw
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RawProbe;

impl CompressionProbe for RawProbe {
    fn classify(&self, _: &[u8]) -> Classification {
        Classification::Raw
    }
}

/// Resolve the classifier to use for a pack run.
pub fn get_probe(detect_compression: bool) -> Box<dyn CompressionProbe> {
    if detect_compression {
        Box::new(DecodeProbe)
    } else {
        Box::new(RawProbe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lz_stream_is_compressed() {
        let stream = [0x10, 0x0B, 0x00, 0x00, 0x40, 0xAB, 0x70, 0x00];
        assert_eq!(DecodeProbe.classify(&stream), Classification::Compressed { decoded_size: 11 });
    }

    #[test]
    fn text_is_raw() {
        assert_eq!(DecodeProbe.classify(b"plain text file"), Classification::Raw);
        assert_eq!(DecodeProbe.classify(&[]), Classification::Raw);
    }

    #[test]
    fn raw_classifier_never_detects() {
        let stream = [0x10, 0x01, 0x00, 0x00, 0x00, 0x42];
        assert_eq!(RawProbe.classify(&stream), Classification::Raw);
        assert_eq!(get_probe(false).classify(&stream), Classification::Raw);
        assert_ne!(get_probe(true).classify(&stream), Classification::Raw);
    }
}
