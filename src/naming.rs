//! Mapping between subfile indices and file names on disk.
//!
//! Extracted subfiles are named `NNNN.bin`.  When packing, the index is read
//! from the leading decimal digits of the name, so `0007.bin`,
//! `7_title.lz` and `0007` all land in slot 7.

/// Extension given to extracted subfiles.
pub const EXTRACT_EXTENSION: &str = "bin";

pub fn file_name_for_index(index: usize) -> String {
    format!("{index:04}.{EXTRACT_EXTENSION}")
}

/// Parse the subfile index from the leading digits of `name`.
pub fn index_from_file_name(name: &str) -> Option<usize> {
    let end = name
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(name.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }
    name[..end].parse().ok()
}
