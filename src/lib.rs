pub mod codec;
pub mod entry;
pub mod probe;
pub mod container;
pub mod naming;
pub mod archive;

pub use codec::{decode, decode_to_vec, CodecError, LzFormat, LzHeader};
pub use entry::{HeaderRecord, SubfileEntry};
pub use container::{build, extract, parse_header, ArchiveError, ArchiveReader, ArchiveWriter};
pub use archive::Archive;
