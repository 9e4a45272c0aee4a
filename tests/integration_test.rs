use lzpak::archive::{pack_dir, read_indexed_dir, Archive};
use lzpak::container::{ArchiveReader, ArchiveWriter, PackOptions};
use lzpak::{build, extract, parse_header, ArchiveError};
use std::fs;
use std::io::Cursor;
use tempfile::{tempdir, NamedTempFile};

/// LZ10: 0xAB followed by a 10-byte run, 11 bytes decoded.
const LZ10_RUN: [u8; 8] = [0x10, 0x0B, 0x00, 0x00, 0x40, 0xAB, 0x70, 0x00];
/// LZ11: "AB" followed by a (count 20, displacement 2) copy, 22 bytes decoded.
const LZ11_AB: [u8; 10] = [0x11, 0x16, 0x00, 0x00, 0x20, b'A', b'B', 0x00, 0x30, 0x01];

fn sample_files() -> Vec<(usize, Vec<u8>)> {
    vec![
        (0, b"first raw subfile".to_vec()),
        (1, LZ10_RUN.to_vec()),
        (3, LZ11_AB.to_vec()),
        (4, vec![0x10]),
    ]
}

#[test]
fn test_build_then_extract() {
    let archive = build(sample_files()).unwrap();
    let extracted = extract(Cursor::new(&archive)).unwrap();

    assert_eq!(extracted.len(), 5);
    assert_eq!(extracted[0], b"first raw subfile");
    assert_eq!(extracted[1], LZ10_RUN);
    assert!(extracted[2].is_empty());
    assert_eq!(extracted[3], LZ11_AB);
    assert_eq!(extracted[4], [0x10]);
}

#[test]
fn test_header_flags_follow_classification() {
    let archive = build(sample_files()).unwrap();
    let entries = parse_header(&mut Cursor::new(&archive)).unwrap();

    assert_eq!(entries.len(), 5);
    assert!(!entries[0].compressed);
    assert_eq!(entries[0].size, 17);
    assert!(entries[1].compressed);
    assert_eq!(entries[1].size, 11);
    assert!(entries[2].is_gap());
    assert!(entries[3].compressed);
    assert_eq!(entries[3].size, 22);
    // A lone tag byte is a truncated stream, hence raw.
    assert!(!entries[4].compressed);
    assert_eq!(entries[4].size, 1);

    assert_eq!(entries[0].offset, 48);
    for e in &entries {
        assert_eq!(e.offset % 4, 0);
    }
}

#[test]
fn test_rebuild_is_byte_identical() {
    let original = build(sample_files()).unwrap();
    let extracted = extract(Cursor::new(&original)).unwrap();

    let mut writer = ArchiveWriter::new();
    for (index, data) in extracted.into_iter().enumerate() {
        if !data.is_empty() {
            writer.add_file(index, data).unwrap();
        }
    }
    assert_eq!(writer.build().unwrap(), original);
}

#[test]
fn test_decompressed_contents() {
    let archive = build(sample_files()).unwrap();
    let mut reader = ArchiveReader::new(Cursor::new(archive)).unwrap();

    assert_eq!(reader.decompress_entry(1).unwrap(), vec![0xAB; 11]);
    let ab: Vec<u8> = b"AB".iter().copied().cycle().take(22).collect();
    assert_eq!(reader.decompress_entry(3).unwrap(), ab);
    assert_eq!(reader.decompress_entry(0).unwrap(), b"first raw subfile");
}

#[test]
fn test_unpack_pack_roundtrip_on_disk() {
    let archive_file = NamedTempFile::new().unwrap();
    fs::write(archive_file.path(), build(sample_files()).unwrap()).unwrap();

    let out_dir = tempdir().unwrap();
    let mut ar = Archive::open(archive_file.path()).unwrap();
    assert_eq!(ar.len(), 5);
    assert_eq!(ar.extract_all(out_dir.path()).unwrap(), 4);
    assert!(out_dir.path().join("0000.bin").exists());
    assert!(!out_dir.path().join("0002.bin").exists());
    assert_eq!(fs::read(out_dir.path().join("0003.bin")).unwrap(), LZ11_AB);

    let repacked = NamedTempFile::new().unwrap();
    let layout = pack_dir(out_dir.path(), repacked.path(), &PackOptions::default()).unwrap();
    assert_eq!(layout.entries.len(), 5);
    assert_eq!(fs::read(repacked.path()).unwrap(), fs::read(archive_file.path()).unwrap());
}

#[test]
fn test_list_reports_stored_lengths() {
    let archive_file = NamedTempFile::new().unwrap();
    fs::write(archive_file.path(), build(sample_files()).unwrap()).unwrap();

    let mut ar = Archive::open(archive_file.path()).unwrap();
    let infos = ar.list().unwrap();
    assert_eq!(infos.len(), 5);
    assert_eq!(infos[1].size, 11);
    assert_eq!(infos[1].stored_len, LZ10_RUN.len() as u64);
    assert_eq!(infos[1].crc32, crc32fast::hash(&LZ10_RUN));
    assert_eq!(infos[2].stored_len, 0);

    let json = serde_json::to_value(&infos).unwrap();
    assert_eq!(json[3]["compressed"], true);
    assert_eq!(json[3]["size"], 22);
}

#[test]
fn test_pack_without_detection() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("0000.bin"), LZ10_RUN).unwrap();

    let dest = NamedTempFile::new().unwrap();
    let opts = PackOptions { detect_compression: false };
    let layout = pack_dir(src.path(), dest.path(), &opts).unwrap();
    assert!(!layout.entries[0].compressed);
    assert_eq!(layout.entries[0].size, 8);
}

#[test]
fn test_indexed_dir_skips_unnumbered_files() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("2_title.lz"), b"x").unwrap();
    fs::write(src.path().join("notes.txt"), b"y").unwrap();
    fs::create_dir(src.path().join("5_subdir")).unwrap();

    let files = read_indexed_dir(src.path()).unwrap();
    assert_eq!(files.keys().copied().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn test_indexed_dir_rejects_duplicates() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("0001.bin"), b"a").unwrap();
    fs::write(src.path().join("1.lz"), b"b").unwrap();
    assert!(matches!(read_indexed_dir(src.path()), Err(ArchiveError::DuplicateIndex(1))));
}

#[test]
fn test_corrupt_table_fails_open() {
    let archive_file = NamedTempFile::new().unwrap();
    let mut data = Vec::new();
    data.extend_from_slice(&16u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&8u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.resize(32, 0);
    fs::write(archive_file.path(), data).unwrap();

    assert!(matches!(
        Archive::open(archive_file.path()),
        Err(ArchiveError::MalformedHeader { position: 16, header_end: 8 })
    ));
}

#[test]
fn test_failed_extract_writes_nothing() {
    let mut data = build(vec![(0, LZ10_RUN.to_vec())]).unwrap();
    // Break the back-reference so it reaches before the start of output.
    data[16 + 6] = 0x7F;
    let archive_file = NamedTempFile::new().unwrap();
    fs::write(archive_file.path(), data).unwrap();

    let out_dir = tempdir().unwrap();
    let dest = out_dir.path().join("out");
    let mut ar = Archive::open(archive_file.path()).unwrap();
    assert!(matches!(ar.extract_all(&dest), Err(ArchiveError::Decode { index: 0, .. })));
    assert!(!dest.exists());
}
