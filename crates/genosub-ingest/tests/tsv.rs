//! TSV reader and sniffing tests.

use std::io::Write;

use genosub_ingest::{Compression, TsvReader, sniff_bytes, sniff_file};

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create fixture");
    file.write_all(contents).expect("write fixture");
    path
}

#[test]
fn reads_header_and_rows_with_line_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "donor.txt",
        b"donor_id\tdonor_sex\nDO1\tmale\nDO2\tfemale\n",
    );

    let mut reader = TsvReader::open(&path).unwrap();
    let header = reader.read_header().unwrap().expect("header");
    assert_eq!(header.line_number, 1);
    assert_eq!(header.fields, vec!["donor_id", "donor_sex"]);

    let rows = reader.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].line_number, 2);
    assert_eq!(rows[0].field(0), "DO1");
    assert_eq!(rows[1].line_number, 3);
    assert_eq!(rows[1].field(1), "female");
}

#[test]
fn empty_file_has_no_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "donor.txt", b"");
    let mut reader = TsvReader::open(&path).unwrap();
    assert!(reader.read_header().unwrap().is_none());
}

#[test]
fn short_row_keeps_its_own_width() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "donor.txt", b"a\tb\tc\nx\ty\n");
    let mut reader = TsvReader::open(&path).unwrap();
    reader.read_header().unwrap();
    let rows = reader.rows().unwrap();
    // Flexible reading: the row keeps 2 fields so the column-count check
    // can see the mismatch.
    assert_eq!(rows[0].fields.len(), 2);
}

#[test]
fn invalid_utf8_is_flagged_not_repaired_silently() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "donor.txt", b"donor_id\nDO\xff1\n");
    let mut reader = TsvReader::open(&path).unwrap();
    let header = reader.read_header().unwrap().expect("header");
    assert!(!header.invalid_utf8);
    let rows = reader.rows().unwrap();
    assert!(rows[0].invalid_utf8);
}

#[test]
fn sniff_detects_compression_magic() {
    assert_eq!(
        sniff_bytes(&[0x1f, 0x8b, 0x08]).compression,
        Some(Compression::Gzip)
    );
    assert_eq!(sniff_bytes(b"BZh91AY").compression, Some(Compression::Bzip2));
    assert_eq!(
        sniff_bytes(&[0x50, 0x4b, 0x03, 0x04]).compression,
        Some(Compression::Zip)
    );
    assert_eq!(sniff_bytes(b"donor_id\tdonor_sex\n").compression, None);
}

#[test]
fn sniff_detects_carriage_returns_and_nul() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "donor.txt", b"donor_id\r\nDO1\r\n");
    let sniff = sniff_file(&path).unwrap();
    assert!(sniff.carriage_returns);
    assert!(!sniff.nul_bytes);
    assert!(sniff.compression.is_none());

    let clean = write_file(&dir, "clean.txt", b"donor_id\nDO1\n");
    let sniff = sniff_file(&clean).unwrap();
    assert_eq!(sniff, genosub_ingest::FileSniff::default());
}
