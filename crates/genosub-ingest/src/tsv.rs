//! Tab-separated row reading with 1-based source line numbers.
//!
//! Submission files are headered TSV. Rows are read as byte records so that
//! charset defects survive into the row model instead of being silently
//! repaired; cell text is lossy-decoded for the validators, with a per-row
//! flag recording whether any cell held invalid UTF-8.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder};

use crate::error::{IngestError, Result};

/// One data row of a submission file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based source line number; the header is line 1.
    pub line_number: u64,
    pub fields: Vec<String>,
    /// True when any cell contained bytes that are not valid UTF-8.
    pub invalid_utf8: bool,
}

impl Row {
    pub fn field(&self, idx: usize) -> &str {
        self.fields.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|cell| cell.trim().is_empty())
    }
}

fn decode(record: &ByteRecord, line_number: u64) -> Row {
    let mut invalid_utf8 = false;
    let fields = record
        .iter()
        .map(|cell| match std::str::from_utf8(cell) {
            Ok(text) => text.to_string(),
            Err(_) => {
                invalid_utf8 = true;
                String::from_utf8_lossy(cell).into_owned()
            }
        })
        .collect();
    Row {
        line_number,
        fields,
        invalid_utf8,
    }
}

/// Streaming reader over one submission file.
pub struct TsvReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    header: Option<Row>,
    line: u64,
}

impl TsvReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| IngestError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            header: None,
            line: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn next_record(&mut self) -> Result<Option<Row>> {
        let mut record = ByteRecord::new();
        let more = self
            .reader
            .read_byte_record(&mut record)
            .map_err(|source| IngestError::FileRead {
                path: self.path.clone(),
                source,
            })?;
        if !more {
            return Ok(None);
        }
        // The csv crate skips blank lines, so track position by the record's
        // own line, not a running counter.
        self.line = record
            .position()
            .map(csv::Position::line)
            .unwrap_or(self.line + 1);
        Ok(Some(decode(&record, self.line)))
    }

    /// Read the header row (line 1). Returns `None` for an empty file.
    pub fn read_header(&mut self) -> Result<Option<&Row>> {
        if self.header.is_none() {
            self.header = self.next_record()?;
        }
        Ok(self.header.as_ref())
    }

    /// Read the next data row. Reads (and discards into `header`) the header
    /// first when the caller has not done so.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.header.is_none() {
            self.header = self.next_record()?;
            if self.header.is_none() {
                return Ok(None);
            }
        }
        self.next_record()
    }

    /// Drain all remaining data rows. Test and small-file convenience; large
    /// files should stream through `next_row`.
    pub fn rows(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// First-bytes sniff of a submission file, backing the corruption checker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSniff {
    /// Compression container detected from magic bytes, if any. Compressed
    /// inputs are handed over unexpanded, so a match means "unreadable".
    pub compression: Option<Compression>,
    /// File uses carriage returns (CR or CRLF line termination).
    pub carriage_returns: bool,
    /// NUL bytes in the sampled prefix; a strong binary-content signal.
    pub nul_bytes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Zip,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Zip => "zip",
        }
    }
}

const SNIFF_BYTES: usize = 64 * 1024;

/// Sniff the leading bytes of a file for corruption signals.
pub fn sniff_file(path: &Path) -> Result<FileSniff> {
    let mut file = File::open(path).map_err(|source| IngestError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut buffer = vec![0u8; SNIFF_BYTES];
    let mut read = 0usize;
    loop {
        let n = file
            .read(&mut buffer[read..])
            .map_err(|source| IngestError::FileOpen {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        read += n;
        if read == buffer.len() {
            break;
        }
    }
    Ok(sniff_bytes(&buffer[..read]))
}

pub fn sniff_bytes(bytes: &[u8]) -> FileSniff {
    FileSniff {
        compression: detect_compression(bytes),
        carriage_returns: bytes.contains(&b'\r'),
        nul_bytes: bytes.contains(&0u8),
    }
}

fn detect_compression(bytes: &[u8]) -> Option<Compression> {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        Some(Compression::Gzip)
    } else if bytes.starts_with(b"BZh") {
        Some(Compression::Bzip2)
    } else if bytes.starts_with(&[0x50, 0x4b, 0x03, 0x04]) {
        Some(Compression::Zip)
    } else {
        None
    }
}
