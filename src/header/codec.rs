//! Current header wire format: folded, base64-armored records.

use std::io::BufRead;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

/// Field marker introducing every encoded record.
pub const FIELD_MARKER: &str = "X-vi-data: ";

/// Maximum physical line width before folding.
const FOLD_COLUMNS: usize = 60;

/// Kind of a metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// Original document display name.
    File,
    /// Backing-store filesystem path.
    Path,
}

impl HeaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderKind::File => "file",
            HeaderKind::Path => "path",
        }
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"file" => Some(HeaderKind::File),
            b"path" => Some(HeaderKind::Path),
            _ => None,
        }
    }
}

/// A decoded `(kind, value)` metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub kind: HeaderKind,
    pub value: Vec<u8>,
}

/// Header codec errors. The scanner maps all of these to a single
/// "malformed recovery file" condition and skips the entry.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("header record has no kind separator")]
    MissingSeparator,

    #[error("unknown header record kind: {0}")]
    UnknownKind(String),

    #[error("header value is not valid base64: {0}")]
    BadBase64(#[from] base64::DecodeError),

    #[error("missing {0} record")]
    MissingRecord(&'static str),

    #[error("I/O error reading header: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode one record, folding at `FOLD_COLUMNS` columns. Continuation
/// lines begin with a single space. The result always ends in a newline.
pub fn encode(record: &HeaderRecord) -> String {
    let payload = format!("{};{}", record.kind.as_str(), STANDARD.encode(&record.value));

    let mut out = String::with_capacity(FIELD_MARKER.len() + payload.len() + 8);
    out.push_str(FIELD_MARKER);

    let mut budget = FOLD_COLUMNS - FIELD_MARKER.len();
    let mut rest = payload.as_str();
    loop {
        if rest.len() <= budget {
            out.push_str(rest);
            out.push('\n');
            return out;
        }
        let (line, tail) = rest.split_at(budget);
        out.push_str(line);
        out.push('\n');
        out.push(' ');
        rest = tail;
        budget = FOLD_COLUMNS - 1;
    }
}

/// Reads logical (unfolded) records from a stream of physical lines.
///
/// The first line that is neither a record nor a continuation ends the
/// header block; it is retained and recoverable via `into_pending`, so
/// the stream is effectively positioned at the body.
pub struct HeaderReader<R: BufRead> {
    reader: R,
    pending: Option<Vec<u8>>,
    eof: bool,
}

impl<R: BufRead> HeaderReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: None,
            eof: false,
        }
    }

    /// Start with one already-read physical line (used for sniffing).
    pub fn with_pending(reader: R, line: Vec<u8>) -> Self {
        Self {
            reader,
            pending: Some(line),
            eof: false,
        }
    }

    fn next_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        if self.eof {
            return Ok(None);
        }
        match super::read_line(&mut self.reader)? {
            Some(line) => Ok(Some(line)),
            None => {
                self.eof = true;
                Ok(None)
            }
        }
    }

    /// Decode the next logical record. Returns `Ok(None)` at EOF or when
    /// the next line does not carry the field marker.
    pub fn next_record(&mut self) -> Result<Option<HeaderRecord>, HeaderError> {
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };

        if !line.starts_with(FIELD_MARKER.as_bytes()) {
            // Not a header: keep the line for the body.
            self.pending = Some(line);
            return Ok(None);
        }

        let mut logical = line[FIELD_MARKER.len()..].to_vec();
        while let Some(next) = self.next_line()? {
            if next.first() == Some(&b' ') {
                logical.extend_from_slice(&next[1..]);
            } else {
                self.pending = Some(next);
                break;
            }
        }

        let sep = logical
            .iter()
            .position(|&b| b == b';')
            .ok_or(HeaderError::MissingSeparator)?;
        let kind = HeaderKind::from_bytes(&logical[..sep]).ok_or_else(|| {
            HeaderError::UnknownKind(String::from_utf8_lossy(&logical[..sep]).into_owned())
        })?;
        let value = STANDARD.decode(&logical[sep + 1..])?;

        Ok(Some(HeaderRecord { kind, value }))
    }

    /// Give back the first non-header line, if one was read.
    pub fn into_pending(self) -> Option<Vec<u8>> {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(kind: HeaderKind, value: &[u8]) {
        let encoded = encode(&HeaderRecord {
            kind,
            value: value.to_vec(),
        });
        let mut reader = HeaderReader::new(Cursor::new(encoded.as_bytes()));
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.kind, kind);
        assert_eq!(record.value, value);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_roundtrip_plain_value() {
        roundtrip(HeaderKind::File, b"chapter.txt");
    }

    #[test]
    fn test_roundtrip_hostile_bytes() {
        roundtrip(HeaderKind::File, b"new\nline\nin name");
        roundtrip(HeaderKind::File, b"nul\0byte");
        roundtrip(HeaderKind::Path, "unicode \u{00e9}\u{4e2d}.txt".as_bytes());
        roundtrip(HeaderKind::Path, &[0xff, 0xfe, 0x00, 0x0a, 0x20]);
        roundtrip(HeaderKind::File, b"");
    }

    #[test]
    fn test_folding_respects_column_width() {
        let value = vec![b'x'; 500];
        let encoded = encode(&HeaderRecord {
            kind: HeaderKind::Path,
            value: value.clone(),
        });

        let lines: Vec<&str> = encoded.lines().collect();
        assert!(lines.len() > 1, "long value must fold");
        for line in &lines {
            assert!(line.len() <= FOLD_COLUMNS, "line too long: {}", line.len());
        }
        assert!(lines[0].starts_with(FIELD_MARKER));
        for cont in &lines[1..] {
            assert!(cont.starts_with(' '));
            assert!(!cont.starts_with("  "));
        }

        let mut reader = HeaderReader::new(Cursor::new(encoded.as_bytes()));
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.value, value);
    }

    #[test]
    fn test_non_header_line_ends_block() {
        let mut data = encode(&HeaderRecord {
            kind: HeaderKind::File,
            value: b"doc".to_vec(),
        });
        data.push_str("body starts here\n");

        let mut reader = HeaderReader::new(Cursor::new(data.as_bytes()));
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.into_pending().unwrap(), b"body starts here");
    }

    #[test]
    fn test_missing_separator_rejected() {
        let data = "X-vi-data: filenosemicolon\n";
        let mut reader = HeaderReader::new(Cursor::new(data.as_bytes()));
        assert!(matches!(
            reader.next_record(),
            Err(HeaderError::MissingSeparator)
        ));
    }

    #[test]
    fn test_bad_base64_rejected() {
        let data = "X-vi-data: file;!!!not-base64!!!\n";
        let mut reader = HeaderReader::new(Cursor::new(data.as_bytes()));
        assert!(matches!(
            reader.next_record(),
            Err(HeaderError::BadBase64(_))
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let data = "X-vi-data: blob;AAAA\n";
        let mut reader = HeaderReader::new(Cursor::new(data.as_bytes()));
        assert!(matches!(
            reader.next_record(),
            Err(HeaderError::UnknownKind(_))
        ));
    }
}
