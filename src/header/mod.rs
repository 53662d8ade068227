//! # Notification Header Codec
//!
//! Every notification file begins with two metadata records identifying
//! the original document name and the backing-store path:
//!
//! ```text
//! X-vi-data: file;<base64(document name)>
//! X-vi-data: path;<base64(backing-store path)>
//! ```
//!
//! Values are length-safe: base64 tolerates arbitrary bytes, including
//! embedded newlines. Records longer than the fold width are split
//! across physical lines; a line starting with a single space continues
//! the previous logical header.
//!
//! An older wire format wrote the two values as plain text lines
//! (`X-vi-recover-file: <name>` / `X-vi-recover-path: <path>`) and
//! forbade newlines in names. That format is decode-only here, selected
//! by sniffing the first line; nothing in this crate can emit it.

mod codec;
mod legacy;

pub use codec::{encode, HeaderError, HeaderKind, HeaderReader, HeaderRecord, FIELD_MARKER};

use std::ffi::OsString;
use std::io::{BufRead, Read};
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

/// The decoded metadata prelude of a notification file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prelude {
    /// Original document display name, arbitrary bytes.
    pub file: Vec<u8>,
    /// Backing-store filesystem path, arbitrary bytes.
    pub path: Vec<u8>,
}

impl Prelude {
    /// Document name for display, lossily decoded.
    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.file).into_owned()
    }

    /// Backing-store path as an owned filesystem path.
    pub fn backing_path(&self) -> PathBuf {
        PathBuf::from(OsString::from_vec(self.path.clone()))
    }
}

/// Read one physical line, without its terminator. `None` at EOF.
fn read_line<R: BufRead>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line)?;
    if n == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(Some(line))
}

/// Decode both prelude records, returning the first body line (if any
/// was consumed while detecting the end of the header block).
fn parse_prelude<R: BufRead>(
    reader: &mut R,
) -> Result<(Prelude, Option<Vec<u8>>), HeaderError> {
    let first = read_line(reader)?.ok_or(HeaderError::MissingRecord("file"))?;

    if legacy::is_legacy(&first) {
        let prelude = legacy::parse(&first, reader)?;
        return Ok((prelude, None));
    }

    let mut headers = HeaderReader::with_pending(reader, first);
    let file = expect_record(&mut headers, HeaderKind::File)?;
    let path = expect_record(&mut headers, HeaderKind::Path)?;
    let pending = headers.into_pending();
    Ok((Prelude { file, path }, pending))
}

fn expect_record<R: BufRead>(
    headers: &mut HeaderReader<&mut R>,
    kind: HeaderKind,
) -> Result<Vec<u8>, HeaderError> {
    match headers.next_record()? {
        Some(record) if record.kind == kind => Ok(record.value),
        Some(_) | None => Err(HeaderError::MissingRecord(kind.as_str())),
    }
}

/// Decode only the metadata prelude of a notification file.
pub fn read_prelude<R: BufRead>(mut reader: R) -> Result<Prelude, HeaderError> {
    let (prelude, _pending) = parse_prelude(&mut reader)?;
    Ok(prelude)
}

/// Decode the prelude and collect the remaining body bytes.
pub fn read_notification<R: BufRead>(mut reader: R) -> Result<(Prelude, Vec<u8>), HeaderError> {
    let (prelude, pending) = parse_prelude(&mut reader)?;

    let mut body = Vec::new();
    if let Some(line) = pending {
        body.extend_from_slice(&line);
        body.push(b'\n');
    }
    reader.read_to_end(&mut body)?;
    Ok((prelude, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded(file: &[u8], path: &[u8]) -> String {
        let mut out = encode(&HeaderRecord {
            kind: HeaderKind::File,
            value: file.to_vec(),
        });
        out.push_str(&encode(&HeaderRecord {
            kind: HeaderKind::Path,
            value: path.to_vec(),
        }));
        out
    }

    #[test]
    fn test_read_prelude_current_format() {
        let mut data = encoded(b"chapter one.txt", b"/var/tmp/recover/vi.abc123");
        data.push_str("\nadvisory body\n");

        let prelude = read_prelude(Cursor::new(data.as_bytes())).unwrap();
        assert_eq!(prelude.display_name(), "chapter one.txt");
        assert_eq!(
            prelude.backing_path(),
            PathBuf::from("/var/tmp/recover/vi.abc123")
        );
    }

    #[test]
    fn test_read_notification_returns_body() {
        let mut data = encoded(b"a", b"/b");
        data.push_str("\nline one\nline two\n");

        let (_, body) = read_notification(Cursor::new(data.as_bytes())).unwrap();
        assert_eq!(body, b"\nline one\nline two\n");
    }

    #[test]
    fn test_read_prelude_legacy_format() {
        let data = "X-vi-recover-file: notes.txt\nX-vi-recover-path: /tmp/rec/vi.xyz\nbody\n";

        let prelude = read_prelude(Cursor::new(data.as_bytes())).unwrap();
        assert_eq!(prelude.display_name(), "notes.txt");
        assert_eq!(prelude.backing_path(), PathBuf::from("/tmp/rec/vi.xyz"));
    }

    #[test]
    fn test_records_out_of_order_rejected() {
        let mut data = encode(&HeaderRecord {
            kind: HeaderKind::Path,
            value: b"/b".to_vec(),
        });
        data.push_str(&encode(&HeaderRecord {
            kind: HeaderKind::File,
            value: b"a".to_vec(),
        }));

        let err = read_prelude(Cursor::new(data.as_bytes())).unwrap_err();
        assert!(matches!(err, HeaderError::MissingRecord(_)));
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = read_prelude(Cursor::new(&b""[..])).unwrap_err();
        assert!(matches!(err, HeaderError::MissingRecord(_)));
    }
}
