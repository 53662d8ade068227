//! Legacy header format, decode-only.
//!
//! Old notification files carried the two values as raw text lines.
//! Values could not contain newlines; that restriction is why the
//! format was superseded. Kept so pre-existing artifacts remain
//! recoverable; there is deliberately no encoder.

use std::io::BufRead;

use super::codec::HeaderError;
use super::Prelude;

const LEGACY_FILE_MARKER: &[u8] = b"X-vi-recover-file: ";
const LEGACY_PATH_MARKER: &[u8] = b"X-vi-recover-path: ";

/// True if the first line of a notification file uses the legacy format.
pub fn is_legacy(first_line: &[u8]) -> bool {
    first_line.starts_with(LEGACY_FILE_MARKER)
}

/// Parse the legacy two-line prelude. `first` is the already-read first
/// line (which `is_legacy` accepted).
pub fn parse<R: BufRead>(first: &[u8], reader: &mut R) -> Result<Prelude, HeaderError> {
    let file = first[LEGACY_FILE_MARKER.len()..].to_vec();

    let second = super::read_line(reader)?.ok_or(HeaderError::MissingRecord("path"))?;
    if !second.starts_with(LEGACY_PATH_MARKER) {
        return Err(HeaderError::MissingRecord("path"));
    }
    let path = second[LEGACY_PATH_MARKER.len()..].to_vec();

    Ok(Prelude { file, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_legacy_pair_decodes() {
        let first = b"X-vi-recover-file: a b c.txt";
        assert!(is_legacy(first));

        let rest = "X-vi-recover-path: /var/tmp/vi.recover/vi.000123\nbody\n";
        let prelude = parse(first, &mut Cursor::new(rest.as_bytes())).unwrap();
        assert_eq!(prelude.file, b"a b c.txt");
        assert_eq!(prelude.path, b"/var/tmp/vi.recover/vi.000123");
    }

    #[test]
    fn test_legacy_missing_path_line_rejected() {
        let first = b"X-vi-recover-file: a.txt";
        let err = parse(first, &mut Cursor::new(&b"not the path header\n"[..])).unwrap_err();
        assert!(matches!(err, HeaderError::MissingRecord("path")));
    }

    #[test]
    fn test_current_format_not_sniffed_as_legacy() {
        assert!(!is_legacy(b"X-vi-data: file;YQ=="));
    }
}
