//! Loading saved HTML snapshots from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Bytes scanned for a `<meta charset>` declaration.
const META_PRESCAN_BYTES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub html: String,
    pub encoding_label: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("cannot read snapshot {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode bytes with {encoding}: malformed input")]
    Decode { encoding: String },
}

pub fn load_snapshot(path: &Path, charset: Option<&str>) -> Result<Snapshot, SnapshotError> {
    let bytes = fs::read(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_snapshot(&bytes, charset)
}

/// Decode raw bytes into UTF-8 using: BOM -> explicit charset -> meta charset -> chardetng.
pub fn decode_snapshot(bytes: &[u8], charset: Option<&str>) -> Result<Snapshot, SnapshotError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    let declared = charset
        .map(str::to_string)
        .or_else(|| meta_charset(bytes))
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()));
    if let Some(encoding) = declared {
        return decode_with(bytes, encoding);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_PRESCAN_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();
    (!label.is_empty()).then_some(label)
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<Snapshot, SnapshotError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(SnapshotError::Decode {
            encoding: encoding.name().to_string(),
        });
    }
    Ok(Snapshot {
        html: text.into_owned(),
        encoding_label: encoding.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bom_wins_over_meta() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"<meta charset=\"windows-1252\"><p>\xC3\xA9</p>");
        let snapshot = decode_snapshot(&bytes, None).unwrap();
        assert_eq!(snapshot.encoding_label, "UTF-8");
        assert!(snapshot.html.contains('\u{e9}'));
    }

    #[test]
    fn meta_charset_is_honored() {
        let bytes = b"<html><head><meta charset='windows-1252'></head><body>caf\xE9</body></html>";
        let snapshot = decode_snapshot(bytes, None).unwrap();
        assert_eq!(snapshot.encoding_label, "windows-1252");
        assert!(snapshot.html.contains("caf\u{e9}"));
    }

    #[test]
    fn explicit_charset_overrides_meta() {
        let bytes = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\">\xE9";
        let snapshot = decode_snapshot(bytes, Some("iso-8859-1")).unwrap();
        assert_eq!(snapshot.encoding_label, "windows-1252");
    }

    #[test]
    fn malformed_utf8_is_reported() {
        let bytes = b"<meta charset=utf-8><p>\xFF\xFE\xFD</p>";
        assert!(matches!(
            decode_snapshot(bytes, None),
            Err(SnapshotError::Decode { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = load_snapshot(&dir.path().join("absent.html"), None);
        assert!(matches!(result, Err(SnapshotError::Read { .. })));
    }
}
