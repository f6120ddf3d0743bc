use crate::{MizukiError, MizukiResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self { offset, length }
    }

    /// Build a range from inclusive first and last byte positions, as they
    /// appear in sidx references and manifest `mediaRange` attributes.
    pub fn from_inclusive(first_byte: u64, last_byte: u64) -> Self {
        Self {
            offset: first_byte,
            length: Some(last_byte - first_byte + 1),
        }
    }

    /// Inclusive position of the last byte, when the range is bounded.
    pub fn last_byte(&self) -> Option<u64> {
        self.length.map(|length| self.offset + length - 1)
    }

    pub fn to_http_range(&self) -> String {
        if let Some(length) = self.length {
            format!("bytes={}-{}", self.offset, self.offset + length - 1)
        } else {
            format!("bytes={}-", self.offset)
        }
    }
}

/// The byte range shall be expressed and formatted as a byte-range-spec as
/// defined in IETF RFC 7233:2014, subclause 2.1. It is restricted to a single
/// expression identifying a contiguous range of bytes.
pub fn parse_media_range<S>(s: S) -> MizukiResult<ByteRange>
where
    S: AsRef<str>,
{
    let (start, end) = s
        .as_ref()
        .split_once('-')
        .ok_or_else(|| MizukiError::InvalidMediaRange(s.as_ref().to_string()))?;

    let first_byte_pos = start
        .parse::<u64>()
        .map_err(|_| MizukiError::InvalidMediaRange(s.as_ref().to_string()))?;
    let last_byte_pos = end.parse::<u64>().ok();

    Ok(ByteRange {
        offset: first_byte_pos,
        // 0 - 500 means 501 bytes
        // So length = end - start + 1
        length: last_byte_pos.map(|last_byte_pos| last_byte_pos - first_byte_pos + 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_http_range() {
        let range = ByteRange::new(10, Some(10));
        assert_eq!(range.to_http_range(), "bytes=10-19");

        let range = ByteRange::new(10, None);
        assert_eq!(range.to_http_range(), "bytes=10-");
    }

    #[test]
    fn test_from_inclusive() {
        let range = ByteRange::from_inclusive(100, 199);
        assert_eq!(range.offset, 100);
        assert_eq!(range.length, Some(100));
        assert_eq!(range.last_byte(), Some(199));
    }

    #[test]
    fn test_parse_media_range() {
        let range = parse_media_range("0-599").unwrap();
        assert_eq!(range.offset, 0);
        assert_eq!(range.length, Some(600));

        let range = parse_media_range("600-").unwrap();
        assert_eq!(range.offset, 600);
        assert_eq!(range.length, None);

        assert!(parse_media_range("oops").is_err());
    }
}
