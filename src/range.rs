//! Parsing of single `bytes=<start>-<end>` range headers.

use thiserror::Error;

const BYTES_UNIT: &str = "bytes=";

/// Represents a single byte range with inclusive start and end positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// Reasons a `Range` header cannot be satisfied against a body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRange {
    #[error("range header {0:?} is not of the form bytes=<start>-<end>")]
    Malformed(String),

    #[error("range start {start} is past range end {end}")]
    Reversed { start: u64, end: u64 },

    #[error("range start {start} is beyond the last byte of a {length} byte body")]
    OutOfBounds { start: u64, length: u64 },
}

impl ByteRange {
    /// Create a byte range covering `start..=end`.
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    /// Number of bytes covered, both ends included.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`: both ends are included, so a range holds at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Resolve a `Range` header value against a body of `total_bytes`.
    ///
    /// An omitted end means "through the last byte" and an end past the
    /// last byte is clamped to it. A start at or past `total_bytes` can
    /// never be satisfied, so every range against an empty body fails.
    pub fn parse(header: &str, total_bytes: u64) -> Result<ByteRange, InvalidRange> {
        let malformed = || InvalidRange::Malformed(header.to_owned());

        let spec = header.trim().strip_prefix(BYTES_UNIT).ok_or_else(malformed)?;
        let (start, end) = spec.split_once('-').ok_or_else(malformed)?;

        let start = parse_position(start).ok_or_else(malformed)?;
        let end = match end.trim() {
            "" => None,
            end => Some(parse_position(end).ok_or_else(malformed)?),
        };

        if let Some(end) = end {
            if start > end {
                return Err(InvalidRange::Reversed { start, end });
            }
        }

        if start >= total_bytes {
            return Err(InvalidRange::OutOfBounds { start, length: total_bytes });
        }

        let last = total_bytes - 1;
        let end = end.map_or(last, |end| end.min(last));
        Ok(ByteRange::new(start, end))
    }
}

// `u64::from_str` accepts a leading `+`, which is not a valid byte position.
fn parse_position(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
