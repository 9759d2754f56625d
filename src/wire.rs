// On-disk encoding of delta operation streams and version metadata.
//
// Everything is little-endian and byte-exact; nothing here depends on
// host struct layout.
//
// Delta file: operation records in emission order, no file header (the
// record count lives in the sibling metadata file).
//
//   offset  size    field
//   0       4       type: 0=COPY, 1=INSERT, 2=REPLACE
//   4       4       ref_offset
//   8       4       length
//   12      length  raw bytes (absent for COPY)
//
// Metadata file: one fixed 600-byte record.
//
//   size    field
//   256     filename, NUL-padded
//   4       version
//   4       original_size
//   4       delta_size
//   4       operation_count
//   8       timestamp, seconds since epoch
//   64      checksum, ASCII hex, NUL-padded
//   256     message, NUL-padded
//
// The four u32 counters end at offset 272, which is the 8-byte-aligned
// slot the timestamp occupies; the record needs no interior padding to
// hit the committed 600-byte size.

use crate::delta::{Delta, Op};

/// Operation header bytes preceding any payload.
pub const OP_HEADER_LEN: usize = 12;

/// Fixed metadata record size.
pub const METADATA_LEN: usize = 600;

/// Capacity of the filename and message fields (one NUL reserved).
pub const MAX_NAME_LEN: usize = 255;

const FILENAME_LEN: usize = 256;
const CHECKSUM_LEN: usize = 64;
const MESSAGE_LEN: usize = 256;

const OP_COPY: u32 = 0;
const OP_INSERT: u32 = 1;
const OP_REPLACE: u32 = 2;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A persisted record failed to decode.
#[derive(Debug)]
pub enum WireError {
    /// Record ended before the advertised bytes.
    Truncated { expected: usize, available: usize },
    /// Operation tag outside 0..=2.
    UnknownOpType(u32),
    /// An INSERT or REPLACE record with zero payload length.
    EmptyPayload { record: u32 },
    /// Bytes remained after the advertised record count.
    TrailingBytes(usize),
    /// A text field held invalid UTF-8.
    BadText(&'static str),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated {
                expected,
                available,
            } => write!(
                f,
                "malformed record: expected {expected} bytes, only {available} available"
            ),
            Self::UnknownOpType(tag) => write!(f, "malformed record: unknown operation type {tag}"),
            Self::EmptyPayload { record } => {
                write!(f, "malformed record: operation {record} has empty payload")
            }
            Self::TrailingBytes(count) => {
                write!(f, "malformed record: {count} trailing bytes after last operation")
            }
            Self::BadText(field) => write!(f, "malformed record: {field} is not valid UTF-8"),
        }
    }
}

impl std::error::Error for WireError {}

// ---------------------------------------------------------------------------
// Delta codec
// ---------------------------------------------------------------------------

/// Serialise a delta's operation stream.
pub fn encode_delta(delta: &Delta) -> Vec<u8> {
    let total: usize = delta
        .ops()
        .iter()
        .map(|op| OP_HEADER_LEN + op.payload().map_or(0, <[u8]>::len))
        .sum();
    let mut out = Vec::with_capacity(total);

    for op in delta.ops() {
        let (tag, ref_offset, length, payload) = match op {
            Op::Copy { ref_offset, length } => (OP_COPY, *ref_offset, *length, None),
            Op::Insert { bytes } => (OP_INSERT, 0, bytes.len() as u32, Some(bytes.as_slice())),
            Op::Replace { ref_offset, bytes } => (
                OP_REPLACE,
                *ref_offset,
                bytes.len() as u32,
                Some(bytes.as_slice()),
            ),
        };
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&ref_offset.to_le_bytes());
        out.extend_from_slice(&length.to_le_bytes());
        if let Some(payload) = payload {
            out.extend_from_slice(payload);
        }
    }
    out
}

/// Decode exactly `operation_count` records from `bytes`.
///
/// `original_size` seeds the returned delta's reference length; the
/// other totals are recomputed from the decoded operations.
pub fn decode_delta(
    bytes: &[u8],
    operation_count: u32,
    original_size: u32,
) -> Result<Delta, WireError> {
    let mut ops = Vec::with_capacity(operation_count as usize);
    let mut at = 0usize;

    for record in 0..operation_count {
        if at + OP_HEADER_LEN > bytes.len() {
            return Err(WireError::Truncated {
                expected: at + OP_HEADER_LEN,
                available: bytes.len(),
            });
        }
        let tag = read_u32(bytes, at);
        let ref_offset = read_u32(bytes, at + 4);
        let length = read_u32(bytes, at + 8);
        at += OP_HEADER_LEN;

        match tag {
            OP_COPY => ops.push(Op::Copy { ref_offset, length }),
            OP_INSERT | OP_REPLACE => {
                if length == 0 {
                    return Err(WireError::EmptyPayload { record });
                }
                let end = at + length as usize;
                if end > bytes.len() {
                    return Err(WireError::Truncated {
                        expected: end,
                        available: bytes.len(),
                    });
                }
                let payload = bytes[at..end].to_vec();
                at = end;
                if tag == OP_INSERT {
                    ops.push(Op::Insert { bytes: payload });
                } else {
                    ops.push(Op::Replace {
                        ref_offset,
                        bytes: payload,
                    });
                }
            }
            other => return Err(WireError::UnknownOpType(other)),
        }
    }

    if at != bytes.len() {
        return Err(WireError::TrailingBytes(bytes.len() - at));
    }
    Ok(Delta::from_ops(original_size, ops))
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

// ---------------------------------------------------------------------------
// Metadata codec
// ---------------------------------------------------------------------------

/// Per-revision metadata as persisted next to each delta file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Original filename; an opaque key of at most 255 bytes.
    pub filename: String,
    /// Revision number, starting at 1.
    pub version: u32,
    /// Reference buffer length the delta was built against.
    pub original_size: u32,
    /// Embedded payload bytes in the delta.
    pub delta_size: u32,
    /// Records in the sibling delta file.
    pub operation_count: u32,
    /// Creation time, seconds since the epoch.
    pub timestamp: u64,
    /// Advisory additive byte-sum of the reference buffer, lowercase hex.
    pub checksum: String,
    /// Free-form message of at most 255 bytes.
    pub message: String,
}

/// Serialise a metadata record into its fixed 600-byte layout.
pub fn encode_metadata(meta: &Metadata) -> [u8; METADATA_LEN] {
    let mut out = [0u8; METADATA_LEN];
    write_text(&mut out[0..FILENAME_LEN], &meta.filename);
    out[256..260].copy_from_slice(&meta.version.to_le_bytes());
    out[260..264].copy_from_slice(&meta.original_size.to_le_bytes());
    out[264..268].copy_from_slice(&meta.delta_size.to_le_bytes());
    out[268..272].copy_from_slice(&meta.operation_count.to_le_bytes());
    out[272..280].copy_from_slice(&meta.timestamp.to_le_bytes());
    write_text(&mut out[280..280 + CHECKSUM_LEN], &meta.checksum);
    write_text(&mut out[344..344 + MESSAGE_LEN], &meta.message);
    out
}

/// Decode a fixed metadata record.
pub fn decode_metadata(bytes: &[u8]) -> Result<Metadata, WireError> {
    if bytes.len() < METADATA_LEN {
        return Err(WireError::Truncated {
            expected: METADATA_LEN,
            available: bytes.len(),
        });
    }
    Ok(Metadata {
        filename: read_text(&bytes[0..FILENAME_LEN], "filename")?,
        version: read_u32(bytes, 256),
        original_size: read_u32(bytes, 260),
        delta_size: read_u32(bytes, 264),
        operation_count: read_u32(bytes, 268),
        timestamp: u64::from_le_bytes(bytes[272..280].try_into().unwrap()),
        checksum: read_text(&bytes[280..280 + CHECKSUM_LEN], "checksum")?,
        message: read_text(&bytes[344..344 + MESSAGE_LEN], "message")?,
    })
}

/// Copy `text` into a NUL-padded field, truncating to leave one NUL.
fn write_text(field: &mut [u8], text: &str) {
    let n = text.len().min(field.len() - 1);
    field[..n].copy_from_slice(&text.as_bytes()[..n]);
}

/// Read a NUL-padded text field.
fn read_text(field: &[u8], name: &'static str) -> Result<String, WireError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end])
        .map(str::to_owned)
        .map_err(|_| WireError::BadText(name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_delta() -> Delta {
        Delta::from_ops(
            50,
            vec![
                Op::Copy {
                    ref_offset: 0,
                    length: 20,
                },
                Op::Insert {
                    bytes: b"inserted".to_vec(),
                },
                Op::Copy {
                    ref_offset: 30,
                    length: 20,
                },
            ],
        )
    }

    #[test]
    fn copy_record_is_twelve_bytes() {
        let delta = Delta::from_ops(
            10,
            vec![Op::Copy {
                ref_offset: 3,
                length: 7,
            }],
        );
        let bytes = encode_delta(&delta);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &3u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &7u32.to_le_bytes());
    }

    #[test]
    fn insert_record_carries_payload() {
        let delta = Delta::from_ops(
            0,
            vec![Op::Insert {
                bytes: b"abc".to_vec(),
            }],
        );
        let bytes = encode_delta(&delta);
        assert_eq!(bytes.len(), 15);
        assert_eq!(&bytes[0..4], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
        assert_eq!(&bytes[12..], b"abc");
    }

    #[test]
    fn delta_roundtrip() {
        let delta = sample_delta();
        let bytes = encode_delta(&delta);
        let back = decode_delta(&bytes, delta.operation_count(), 50).unwrap();
        assert_eq!(back, delta);
        assert_eq!(back.delta_size(), 8);
        assert_eq!(back.new_size(), 48);
    }

    #[test]
    fn replace_survives_the_codec() {
        let delta = Delta::from_ops(
            9,
            vec![Op::Replace {
                ref_offset: 4,
                bytes: b"zz".to_vec(),
            }],
        );
        let bytes = encode_delta(&delta);
        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        let back = decode_delta(&bytes, 1, 9).unwrap();
        assert_eq!(back, delta);
    }

    #[test]
    fn truncated_header_rejected() {
        let bytes = encode_delta(&sample_delta());
        let err = decode_delta(&bytes[..10], 3, 50).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }

    #[test]
    fn truncated_payload_rejected() {
        let delta = Delta::from_ops(
            0,
            vec![Op::Insert {
                bytes: vec![9; 100],
            }],
        );
        let bytes = encode_delta(&delta);
        assert!(matches!(
            decode_delta(&bytes[..40], 1, 0),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn unknown_tag_rejected() {
        let mut bytes = encode_delta(&sample_delta());
        bytes[0] = 9;
        assert!(matches!(
            decode_delta(&bytes, 3, 50),
            Err(WireError::UnknownOpType(9))
        ));
    }

    #[test]
    fn empty_insert_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            decode_delta(&bytes, 1, 0),
            Err(WireError::EmptyPayload { record: 0 })
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode_delta(&sample_delta());
        bytes.push(0xFF);
        assert!(matches!(
            decode_delta(&bytes, 3, 50),
            Err(WireError::TrailingBytes(1))
        ));
    }

    #[test]
    fn count_shorter_than_stream_rejected() {
        // Declaring fewer records than are present leaves trailing bytes.
        let bytes = encode_delta(&sample_delta());
        assert!(matches!(
            decode_delta(&bytes, 2, 50),
            Err(WireError::TrailingBytes(_))
        ));
    }

    // --- metadata ---

    fn sample_metadata() -> Metadata {
        Metadata {
            filename: "docs/report.pdf".into(),
            version: 7,
            original_size: 1234,
            delta_size: 88,
            operation_count: 5,
            timestamp: 1_700_000_000,
            checksum: "0003ad9e".into(),
            message: "tightened the abstract".into(),
        }
    }

    #[test]
    fn metadata_record_is_600_bytes() {
        let bytes = encode_metadata(&sample_metadata());
        assert_eq!(bytes.len(), METADATA_LEN);
        // Fixed offsets: version directly after the filename field,
        // timestamp at its 8-aligned slot.
        assert_eq!(&bytes[256..260], &7u32.to_le_bytes());
        assert_eq!(&bytes[272..280], &1_700_000_000u64.to_le_bytes());
        assert_eq!(&bytes[280..288], b"0003ad9e");
        assert_eq!(bytes[288], 0);
    }

    #[test]
    fn metadata_roundtrip() {
        let meta = sample_metadata();
        let back = decode_metadata(&encode_metadata(&meta)).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn metadata_empty_message() {
        let meta = Metadata {
            message: String::new(),
            ..sample_metadata()
        };
        let back = decode_metadata(&encode_metadata(&meta)).unwrap();
        assert_eq!(back.message, "");
    }

    #[test]
    fn metadata_fields_truncate_to_capacity() {
        let meta = Metadata {
            message: "m".repeat(400),
            ..sample_metadata()
        };
        let back = decode_metadata(&encode_metadata(&meta)).unwrap();
        assert_eq!(back.message.len(), MAX_NAME_LEN);
    }

    #[test]
    fn metadata_short_buffer_rejected() {
        let bytes = encode_metadata(&sample_metadata());
        assert!(matches!(
            decode_metadata(&bytes[..599]),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn metadata_bad_utf8_rejected() {
        let mut bytes = encode_metadata(&sample_metadata());
        bytes[0] = 0xFF;
        bytes[1] = 0xFE;
        assert!(matches!(
            decode_metadata(&bytes),
            Err(WireError::BadText("filename"))
        ));
    }
}
