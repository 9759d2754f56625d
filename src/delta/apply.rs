// Executes an operation stream against a reference buffer.
//
// Bounds failures are fatal and typed: a COPY reaching past the
// reference or any operation overrunning the declared output size
// aborts the whole application.  The output is never truncated or
// silently extended.

use super::{Delta, Op};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure while applying a delta.
#[derive(Debug)]
pub enum ApplyError {
    /// A COPY would read past the end of the reference buffer.
    ReferenceOutOfRange {
        ref_offset: u32,
        length: u32,
        reference_len: usize,
    },
    /// An operation would write past the declared output size.
    OutputOverflow {
        cursor: u32,
        length: u32,
        new_size: u32,
    },
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReferenceOutOfRange {
                ref_offset,
                length,
                reference_len,
            } => write!(
                f,
                "copy of {length} bytes at reference offset {ref_offset} exceeds reference length {reference_len}"
            ),
            Self::OutputOverflow {
                cursor,
                length,
                new_size,
            } => write!(
                f,
                "operation of {length} bytes at output offset {cursor} exceeds declared size {new_size}"
            ),
        }
    }
}

impl std::error::Error for ApplyError {}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Apply `delta` to `reference`, producing the new buffer.
///
/// An empty reference is accepted whenever the delta contains no COPY
/// (the first revision of a chain).  REPLACE writes its payload exactly
/// like INSERT; the reference range it names is ignored.
pub fn apply_delta(delta: &Delta, reference: &[u8]) -> Result<Vec<u8>, ApplyError> {
    let new_size = delta.new_size();
    let mut out = Vec::with_capacity(new_size as usize);
    let mut cursor = 0u32;

    for op in delta.ops() {
        let length = op.length();
        if cursor + length > new_size {
            return Err(ApplyError::OutputOverflow {
                cursor,
                length,
                new_size,
            });
        }
        match op {
            Op::Copy { ref_offset, length } => {
                let start = *ref_offset as usize;
                let end = start + *length as usize;
                if end > reference.len() {
                    return Err(ApplyError::ReferenceOutOfRange {
                        ref_offset: *ref_offset,
                        length: *length,
                        reference_len: reference.len(),
                    });
                }
                out.extend_from_slice(&reference[start..end]);
            }
            Op::Insert { bytes } | Op::Replace { bytes, .. } => {
                out.extend_from_slice(bytes);
            }
        }
        cursor += length;
    }

    debug_assert_eq!(cursor, new_size);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_and_insert() {
        let reference = b"Hello World";
        let delta = Delta::from_ops(
            reference.len() as u32,
            vec![
                Op::Copy {
                    ref_offset: 0,
                    length: 5,
                },
                Op::Insert {
                    bytes: b", delta".to_vec(),
                },
            ],
        );
        assert_eq!(apply_delta(&delta, reference).unwrap(), b"Hello, delta");
    }

    #[test]
    fn empty_delta_yields_empty_buffer() {
        let delta = Delta::from_ops(11, Vec::new());
        assert_eq!(apply_delta(&delta, b"Hello World").unwrap(), b"");
    }

    #[test]
    fn insert_only_accepts_empty_reference() {
        let delta = Delta::from_ops(
            0,
            vec![Op::Insert {
                bytes: b"first revision".to_vec(),
            }],
        );
        assert_eq!(apply_delta(&delta, b"").unwrap(), b"first revision");
    }

    #[test]
    fn copy_against_empty_reference_fails() {
        let delta = Delta::from_ops(
            0,
            vec![Op::Copy {
                ref_offset: 0,
                length: 1,
            }],
        );
        assert!(matches!(
            apply_delta(&delta, b""),
            Err(ApplyError::ReferenceOutOfRange { .. })
        ));
    }

    #[test]
    fn copy_past_reference_end_fails() {
        let delta = Delta::from_ops(
            4,
            vec![Op::Copy {
                ref_offset: 2,
                length: 5,
            }],
        );
        let err = apply_delta(&delta, b"abcd").unwrap_err();
        assert!(matches!(err, ApplyError::ReferenceOutOfRange { .. }));
        // Error message carries the offending bounds.
        assert!(err.to_string().contains("offset 2"));
    }

    #[test]
    fn replace_writes_like_insert() {
        let delta = Delta::from_ops(
            5,
            vec![
                Op::Copy {
                    ref_offset: 0,
                    length: 2,
                },
                Op::Replace {
                    ref_offset: 2,
                    bytes: b"XYZ".to_vec(),
                },
            ],
        );
        assert_eq!(apply_delta(&delta, b"abcde").unwrap(), b"abXYZ");
    }

    #[test]
    fn reconstructed_length_matches_declared() {
        let reference: Vec<u8> = (0..=255).collect();
        let delta = Delta::from_ops(
            256,
            vec![
                Op::Copy {
                    ref_offset: 128,
                    length: 128,
                },
                Op::Copy {
                    ref_offset: 0,
                    length: 128,
                },
            ],
        );
        let out = apply_delta(&delta, &reference).unwrap();
        assert_eq!(out.len(), delta.new_size() as usize);
        assert_eq!(&out[..128], &reference[128..]);
        assert_eq!(&out[128..], &reference[..128]);
    }
}
