// Turns a match cover into a gap-free operation stream.
//
// Matches arrive non-overlapping; a stable sort on new_offset fixes the
// emission order, and the walk inserts literal gaps between copies so
// that consecutive operations tile the new buffer exactly.

use super::{Delta, Op};
use crate::hash::matching::Match;

/// Plan a delta for `new` from a non-overlapping match cover.
///
/// For every match, any new-buffer bytes between the cursor and the
/// match become an INSERT, the match itself a COPY; a trailing INSERT
/// flushes whatever follows the last match.  The result covers all of
/// `new`: `new_size == new.len()`.
pub fn plan(new: &[u8], original_size: u32, mut matches: Vec<Match>) -> Delta {
    matches.sort_by_key(|m| m.new_offset);

    let mut ops = Vec::with_capacity(matches.len() * 2 + 1);
    let mut cursor = 0usize;

    for m in &matches {
        let start = m.new_offset as usize;
        if start > cursor {
            ops.push(Op::Insert {
                bytes: new[cursor..start].to_vec(),
            });
        }
        ops.push(Op::Copy {
            ref_offset: m.ref_offset,
            length: m.length,
        });
        cursor = start + m.length as usize;
    }

    if cursor < new.len() {
        ops.push(Op::Insert {
            bytes: new[cursor..].to_vec(),
        });
    }

    Delta::from_ops(original_size, ops)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
