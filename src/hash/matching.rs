// Match discovery between a reference buffer and a new buffer.
//
// Three pieces:
//   1. Stride comparators (8-byte, then 4-byte, then 1-byte) used for
//      affix scanning and match extension.
//   2. The prefix/suffix scanner: longest common head and tail runs,
//      never overlapping (the prefix is grown first).
//   3. The match finder: a single rolling hash slides over the new
//      buffer, probing a chained index built over the reference; the
//      longest byte-verified candidate wins and the cover jumps past it.
//
// Hash collisions need no separate validation step: extension starts at
// the candidate's first byte, so a false candidate stalls below the
// minimum match length and is rejected.

use super::config::{
    FALLBACK_INPUT_FLOOR, FALLBACK_MIN_BENEFICIAL, FinderParams, MAX_MATCH_LEN,
    SPARSE_COVER_MATCHES,
};
use super::rolling::RollingHash;
use super::table::ChainedIndex;

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// A byte-identical region shared by the reference and new buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Start of the region in the reference buffer.
    pub ref_offset: u32,
    /// Start of the region in the new buffer.
    pub new_offset: u32,
    /// Region length in bytes.
    pub length: u32,
}

// ---------------------------------------------------------------------------
// Stride comparators
// ---------------------------------------------------------------------------

/// Count matching bytes of `a` and `b` from the front, up to `limit`.
///
/// Compares 8 bytes at a time via u64 XOR, then 4, then singles.
#[inline]
pub fn forward_match(a: &[u8], b: &[u8], limit: usize) -> usize {
    let n = limit.min(a.len()).min(b.len());
    let mut i = 0;

    while i + 8 <= n {
        let x = u64::from_le_bytes(a[i..i + 8].try_into().unwrap());
        let y = u64::from_le_bytes(b[i..i + 8].try_into().unwrap());
        let xor = x ^ y;
        if xor != 0 {
            return i + (xor.trailing_zeros() / 8) as usize;
        }
        i += 8;
    }

    if i + 4 <= n {
        let x = u32::from_le_bytes(a[i..i + 4].try_into().unwrap());
        let y = u32::from_le_bytes(b[i..i + 4].try_into().unwrap());
        if x == y {
            i += 4;
        }
    }

    while i < n && a[i] == b[i] {
        i += 1;
    }
    i
}

/// Count matching bytes of `a` and `b` from the back, up to `limit`.
#[inline]
pub fn backward_match(a: &[u8], b: &[u8], limit: usize) -> usize {
    let n = limit.min(a.len()).min(b.len());
    let (ea, eb) = (a.len(), b.len());
    let mut i = 0;

    while i + 8 <= n {
        let x = u64::from_le_bytes(a[ea - i - 8..ea - i].try_into().unwrap());
        let y = u64::from_le_bytes(b[eb - i - 8..eb - i].try_into().unwrap());
        let xor = x ^ y;
        if xor != 0 {
            return i + (xor.leading_zeros() / 8) as usize;
        }
        i += 8;
    }

    if i + 4 <= n {
        let x = u32::from_le_bytes(a[ea - i - 4..ea - i].try_into().unwrap());
        let y = u32::from_le_bytes(b[eb - i - 4..eb - i].try_into().unwrap());
        if x == y {
            i += 4;
        }
    }

    while i < n && a[ea - i - 1] == b[eb - i - 1] {
        i += 1;
    }
    i
}

// ---------------------------------------------------------------------------
// Prefix/suffix scanner
// ---------------------------------------------------------------------------

/// Longest common prefix and suffix of `reference` and `new`.
///
/// Guarantees `p + s <= min(|reference|, |new|)`: the prefix is grown
/// first and the suffix scan stops where it would cross the prefix.
pub fn scan_affixes(reference: &[u8], new: &[u8]) -> (usize, usize) {
    let bound = reference.len().min(new.len());
    let prefix = forward_match(reference, new, bound);
    let suffix = backward_match(reference, new, bound - prefix);
    (prefix, suffix)
}

// ---------------------------------------------------------------------------
// Match finder
// ---------------------------------------------------------------------------

/// Index every window-aligned position of the reference buffer.
fn build_index(reference: &[u8], params: &FinderParams) -> ChainedIndex {
    let w = params.window_size as usize;
    let positions = reference.len().saturating_sub(w - 1);
    let mut index = ChainedIndex::with_capacity(params.bucket_count, positions);
    let mut rh = RollingHash::new(params.window_size);

    for (i, &byte) in reference.iter().enumerate() {
        rh.update(byte);
        if i + 1 >= w {
            index.insert(rh.get(), (i + 1 - w) as u32);
        }
    }
    index
}

/// One greedy left-to-right scan of the new buffer.
fn scan_cover(
    reference: &[u8],
    new: &[u8],
    index: &ChainedIndex,
    params: &FinderParams,
    min_beneficial: u32,
) -> Vec<Match> {
    let w = params.window_size as usize;
    let mut matches = Vec::new();

    let mut rh = RollingHash::new(params.window_size);
    for &byte in &new[..w] {
        rh.update(byte);
    }

    let mut i = 0usize;
    while i + w <= new.len() {
        let hash = rh.get();

        let mut best_len = 0usize;
        let mut best_ref = 0usize;
        for offset in index.candidates(hash).take(params.max_candidates) {
            let offset = offset as usize;
            let limit = (new.len() - i)
                .min(reference.len() - offset)
                .min(MAX_MATCH_LEN as usize);
            let len = forward_match(&reference[offset..], &new[i..], limit);
            if len > best_len {
                best_len = len;
                best_ref = offset;
            }
        }

        if best_len >= params.min_match as usize && best_len >= min_beneficial as usize {
            matches.push(Match {
                ref_offset: best_ref as u32,
                new_offset: i as u32,
                length: best_len as u32,
            });
            // Non-overlapping cover: jump past the match and re-prime.
            i += best_len;
            if i + w <= new.len() {
                rh.reset();
                for &byte in &new[i..i + w] {
                    rh.update(byte);
                }
            }
        } else {
            if i + w < new.len() {
                rh.update(new[i + w]);
            }
            i += 1;
        }
    }

    matches
}

/// Greedy non-overlapping cover of `new` by long matches in `reference`.
///
/// Matches are returned in ascending `new_offset` order.  When a big
/// input yields a sparse cover, a second pass with the fallback
/// beneficiality floor runs, and its cover replaces the first only if
/// it holds strictly more matches.
pub fn find_cover(reference: &[u8], new: &[u8], params: &FinderParams) -> Vec<Match> {
    let w = params.window_size as usize;
    if reference.len() < w || new.len() < w {
        return Vec::new();
    }

    let index = build_index(reference, params);
    let cover = scan_cover(reference, new, &index, params, params.min_beneficial);

    if cover.len() < SPARSE_COVER_MATCHES && new.len() > FALLBACK_INPUT_FLOOR {
        let retry = scan_cover(reference, new, &index, params, FALLBACK_MIN_BENEFICIAL);
        if retry.len() > cover.len() {
            return retry;
        }
    }
    cover
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
