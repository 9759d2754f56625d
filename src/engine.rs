// Delta engine entry points: strategy dispatch, application, chain
// reconstruction.
//
// Building a delta picks one of three strategies from a cheap
// structural look at the two buffers, evaluated in order:
//
//   Append   — the new buffer is the old one plus a short tail: two
//              operations, no hashing.
//   Sandwich — a long common prefix and/or suffix bracket a small
//              middle: at most three operations, no hashing.
//   Matcher  — the full rolling-hash cover (hash module) followed by
//              the planner.
//
// Reconstruction folds the delta chain from revision 1, rotating the
// (previous, next) buffers by move.

use crate::delta::planner;
use crate::delta::{Delta, Op};
use crate::hash::config::FinderParams;
use crate::hash::matching::{self, Match};

pub use crate::delta::apply::{ApplyError, apply_delta};

// ---------------------------------------------------------------------------
// Strategy thresholds
// ---------------------------------------------------------------------------

/// Append strategy: maximum growth in bytes.
const APPEND_MAX_GROWTH: usize = 1000;

/// Sandwich strategy: maximum change magnitude in bytes.
const SANDWICH_MAX_CHANGE: usize = 10_000;

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

/// The compression strategy chosen for one delta build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// COPY the common prefix, INSERT the appended tail.
    Append { prefix: usize },
    /// COPY prefix, INSERT the middle, COPY suffix.
    Sandwich { prefix: usize, suffix: usize },
    /// Rolling-hash match cover.
    Matcher,
}

/// Pick a strategy from the affix scan; O(|R| + |N|).
fn choose_strategy(reference: &[u8], new: &[u8]) -> Strategy {
    let (r, n) = (reference.len(), new.len());
    let (prefix, suffix) = matching::scan_affixes(reference, new);

    // Append-only: the old content survives almost untouched at the
    // front and only a short tail is new.
    if n > r && n - r < APPEND_MAX_GROWTH && (prefix as u64) * 20 > (r as u64) * 19 {
        return Strategy::Append { prefix };
    }

    // Sandwich: affixes dominate, or the size change is tiny relative
    // to the reference (under min(10_000, 1% of |R|)).
    let change = r.abs_diff(n);
    let affixes_dominate = ((prefix + suffix) as u64) * 5 > (r as u64) * 4;
    let change_is_tiny = change < SANDWICH_MAX_CHANGE && (change as u64) * 100 < r as u64;
    if affixes_dominate || change_is_tiny {
        return Strategy::Sandwich { prefix, suffix };
    }

    Strategy::Matcher
}

// ---------------------------------------------------------------------------
// Delta construction
// ---------------------------------------------------------------------------

/// Build a delta that transforms `reference` into `new`.
///
/// The first revision (`reference` empty) short-circuits to a single
/// INSERT of the whole buffer; an empty `new` always yields the empty
/// delta.
pub fn build_delta(reference: &[u8], new: &[u8]) -> Delta {
    let original_size = reference.len() as u32;

    if new.is_empty() {
        return Delta::from_ops(original_size, Vec::new());
    }
    if reference.is_empty() {
        return Delta::from_ops(
            0,
            vec![Op::Insert {
                bytes: new.to_vec(),
            }],
        );
    }

    match choose_strategy(reference, new) {
        Strategy::Append { prefix } => {
            Delta::from_ops(
                original_size,
                vec![
                    Op::Copy {
                        ref_offset: 0,
                        length: prefix as u32,
                    },
                    Op::Insert {
                        bytes: new[prefix..].to_vec(),
                    },
                ],
            )
        }
        Strategy::Sandwich { prefix, suffix } => {
            let mut ops = Vec::with_capacity(3);
            if prefix > 0 {
                ops.push(Op::Copy {
                    ref_offset: 0,
                    length: prefix as u32,
                });
            }
            let middle = &new[prefix..new.len() - suffix];
            if !middle.is_empty() {
                ops.push(Op::Insert {
                    bytes: middle.to_vec(),
                });
            }
            if suffix > 0 {
                ops.push(Op::Copy {
                    ref_offset: (reference.len() - suffix) as u32,
                    length: suffix as u32,
                });
            }
            Delta::from_ops(original_size, ops)
        }
        Strategy::Matcher => {
            let params = FinderParams::for_input_len(new.len());
            let cover: Vec<Match> = matching::find_cover(reference, new, &params);
            planner::plan(new, original_size, cover)
        }
    }
}

// ---------------------------------------------------------------------------
// Chain reconstruction
// ---------------------------------------------------------------------------

/// Loads persisted deltas for [`reconstruct`].
pub trait DeltaSource {
    /// Load the delta recorded for revision `version` of `name`.
    fn load_delta(
        &self,
        name: &str,
        version: u32,
    ) -> Result<Delta, Box<dyn std::error::Error + Send + Sync>>;
}

/// Failure surfaced by the engine.
#[derive(Debug)]
pub enum EngineError {
    /// Caller error: zero target version and similar misuse.
    InvalidArgument(&'static str),
    /// A delta in the chain failed to apply.
    Apply { version: u32, source: ApplyError },
    /// A required revision delta could not be loaded.
    ChainBroken {
        version: u32,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Apply { version, source } => {
                write!(f, "applying delta for version {version}: {source}")
            }
            Self::ChainBroken { version, source } => {
                write!(f, "cannot load delta for version {version}: {source}")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidArgument(_) => None,
            Self::Apply { source, .. } => Some(source),
            Self::ChainBroken { source, .. } => Some(source.as_ref()),
        }
    }
}

/// Rebuild the bytes of revision `target` by replaying deltas 1..target.
///
/// Revision 1 applies against a synthetic empty reference.  Transient
/// space is one previous buffer plus the one being produced; the
/// previous drops as soon as the next exists.
pub fn reconstruct<S: DeltaSource>(
    source: &S,
    name: &str,
    target: u32,
) -> Result<Vec<u8>, EngineError> {
    if target == 0 {
        return Err(EngineError::InvalidArgument("target version must be >= 1"));
    }

    let mut buffer = Vec::new();
    for version in 1..=target {
        let delta = source
            .load_delta(name, version)
            .map_err(|source| EngineError::ChainBroken { version, source })?;
        buffer = apply_delta(&delta, &buffer)
            .map_err(|source| EngineError::Apply { version, source })?;
    }
    Ok(buffer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
