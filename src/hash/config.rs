// Tuning parameters for the match finder.
//
// A COPY record costs 12 bytes of on-disk header, so a match shorter
// than that saves nothing; the beneficiality floor rises with input
// size to keep operation counts sane on big files.

/// Rolling-hash window width in bytes.
pub const DEFAULT_WINDOW: u32 = 32;

/// Shortest match the finder will record.
pub const DEFAULT_MIN_MATCH: u32 = 32;

/// Default beneficiality floor (on-disk COPY header is 12 bytes).
pub const DEFAULT_MIN_BENEFICIAL: u32 = 12;

/// Beneficiality floor for new buffers over 10 MiB.
pub const MIN_BENEFICIAL_LARGE: u32 = 16;

/// Beneficiality floor for new buffers over 50 MiB.
pub const MIN_BENEFICIAL_HUGE: u32 = 32;

/// Input size above which the large floor applies.
pub const LARGE_INPUT: usize = 10 * 1024 * 1024;

/// Input size above which the huge floor applies.
pub const HUGE_INPUT: usize = 50 * 1024 * 1024;

/// Buckets in the chained index built over the reference buffer.
pub const DEFAULT_BUCKET_COUNT: u32 = 65_536;

/// Candidate chain entries examined per probe.
pub const MAX_CANDIDATES: usize = 20;

/// Hard cap on a single match extension (1 MiB).
pub const MAX_MATCH_LEN: u32 = 1 << 20;

/// Cover size below which the sparse-cover fallback pass may fire.
pub const SPARSE_COVER_MATCHES: usize = 10;

/// New-buffer size above which the fallback pass is worth a second scan.
pub const FALLBACK_INPUT_FLOOR: usize = 1 << 20;

/// Beneficiality floor used by the fallback pass.
pub const FALLBACK_MIN_BENEFICIAL: u32 = 32;

/// Resolved parameter set for one delta build.
#[derive(Debug, Clone, Copy)]
pub struct FinderParams {
    /// Rolling-hash window width.
    pub window_size: u32,
    /// Shortest acceptable match.
    pub min_match: u32,
    /// Shortest match worth a COPY record.
    pub min_beneficial: u32,
    /// Chained-index bucket count.
    pub bucket_count: u32,
    /// Candidates examined per index probe.
    pub max_candidates: usize,
}

impl Default for FinderParams {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW,
            min_match: DEFAULT_MIN_MATCH,
            min_beneficial: DEFAULT_MIN_BENEFICIAL,
            bucket_count: DEFAULT_BUCKET_COUNT,
            max_candidates: MAX_CANDIDATES,
        }
    }
}

impl FinderParams {
    /// Parameters scaled to the size of the new buffer.
    pub fn for_input_len(new_len: usize) -> Self {
        let min_beneficial = if new_len > HUGE_INPUT {
            MIN_BENEFICIAL_HUGE
        } else if new_len > LARGE_INPUT {
            MIN_BENEFICIAL_LARGE
        } else {
            DEFAULT_MIN_BENEFICIAL
        };
        Self {
            min_beneficial,
            ..Self::default()
        }
    }
}
