//! Compression strategies.
//!
//! A strategy bundles every knob the compressor has: when an input is worth
//! compressing at all, how much the output has to undercut the input, and how
//! hard the match finder works before it settles for what it has. Strategies
//! are plain immutable values; pick one of the built-in ones or build your
//! own.

/// Configuration record deciding when and how aggressively to compress.
///
/// The compressor never fails "halfway": if a strategy's gates cannot be met,
/// the whole attempt is abandoned and the caller stores the input verbatim.
/// That makes an aggressive strategy safe to try - the worst case is wasted
/// work, never a worse artefact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strategy {
    /// Inputs shorter than this are not worth the attempt.
    pub min_input_size: usize,

    /// Inputs longer than this are refused outright.
    pub max_input_size: usize,

    /// Required savings, in percent of the input size.
    ///
    /// The output has to stay below `input_len * (100 - min_comp_rate) / 100`
    /// bytes or the attempt is abandoned. Values above 99 are clamped.
    pub min_comp_rate: u32,

    /// Give up if no back-reference has been emitted by the time the output
    /// has grown to this many bytes.
    ///
    /// This is the early exit for incompressible data: if the first chunk of
    /// input produced only literals, the rest of it will not fare better.
    pub first_success_by: usize,

    /// Stop walking a bucket chain once a candidate of this length is found.
    ///
    /// Clamped to `17..=273`. Lower values trade compression ratio for speed.
    pub match_size_good: usize,

    /// Percent decay applied to `match_size_good` after each chain step, so
    /// that long chains settle for shorter matches the deeper they go.
    ///
    /// Clamped to `0..=100`.
    pub match_size_drop: u32,

    /// Insert only the first byte of each match into the history, then jump
    /// the cursor by the full match length.
    ///
    /// The default (false) inserts every matched byte, which is what the
    /// on-disk format has always been produced with. Skipping costs a little
    /// ratio on the standard corpora and buys a large speedup on highly
    /// compressible data.
    pub skip_after_match: bool,
}

impl Strategy {
    /// The strategy PostgreSQL uses for TOAST: only bother with inputs of at
    /// least 32 bytes, require 25% savings, and give up early when the first
    /// kilobyte of output contains no back-reference.
    pub const DEFAULT: Strategy = Strategy {
        min_input_size: 32,
        max_input_size: usize::MAX,
        min_comp_rate: 25,
        first_success_by: 1024,
        match_size_good: 128,
        match_size_drop: 10,
        skip_after_match: false,
    };

    /// Compress everything that shrinks at all, no matter how slowly.
    pub const ALWAYS: Strategy = Strategy {
        min_input_size: 0,
        max_input_size: usize::MAX,
        min_comp_rate: 0,
        first_success_by: usize::MAX,
        match_size_good: 128,
        match_size_drop: 6,
        skip_after_match: false,
    };

    /// [`Strategy::DEFAULT`] with [`skip_after_match`](Strategy::skip_after_match)
    /// enabled.
    pub const SKIP: Strategy = Strategy {
        skip_after_match: true,
        ..Strategy::DEFAULT
    };
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::DEFAULT
    }
}
