//! The compression algorithm.
//!
//! We make use of a bucket-chained history to find duplicates. Chains are
//! walked under a hard cost cap, so compression speed degrades gracefully on
//! hostile input instead of going quadratic. The memory usage is fixed no
//! matter how large the input is.
//!
//! A compression attempt can be abandoned: every strategy carries an output
//! budget, and once the budget is blown the whole attempt returns an error
//! and the caller stores the input verbatim. The output is only ever a valid,
//! complete stream or nothing.

use std::cmp;
use byteorder::{ByteOrder, NativeEndian, LE};
use culpa::{throw, throws};
use thiserror::Error;

use crate::history::History;
use crate::strategy::Strategy;
use crate::{MAX_MATCH, MAX_OFFSET, MIN_MATCH};

/// Longest bucket chain the match finder is willing to walk per position.
const MAX_CHAIN: usize = 256;

/// Reasons a compression attempt was abandoned.
///
/// None of these mean anything went wrong: they mean "this input is not worth
/// compressing under this strategy". The caller's recovery is always the
/// same - store the input uncompressed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Error)]
pub enum CompressError {
    #[error("the strategy refuses inputs of this size")]
    StrategyRefused,
    #[error("the output would not undercut the input by the rate the strategy demands")]
    BudgetExceeded,
    #[error("no back-reference materialized before the early-abort threshold")]
    NoEarlySuccess,
}
type Error = CompressError; // do it this way for better docs

/// Emits the compressed stream: control bytes, literals and back-reference
/// tags.
///
/// A control byte is reserved in the output before the first item of each
/// group; its bits accumulate here and are patched into the reserved slot
/// once the group is full (or, for the final group, on [`finish`]).
///
/// [`finish`]: TagWriter::finish
struct TagWriter<'a> {
    out: &'a mut Vec<u8>,
    /// Index of the reserved control byte the current group patches into.
    control_at: usize,
    /// Control bits staged for the current group.
    bits: u8,
    /// Bit the next item claims; wraps to zero after eight items.
    mask: u8,
}

impl<'a> TagWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> TagWriter<'a> {
        let control_at = out.len();
        out.push(0);
        TagWriter { out, control_at, bits: 0, mask: 1 }
    }

    /// Patch the finished group and reserve the next control byte if all
    /// eight bits are used up.
    fn stage(&mut self) {
        if self.mask == 0 {
            self.out[self.control_at] = self.bits;
            self.control_at = self.out.len();
            self.out.push(0);
            self.bits = 0;
            self.mask = 1;
        }
    }

    fn literal(&mut self, byte: u8) {
        self.stage();
        self.out.push(byte);
        self.mask <<= 1;
    }

    /// Emit a back-reference tag. `off` must be in `1..=4095` and `len` in
    /// `3..=273`; the match finder guarantees both, the writer just encodes.
    fn backref(&mut self, off: usize, len: usize) {
        self.stage();
        self.bits |= self.mask;
        self.mask <<= 1;

        if len > 17 {
            self.out.push((((off & 0xF00) >> 4) | 0x0F) as u8);
            self.out.push((off & 0xFF) as u8);
            self.out.push((len - 18) as u8);
        } else {
            self.out.push((((off & 0xF00) >> 4) | (len - 3)) as u8);
            self.out.push((off & 0xFF) as u8);
        }
    }

    /// Bytes of output produced so far, including reserved control bytes.
    fn position(&self) -> usize {
        self.out.len()
    }

    /// Patch the final, possibly partial group and return the output length.
    fn finish(self) -> usize {
        self.out[self.control_at] = self.bits;
        self.out.len()
    }
}

/// Length of the common prefix of `a` and `b`.
///
/// Compares sixteen bytes per step: the XOR of two equal loads is zero
/// exactly when they match, and on a mismatch the index of the first
/// differing byte falls out of a bit scan of the XOR. The plain byte loop
/// handles whatever the wide loop leaves over, and is the reference the wide
/// path must agree with byte for byte.
fn matching_prefix(a: &[u8], b: &[u8]) -> usize {
    let mut len = 0;
    for (a, b) in a.chunks_exact(16).zip(b.chunks_exact(16)) {
        let xor = NativeEndian::read_u128(a) ^ NativeEndian::read_u128(b);
        if xor == 0 {
            len += 16;
        } else {
            return len + first_differing_byte(xor);
        }
    }

    len + a[len..].iter().zip(&b[len..]).take_while(|&(x, y)| x == y).count()
}

cfg_if::cfg_if! {
    if #[cfg(target_endian = "little")] {
        fn first_differing_byte(xor: u128) -> usize { xor.trailing_zeros() as usize / 8 }
    } else {
        fn first_differing_byte(xor: u128) -> usize { xor.leading_zeros() as usize / 8 }
    }
}

/// Walk the bucket chain for `cursor` and return the longest usable
/// back-reference as `(length, offset)`, if any.
///
/// The caller must have at least four input bytes left at `cursor`; every
/// four-byte read below is in bounds because remembered positions are all
/// strictly behind the cursor.
fn find_match(
    history: &History,
    input: &[u8],
    cursor: usize,
    mut good: usize,
    drop: usize,
) -> Option<(usize, usize)> {
    let mut best_len = 0;
    let mut best_off = 0;

    for pos in history.candidates(input, cursor).take(MAX_CHAIN) {
        let off = cursor - pos;
        if off >= MAX_OFFSET {
            // Chains are newest-first; everything further down is older
            // still, so the whole rest of the chain is out of the window.
            break;
        }

        // Cheap four-byte prefix check before any real matching. This
        // sacrifices matches of exactly three bytes whose fourth byte
        // differs, which is a good trade against walking slowly.
        if LE::read_u32(&input[cursor..]) == LE::read_u32(&input[pos..]) {
            let limit = cmp::min(MAX_MATCH, input.len() - cursor);
            let here = &input[cursor..cursor + limit];
            let there = &input[pos..pos + limit];

            let len = if best_len >= 16 {
                // An improvement must contain the current best match, so
                // check that whole region in one comparison and only extend
                // when it holds.
                if limit > best_len && here[4..best_len] == there[4..best_len] {
                    best_len + matching_prefix(&here[best_len..], &there[best_len..])
                } else {
                    0
                }
            } else {
                4 + matching_prefix(&here[4..], &there[4..])
            };

            if len > best_len {
                best_len = len;
                best_off = off;
            }
        }

        if best_len >= good {
            break;
        }
        good -= good * drop / 100;
    }

    if best_len >= MIN_MATCH {
        Some((best_len, best_off))
    } else {
        None
    }
}

/// Compress `input`, appending the stream to `output` and reusing the given
/// history scratch.
///
/// The scratch is fully reset before use, so it may come from any earlier
/// call in any state. On error the output is truncated back to where it was.
#[throws]
pub fn compress_with_history(
    input: &[u8],
    output: &mut Vec<u8>,
    strategy: &Strategy,
    history: &mut History,
) -> usize {
    let start = output.len();
    match run(input, output, strategy, history) {
        Ok(size) => size,
        Err(error) => {
            // Leave nothing behind; the caller stores the input verbatim.
            output.truncate(start);
            throw!(error);
        }
    }
}

#[throws]
fn run(
    input: &[u8],
    output: &mut Vec<u8>,
    strategy: &Strategy,
    history: &mut History,
) -> usize {
    if strategy.match_size_good == 0
        || input.len() < strategy.min_input_size
        || input.len() > strategy.max_input_size
    {
        throw!(Error::StrategyRefused);
    }

    let good = strategy.match_size_good.max(17).min(MAX_MATCH);
    let drop = cmp::min(strategy.match_size_drop, 100) as usize;
    let rate = cmp::min(strategy.min_comp_rate, 99) as usize;

    // Output budget. The divide-first form avoids overflow on inputs large
    // enough that `len * 100` would wrap.
    let result_max = if input.len() > usize::MAX / 100 {
        input.len() / 100 * (100 - rate)
    } else {
        input.len() * (100 - rate) / 100
    };

    history.reset(input.len());

    let start = output.len();
    let end = input.len();
    let mut writer = TagWriter::new(output);
    let mut cursor = 0;
    let mut found_match = false;

    // Main loop. The four-byte lower bound keeps every fingerprint and
    // fast-reject read of the match finder in bounds.
    while end - cursor >= 4 {
        if writer.position() - start >= result_max {
            throw!(Error::BudgetExceeded);
        }
        if !found_match && writer.position() - start >= strategy.first_success_by {
            throw!(Error::NoEarlySuccess);
        }

        if let Some((len, off)) = find_match(history, input, cursor, good, drop) {
            writer.backref(off, len);
            found_match = true;

            if strategy.skip_after_match {
                history.add(input, cursor);
                cursor += len;
                if cursor > end {
                    cursor = end;
                }
            } else {
                for _ in 0..len {
                    history.add(input, cursor);
                    cursor += 1;
                }
            }
        } else {
            writer.literal(input[cursor]);
            history.add(input, cursor);
            cursor += 1;
        }
    }

    // Fewer than four bytes left: no more matches, literals only. The tail
    // still goes into the history so its state stays deterministic.
    while cursor < end {
        if writer.position() - start >= result_max {
            throw!(Error::BudgetExceeded);
        }
        writer.literal(input[cursor]);
        history.add(input, cursor);
        cursor += 1;
    }

    let size = writer.finish() - start;
    if size >= result_max {
        throw!(Error::BudgetExceeded);
    }
    size
}

/// Compress `input`, appending the stream to `output`.
///
/// Returns the number of bytes appended. On error nothing is appended and
/// the caller should store `input` uncompressed.
#[throws]
pub fn compress_into(input: &[u8], output: &mut Vec<u8>, strategy: &Strategy) -> usize {
    let mut history = History::new();
    compress_with_history(input, output, strategy, &mut history)?
}

/// Compress all bytes of `input`.
#[throws]
pub fn compress(input: &[u8], strategy: &Strategy) -> Vec<u8> {
    // Anything the budget lets through is smaller than the input, so the
    // input size is capacity enough.
    let mut vec = Vec::with_capacity(input.len());

    compress_into(input, &mut vec, strategy)?;

    vec
}
