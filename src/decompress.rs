//! Decompression of pglz streams.
//!
//! The stream carries no length of its own; the caller tells us how many raw
//! bytes to expect, because that is how the format is stored (PostgreSQL
//! keeps the uncompressed length in the datum header next to the bytes).
//! Decompression is therefore bounded from the start: we never produce more
//! than the declared size, no matter what the input claims.
//!
//! Inputs are untrusted. A back-reference whose offset is zero or reaches
//! before the start of the output, and a tag cut off by the end of the input,
//! are all rejected; in strict mode the stream additionally has to end
//! exactly when the declared size is reached.

use std::cmp;
use culpa::{throw, throws};
use thiserror::Error;

/// Errors when decoding a pglz stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Error)]
pub enum DecodeError {
    #[error("the stream ended in the middle of a tag. Either your input was truncated or you're decompressing garbage.")]
    UnexpectedEnd,
    #[error("a back-reference has offset zero. This is never valid; you are probably decoding corrupted input.")]
    ZeroOffset,
    #[error("a back-reference points before the start of the output. Corrupted input, or the wrong raw size.")]
    OffsetOutOfWindow,
    #[error("the stream did not line up with the declared raw size")]
    LengthMismatch,
}
type Error = DecodeError; // do it this way for better docs

/// Decompress a pglz stream, appending to `output`.
///
/// `rawsize` is the expected size of the decompressed data; decompression
/// stops once that many bytes have been produced. With `strict` set, the
/// stream must end exactly there with no input left over - that is the mode
/// for reading back a whole stored datum. Without it, a partial result is
/// fine, which allows decompressing just a prefix of a datum from a prefix
/// of the stream.
///
/// Returns the number of bytes appended.
#[throws]
pub fn decompress_into(
    input: &[u8],
    output: &mut Vec<u8>,
    rawsize: usize,
    strict: bool,
) -> usize {
    let base = output.len();
    let full = base + rawsize;
    let mut sp = 0;

    while sp < input.len() && output.len() < full {
        let mut control = input[sp];
        sp += 1;

        // One control byte classifies up to eight items, LSB first. Running
        // out of input or output mid-group is normal; the group just ends.
        for _ in 0..8 {
            if sp >= input.len() || output.len() >= full {
                break;
            }

            if control & 1 != 0 {
                if sp + 2 > input.len() {
                    throw!(Error::UnexpectedEnd);
                }
                let mut len = usize::from(input[sp] & 0x0F) + 3;
                let off = usize::from(input[sp] & 0xF0) << 4 | usize::from(input[sp + 1]);
                sp += 2;
                if len == 18 {
                    // The 0x0F nibble is the long-tag marker; the real
                    // length follows in one extra byte.
                    if sp >= input.len() {
                        throw!(Error::UnexpectedEnd);
                    }
                    len += usize::from(input[sp]);
                    sp += 1;
                }

                if off == 0 {
                    throw!(Error::ZeroOffset);
                }
                if off > output.len() - base {
                    throw!(Error::OffsetOutOfWindow);
                }

                // A tag may promise more than the declared raw size has room
                // for; produce only what fits.
                len = cmp::min(len, full - output.len());
                copy_overlapping(output, off, len);
            } else {
                output.push(input[sp]);
                sp += 1;
            }

            control >>= 1;
        }
    }

    if strict && (sp != input.len() || output.len() != full) {
        throw!(Error::LengthMismatch);
    }

    output.len() - base
}

/// Expand a back-reference of `len` bytes starting `off` bytes back.
///
/// The regions may overlap; that is the whole point. A reference with
/// `off < len` reproduces the last `off` bytes over and over, so copy one
/// period, then two, then four - each round doubles the distance and the
/// copies stay non-overlapping throughout.
fn copy_overlapping(output: &mut Vec<u8>, mut off: usize, mut len: usize) {
    while off < len {
        let from = output.len() - off;
        output.extend_from_within(from..from + off);
        len -= off;
        off += off;
    }
    let from = output.len() - off;
    output.extend_from_within(from..from + len);
}

/// Decompress a pglz stream of known raw size.
#[throws]
pub fn decompress(input: &[u8], rawsize: usize, strict: bool) -> Vec<u8> {
    let mut vec = Vec::with_capacity(rawsize);
    decompress_into(input, &mut vec, rawsize, strict)?;
    vec
}

/// Largest possible compressed size of the first `rawsize` bytes of a datum
/// whose whole compressed size is `total_compressed_size`.
///
/// Worst case the prefix is all literals, nine bits each, plus up to two
/// bytes for a final tag straddling the prefix boundary. Useful for reading
/// the minimal prefix of a stored stream that is guaranteed to decompress to
/// `rawsize` bytes.
pub fn max_compressed_size(rawsize: usize, total_compressed_size: usize) -> usize {
    let worst = (rawsize * 9 + 7) / 8 + 2;
    cmp::min(worst, total_compressed_size)
}



#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn all_literal() {
        assert_eq!(decompress(&[0x00, b'a', b'4', b'9'], 3, true).unwrap(), b"a49");
    }

    #[test]
    fn aaaaaaaaaaa_lots_of_aaaaaaaaa() {
        // One literal 'a', then a five-byte reference reaching one byte back.
        assert_eq!(decompress(&[0x02, b'a', 0x02, 0x01], 6, true).unwrap(), b"aaaaaa");
    }

    #[test]
    fn period_two_doubling() {
        // "ab" followed by an 18-byte reference at offset 2.
        assert_eq!(
            decompress(&[0x04, b'a', b'b', 0x0F, 0x02, 0x00], 20, true).unwrap(),
            b"abababababababababab"
        );
    }

    #[test]
    fn long_tag_maximum_length() {
        // Literal 'x', then 273 more of it.
        assert_eq!(
            decompress(&[0x02, b'x', 0x0F, 0x01, 0xFF], 274, true).unwrap(),
            vec![b'x'; 274]
        );
    }

    #[test]
    fn zero_offset_rejected() {
        // Control byte says "tag", tag says "offset zero".
        let err = decompress(&[0x01, 0x00, 0x00], 16, true).unwrap_err();
        assert_eq!(err, DecodeError::ZeroOffset);
    }

    #[test]
    fn zero_offset_writes_nothing() {
        let mut output = Vec::new();
        assert!(decompress_into(&[0x01, 0x00, 0x00], &mut output, 16, true).is_err());
        assert!(output.is_empty());
    }

    #[test]
    fn offset_before_start_rejected() {
        // Only one byte written, but the tag reaches two back.
        let err = decompress(&[0x02, b'a', 0x02, 0x02], 8, true).unwrap_err();
        assert_eq!(err, DecodeError::OffsetOutOfWindow);
    }

    #[test]
    fn truncated_tag_rejected() {
        // Second tag byte missing.
        let err = decompress(&[0x01, 0x12], 8, true).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEnd);

        // Long-tag marker set, extension byte missing.
        let err = decompress(&[0x01, 0x0F, 0x01], 8, true).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEnd);
    }

    #[test]
    fn strict_wants_the_exact_size() {
        // Three literals, but four declared.
        let err = decompress(&[0x00, b'a', b'b', b'c'], 4, true).unwrap_err();
        assert_eq!(err, DecodeError::LengthMismatch);

        // Three literals, two declared: input is left over.
        let err = decompress(&[0x00, b'a', b'b', b'c'], 2, true).unwrap_err();
        assert_eq!(err, DecodeError::LengthMismatch);
    }

    #[test]
    fn permissive_mode_takes_the_prefix() {
        let out = decompress(&[0x00, b'a', b'b', b'c'], 2, false).unwrap();
        assert_eq!(out, b"ab");
    }

    #[test]
    fn raw_size_caps_a_greedy_tag() {
        // The tag promises 20 bytes but only 10 raw bytes are declared.
        let out = decompress(&[0x02, b'a', 0x0F, 0x01, 0x02], 10, true).unwrap();
        assert_eq!(out, vec![b'a'; 10]);
    }

    #[test]
    fn doubling_copy_reconstructs_any_period() {
        for period in 1..=9usize {
            let seed: Vec<u8> = (0..period as u8).collect();
            let mut output = seed.clone();
            copy_overlapping(&mut output, period, 100);
            let expected: Vec<u8> = seed.iter().cycle().take(period + 100).copied().collect();
            assert_eq!(output, expected);
        }
    }

    #[test]
    fn sizing_helper_rounds_up() {
        assert_eq!(max_compressed_size(0, 1000), 2);
        assert_eq!(max_compressed_size(8, 1000), 11);
        assert_eq!(max_compressed_size(9, 1000), 13);
        // Never claims more than the whole stream.
        assert_eq!(max_compressed_size(4000, 100), 100);
    }
}
