//! The pglz compression format, as written to disk by PostgreSQL.
//!
//! pglz is a small LZ77-family format: the stream is a sequence of groups,
//! each group being one control byte followed by up to eight items. The
//! control byte classifies the items LSB-first, a zero bit meaning "one
//! literal byte follows" and a one bit meaning "a back-reference tag follows".
//! A back-reference copies `length` bytes starting `offset` bytes back in the
//! already-produced output, so the window is whatever was decompressed so far,
//! up to 4095 bytes back.
//!
//! There is no framing and no checksum: the raw byte sequence is the complete
//! artefact, and whoever stores it keeps the uncompressed length out-of-band.
//! That makes the format trivial to embed but also means the decompressor has
//! to treat every input as potentially hostile; see [`decompress()`].
//!
//! Compression is driven by a [`Strategy`], which decides when compression is
//! attempted at all and when it is abandoned as not worth it. An abandoned
//! compression is not an invalid one - the caller simply stores the input
//! verbatim.

#![forbid(unsafe_code)]

pub mod strategy;
pub mod history;
pub mod compress;
pub mod decompress;

/// Shortest back-reference the tag format can express.
pub const MIN_MATCH: usize = 3;
/// Longest back-reference a tag can express (18 plus the extension byte).
pub const MAX_MATCH: usize = 273;
/// Backward reach of a back-reference, dictated by the 12-bit offset field.
pub const MAX_OFFSET: usize = 0x0FFF;

pub use crate::compress::{compress, compress_into, CompressError};
pub use crate::decompress::{decompress, decompress_into, max_compressed_size, DecodeError};
pub use crate::strategy::Strategy;
