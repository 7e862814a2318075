//! LH5 compression as found inside BIOS flash images.
//!
//! LH5 is the `-lh5-` method of the LHA archiver: LZSS over an 8 KiB
//! sliding window followed by canonical Huffman coding of literals, match
//! lengths and distance buckets. AMI, Award and Phoenix firmwares all embed
//! module payloads in this format, usually as a bare stream with the
//! expanded length carried in the surrounding directory structure rather
//! than in an archive header.
//!
//! # Example
//!
//! ```
//! use biosarc_lh5::{lh5_compress, lh5_decompress};
//!
//! let data = b"AMIBIOS module payload, AMIBIOS module payload";
//! let packed = lh5_compress(data);
//! let expanded = lh5_decompress(&packed, data.len()).unwrap();
//! assert_eq!(expanded, data);
//! ```

#![warn(missing_docs)]

pub mod decode;
pub mod encode;
pub mod huffman;

pub use decode::lh5_decompress;
pub use encode::lh5_compress;
pub use huffman::HuffmanTable;

/// Sliding window size in bits (the `5` in lh5).
pub const WINDOW_BITS: usize = 13;
/// Sliding window size: 8 KiB.
pub const WINDOW_SIZE: usize = 1 << WINDOW_BITS;
/// Longest match a single symbol can encode.
pub const MAX_MATCH: usize = 256;
/// Shortest match worth encoding; shorter runs go out as literals.
pub const THRESHOLD: usize = 3;

/// Main alphabet size: 256 literals plus match lengths 3..=256.
pub const NC: usize = 255 + MAX_MATCH + 2 - THRESHOLD;
/// Distance bucket alphabet size: buckets 0..=13 for the 13-bit window.
pub const NP: usize = WINDOW_BITS + 1;
/// Code-length alphabet size: lengths 1..=16 plus three run escapes.
pub const NT: usize = 19;

/// Bits in the main alphabet's transmitted count fields.
pub const CBIT: u8 = 9;
/// Bits in the distance alphabet's count field.
pub const PBIT: u8 = 4;
/// Bits in the code-length alphabet's count field.
pub const TBIT: u8 = 5;
