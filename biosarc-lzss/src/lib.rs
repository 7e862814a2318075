//! Ring-buffer LZSS as used by Phoenix BIOS module payloads.
//!
//! This is the classic Okumura LZSS layout over a 4096-byte ring: a control
//! byte supplies eight flags consumed least-significant-bit first, a set
//! flag introduces one literal byte, and a clear flag introduces a two-byte
//! reference. The reference bytes pack a 12-bit ring position and a 4-bit
//! length:
//!
//! ```text
//! position = ((b0 | ((b1 & 0xF0) << 4)) - 0xFEE) & 0xFFF
//! length   = (b1 & 0x0F) + 3
//! ```
//!
//! Positions are absolute ring indices, not backward distances; the `0xFEE`
//! bias converts the on-wire value to the convention where the write cursor
//! starts at ring index 0 with a zero-filled ring. References into never
//! written ring cells therefore produce zeros rather than failing, which
//! real payloads rely on.
//!
//! The stream has no terminator and no stored length; it simply runs out of
//! input. Unused flags in the final control byte are discarded.
//!
//! # Example
//!
//! ```
//! use biosarc_lzss::lzss_decompress;
//!
//! // One literal 'A', then a nine-byte self-overlapping reference to it.
//! let packed = [0x01, b'A', 0xEE, 0xF6];
//! assert_eq!(lzss_decompress(&packed).unwrap(), b"AAAAAAAAAA");
//! ```

#![warn(missing_docs)]

use biosarc_core::error::{BiosArcError, Result};
use std::io::Write;

/// Ring size; also the flush granularity of [`lzss_decompress_into`].
pub const RING_SIZE: usize = 4096;
/// On-wire bias of reference positions relative to the write cursor origin.
const POSITION_BIAS: usize = 0xFEE;
/// Shortest encodable reference.
const MIN_REF_LEN: usize = 3;

/// Decompress an LZSS stream, writing expanded bytes to `writer` one ring
/// generation (4 KiB) at a time. Returns the number of bytes produced.
///
/// Fails with [`BiosArcError::TruncatedInput`] if the input ends between
/// the two bytes of a reference, and propagates `writer` errors.
pub fn lzss_decompress_into<W: Write>(input: &[u8], writer: &mut W) -> Result<u64> {
    let mut ring = [0u8; RING_SIZE];
    let mut cursor = 0usize;
    let mut total = 0u64;
    let mut control = 0u8;
    let mut flags_used = 8u8;

    let mut push = |byte: u8, ring: &mut [u8; RING_SIZE], cursor: &mut usize| -> Result<()> {
        ring[*cursor] = byte;
        *cursor += 1;
        total += 1;
        if *cursor == RING_SIZE {
            writer.write_all(&ring[..])?;
            *cursor = 0;
        }
        Ok(())
    };

    let mut i = 0;
    while i < input.len() {
        if flags_used == 8 {
            control = input[i];
            i += 1;
            flags_used = 0;
            if i == input.len() {
                break;
            }
        }
        let literal = (control >> flags_used) & 1 != 0;
        flags_used += 1;

        if literal {
            push(input[i], &mut ring, &mut cursor)?;
            i += 1;
        } else {
            if i + 1 >= input.len() {
                return Err(BiosArcError::truncated(i, 2));
            }
            let b0 = input[i] as usize;
            let b1 = input[i + 1] as usize;
            i += 2;
            let position = (b0 | ((b1 & 0xF0) << 4)).wrapping_sub(POSITION_BIAS) & (RING_SIZE - 1);
            let length = (b1 & 0x0F) + MIN_REF_LEN;
            for k in 0..length {
                let byte = ring[(position + k) & (RING_SIZE - 1)];
                push(byte, &mut ring, &mut cursor)?;
            }
        }
    }

    writer.write_all(&ring[..cursor])?;
    Ok(total)
}

/// Decompress an LZSS stream into a freshly allocated buffer.
pub fn lzss_decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    lzss_decompress_into(input, &mut out)?;
    Ok(out)
}
