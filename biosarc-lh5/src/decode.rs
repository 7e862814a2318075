//! The LH5 stream decoder.
//!
//! An LH5 stream is a sequence of blocks. Each block opens with a 16-bit
//! symbol count followed by three transmitted alphabets: the code-length
//! alphabet (19 symbols, used only to compress the next one), the main
//! alphabet (510 symbols covering literals and match lengths) and the
//! distance-bucket alphabet (14 symbols). Symbols below 256 are literal
//! bytes; higher symbols encode a match length, with the distance sent as a
//! bucket index plus extra bits.
//!
//! The stream carries no terminator. Decoding stops when the externally
//! declared output length has been produced, even mid-copy, and reads past
//! the end of the input see zero bits. Both behaviors are load-bearing:
//! vendor tools routinely truncate the last byte of padding.

use crate::huffman::HuffmanTable;
use crate::{CBIT, MAX_MATCH, NC, NP, NT, PBIT, TBIT, THRESHOLD};
use biosarc_core::bitstream::MsbBitReader;
use biosarc_core::error::{BiosArcError, Result};

/// Flat-table width for the main alphabet.
const C_TABLE_BITS: u8 = 12;
/// Flat-table width for the code-length and distance alphabets.
const PT_TABLE_BITS: u8 = 8;

/// Decompress an LH5 stream into exactly `expanded_len` bytes.
///
/// `input` may extend past the end of the compressed data; trailing bytes
/// are ignored. Returns [`BiosArcError::DecodeFault`] if a match refers
/// further back than the bytes produced so far, and
/// [`BiosArcError::MalformedTable`] for invalid transmitted alphabets.
pub fn lh5_decompress(input: &[u8], expanded_len: usize) -> Result<Vec<u8>> {
    let mut reader = MsbBitReader::new(input);
    let mut out = Vec::with_capacity(expanded_len);
    let mut blocksize: u16 = 0;
    let mut c_table = HuffmanTable::fixed(NC, C_TABLE_BITS, 0)?;
    let mut p_table = HuffmanTable::fixed(NP, PT_TABLE_BITS, 0)?;

    while out.len() < expanded_len {
        if blocksize == 0 {
            blocksize = reader.read_bits(16);
            let t_table = read_pt_len(&mut reader, NT, TBIT, Some(3))?;
            c_table = read_c_len(&mut reader, &t_table)?;
            p_table = read_pt_len(&mut reader, NP, PBIT, None)?;
        }
        blocksize = blocksize.wrapping_sub(1);

        let c = c_table.decode(&mut reader)?;
        if c < 256 {
            out.push(c as u8);
            continue;
        }

        let length = c as usize - 256 + THRESHOLD;
        debug_assert!(length <= MAX_MATCH);
        let p = p_table.decode(&mut reader)?;
        let distance = if p == 0 {
            0
        } else {
            (1usize << (p - 1)) + reader.read_bits((p - 1) as u8) as usize
        };
        let offset = distance + 1;
        if offset > out.len() {
            return Err(BiosArcError::decode_fault(
                reader.bytes_consumed(),
                out.len(),
            ));
        }
        // Byte-at-a-time so overlapping copies replicate recent output.
        for _ in 0..length {
            if out.len() == expanded_len {
                break;
            }
            let byte = out[out.len() - offset];
            out.push(byte);
        }
    }

    Ok(out)
}

/// Read a small alphabet (code-length or distance buckets) transmitted as
/// raw 3-bit lengths with a unary escape for lengths above 6.
///
/// `special` is the index after which a 2-bit zero-run count is inserted;
/// the code-length alphabet uses `Some(3)` so the three run-length escape
/// symbols can be skipped cheaply.
fn read_pt_len(
    reader: &mut MsbBitReader<'_>,
    nn: usize,
    nbit: u8,
    special: Option<usize>,
) -> Result<HuffmanTable> {
    let n = reader.read_bits(nbit) as usize;
    if n == 0 {
        // Degenerate alphabet: a single symbol, sent in place of a table.
        let symbol = reader.read_bits(nbit);
        return HuffmanTable::fixed(nn, PT_TABLE_BITS, symbol);
    }
    if n > nn {
        return Err(BiosArcError::malformed_table(format!(
            "{n} code lengths announced for an alphabet of {nn}"
        )));
    }

    let mut lens = vec![0u8; nn];
    let mut i = 0;
    while i < n {
        let mut len = reader.peek_bits(3);
        if len == 7 {
            // Lengths above 6 continue in unary: count the 1-bits that
            // follow the three already seen.
            let window = reader.peek_bits(16);
            let mut mask = 1u16 << (16 - 4);
            while window & mask != 0 {
                mask >>= 1;
                len += 1;
            }
            if len > 16 {
                return Err(BiosArcError::malformed_table(format!(
                    "unary escape yields code length {len}"
                )));
            }
            reader.consume((len - 3) as u8);
        } else {
            reader.consume(3);
        }
        lens[i] = len as u8;
        i += 1;
        if special == Some(i) {
            // May step past `n` when the writer folded trailing zeros into
            // this field; bounded by the alphabet size, not the count.
            let mut zeros = reader.read_bits(2);
            while zeros > 0 {
                if i >= nn {
                    return Err(BiosArcError::malformed_table(
                        "zero run overflows the alphabet",
                    ));
                }
                lens[i] = 0;
                i += 1;
                zeros -= 1;
            }
        }
    }

    HuffmanTable::from_lengths(&lens, PT_TABLE_BITS)
}

/// Read the main alphabet's code lengths, themselves Huffman-coded with
/// `t_table` plus three zero-run escape symbols.
fn read_c_len(reader: &mut MsbBitReader<'_>, t_table: &HuffmanTable) -> Result<HuffmanTable> {
    let n = reader.read_bits(CBIT) as usize;
    if n == 0 {
        let symbol = reader.read_bits(CBIT);
        return HuffmanTable::fixed(NC, C_TABLE_BITS, symbol);
    }
    if n > NC {
        return Err(BiosArcError::malformed_table(format!(
            "{n} code lengths announced for an alphabet of {NC}"
        )));
    }

    let mut lens = vec![0u8; NC];
    let mut i = 0;
    while i < n {
        let c = t_table.decode(reader)?;
        if c <= 2 {
            // Symbols 0..=2 encode runs of absent symbols.
            let run = match c {
                0 => 1,
                1 => reader.read_bits(4) as usize + 3,
                _ => reader.read_bits(CBIT) as usize + 20,
            };
            if i + run > n {
                return Err(BiosArcError::malformed_table(
                    "zero run overflows announced length count",
                ));
            }
            i += run;
        } else {
            lens[i] = (c - 2) as u8;
            i += 1;
        }
    }

    HuffmanTable::from_lengths(&lens, C_TABLE_BITS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosarc_core::bitstream::MsbBitWriter;

    /// Streams whose every alphabet uses the single-symbol escape. With the
    /// main alphabet fixed to literal `b`, the block body carries no bits at
    /// all and the declared length alone drives the output.
    fn degenerate_literal_stream(byte: u8, count: u16) -> Vec<u8> {
        let mut w = MsbBitWriter::new();
        w.write_bits(count, 16); // block symbol count
        w.write_bits(0, TBIT); // code-length alphabet: escape
        w.write_bits(0, TBIT); //   fixed symbol 0
        w.write_bits(0, CBIT); // main alphabet: escape
        w.write_bits(byte as u16, CBIT); //   fixed literal
        w.write_bits(0, PBIT); // distance alphabet: escape
        w.write_bits(0, PBIT); //   fixed symbol 0
        w.finish()
    }

    #[test]
    fn test_degenerate_stream_of_literals() {
        let stream = degenerate_literal_stream(b'x', 5);
        let out = lh5_decompress(&stream, 5).unwrap();
        assert_eq!(out, b"xxxxx");
    }

    #[test]
    fn test_zero_expanded_length_reads_nothing() {
        let out = lh5_decompress(&[], 0).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_truncated_stream_pads_with_fixed_zero_tables() {
        // An empty input stream decodes entirely from zero bits: blocksize 0,
        // every alphabet takes the escape with symbol 0, literal 0 repeats.
        let out = lh5_decompress(&[], 4).unwrap();
        assert_eq!(out, vec![0u8; 4]);
    }

    #[test]
    fn test_match_before_first_byte_faults() {
        // Fixed main alphabet pinned to symbol 256 (match of length 3) with
        // no literal ever produced, so the first match has nothing to copy.
        let mut w = MsbBitWriter::new();
        w.write_bits(4, 16);
        w.write_bits(0, TBIT);
        w.write_bits(0, TBIT);
        w.write_bits(0, CBIT);
        w.write_bits(256, CBIT);
        w.write_bits(0, PBIT);
        w.write_bits(0, PBIT);
        let stream = w.finish();

        assert!(matches!(
            lh5_decompress(&stream, 4),
            Err(BiosArcError::DecodeFault { .. })
        ));
    }

    #[test]
    fn test_oversubscribed_transmitted_table_rejected() {
        // Announce 4 code lengths of 1 bit each for the small alphabet.
        let mut w = MsbBitWriter::new();
        w.write_bits(1, 16); // blocksize
        w.write_bits(4, TBIT); // four lengths follow
        w.write_bits(1, 3); // len 1
        w.write_bits(1, 3); // len 1
        w.write_bits(1, 3); // len 1
        w.write_bits(0, 2); // zero-run insert after index 3
        w.write_bits(1, 3); // len 1
        let stream = w.finish();

        assert!(matches!(
            lh5_decompress(&stream, 1),
            Err(BiosArcError::MalformedTable { .. })
        ));
    }
}
