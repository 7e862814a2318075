//! The LH5 reference encoder.
//!
//! Produces streams the decoder in [`crate::decode`] accepts: greedy LZSS
//! tokenization over the 8 KiB window, then per-block canonical Huffman
//! codes for the main, distance and code-length alphabets. Code lengths are
//! limited to 16 bits with the package-merge construction, which always
//! yields a complete code, so transmitted tables pass the decoder's
//! code-space check by construction.
//!
//! Compression ratio is not the goal here; correctness of the wire format
//! is. The encoder exists so tests and tooling can fabricate valid payloads
//! without shelling out to LHA.

use crate::huffman::MAX_CODE_LEN;
use crate::{CBIT, MAX_MATCH, NC, NP, NT, PBIT, TBIT, THRESHOLD, WINDOW_SIZE};
use biosarc_core::bitstream::MsbBitWriter;
use std::collections::HashMap;

/// Longest match chain walked per position.
const MAX_CHAIN: usize = 64;

#[derive(Debug, Clone, Copy)]
enum Token {
    Literal(u8),
    Match { len: usize, dist: usize },
}

/// Compress `data` into an LH5 stream.
///
/// The expanded length is not stored in the stream; callers must carry it
/// out of band, as every BIOS directory format does.
pub fn lh5_compress(data: &[u8]) -> Vec<u8> {
    let tokens = tokenize(data);
    let mut writer = MsbBitWriter::new();
    // The block header counts symbols in 16 bits.
    for block in tokens.chunks(u16::MAX as usize) {
        emit_block(&mut writer, block);
    }
    writer.finish()
}

/// Greedy LZSS pass: longest match of at least [`THRESHOLD`] bytes within
/// the window, found through 3-byte hash chains.
fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chains: HashMap<[u8; 3], Vec<usize>> = HashMap::new();
    let mut pos = 0;

    while pos < data.len() {
        let mut best_len = 0;
        let mut best_dist = 0;
        if pos + THRESHOLD <= data.len() {
            let key = [data[pos], data[pos + 1], data[pos + 2]];
            if let Some(candidates) = chains.get(&key) {
                let max_len = (data.len() - pos).min(MAX_MATCH);
                for &cand in candidates.iter().rev().take(MAX_CHAIN) {
                    if pos - cand > WINDOW_SIZE {
                        break;
                    }
                    let mut len = THRESHOLD;
                    while len < max_len && data[cand + len] == data[pos + len] {
                        len += 1;
                    }
                    if len > best_len {
                        best_len = len;
                        best_dist = pos - cand;
                        if len == max_len {
                            break;
                        }
                    }
                }
            }
        }

        let advance = if best_len >= THRESHOLD {
            tokens.push(Token::Match {
                len: best_len,
                dist: best_dist,
            });
            best_len
        } else {
            tokens.push(Token::Literal(data[pos]));
            1
        };
        for p in pos..pos + advance {
            if p + 3 <= data.len() {
                chains
                    .entry([data[p], data[p + 1], data[p + 2]])
                    .or_default()
                    .push(p);
            }
        }
        pos += advance;
    }
    tokens
}

/// Distance bucket for `d1 = distance - 1`: bucket `p` covers values with
/// exactly `p` significant bits, sent with `p - 1` extra bits.
fn p_bucket(d1: usize) -> (u16, u16, u8) {
    if d1 == 0 {
        (0, 0, 0)
    } else {
        let p = usize::BITS - d1.leading_zeros();
        (p as u16, (d1 - (1 << (p - 1))) as u16, (p - 1) as u8)
    }
}

/// How an alphabet goes on the wire.
enum AlphabetCode {
    /// Zero or one distinct symbols: the zero-count escape carrying the
    /// symbol itself, decoded thereafter in zero bits.
    Escape(u16),
    /// A transmitted length table plus canonical codes.
    Table { lens: Vec<u8>, codes: Vec<u16> },
}

impl AlphabetCode {
    fn build(freqs: &[u32]) -> Self {
        let used: Vec<usize> = freqs
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f > 0)
            .map(|(sym, _)| sym)
            .collect();
        match used.as_slice() {
            [] => AlphabetCode::Escape(0),
            [sym] => AlphabetCode::Escape(*sym as u16),
            _ => {
                let lens = limited_lengths(freqs, MAX_CODE_LEN);
                let codes = canonical_codes(&lens);
                AlphabetCode::Table { lens, codes }
            }
        }
    }

    fn put(&self, writer: &mut MsbBitWriter, sym: u16) {
        if let AlphabetCode::Table { lens, codes } = self {
            writer.write_bits(codes[sym as usize], lens[sym as usize]);
        }
        // Escape codes carry zero bits per symbol.
    }
}

/// Package-merge: optimal code lengths under a hard cap. Needs at least two
/// used symbols; the escape path handles the rest.
fn limited_lengths(freqs: &[u32], max_len: u8) -> Vec<u8> {
    let mut singles: Vec<(u64, u16)> = freqs
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f > 0)
        .map(|(sym, &f)| (f as u64, sym as u16))
        .collect();
    singles.sort();
    debug_assert!(singles.len() >= 2);
    debug_assert!(1usize << max_len >= singles.len());

    let mut lens = vec![0u8; freqs.len()];
    let mut level: Vec<(u64, Vec<u16>)> = singles
        .iter()
        .map(|&(weight, sym)| (weight, vec![sym]))
        .collect();
    for _ in 1..max_len {
        let packages: Vec<(u64, Vec<u16>)> = level
            .chunks_exact(2)
            .map(|pair| {
                let mut leaves = pair[0].1.clone();
                leaves.extend(&pair[1].1);
                (pair[0].0 + pair[1].0, leaves)
            })
            .collect();
        // Merge fresh singletons with the packaged pairs, keeping weight order.
        let mut merged = Vec::with_capacity(singles.len() + packages.len());
        let mut s = singles.iter().peekable();
        let mut p = packages.into_iter().peekable();
        loop {
            match (s.peek(), p.peek()) {
                (Some(&&(sw, sym)), Some(pkg)) if sw <= pkg.0 => {
                    merged.push((sw, vec![sym]));
                    s.next();
                }
                (_, Some(_)) => {
                    let pkg = p.next();
                    if let Some(pkg) = pkg {
                        merged.push(pkg);
                    }
                }
                (Some(&&(sw, sym)), None) => {
                    merged.push((sw, vec![sym]));
                    s.next();
                }
                (None, None) => break,
            }
        }
        level = merged;
    }
    for (_, leaves) in level.iter().take(2 * singles.len() - 2) {
        for &sym in leaves {
            lens[sym as usize] += 1;
        }
    }
    lens
}

/// Canonical code values in the same order the decoder assigns them:
/// shorter codes first, ties broken by ascending symbol index.
fn canonical_codes(lens: &[u8]) -> Vec<u16> {
    let mut count = [0u32; 17];
    for &len in lens {
        if len > 0 {
            count[len as usize] += 1;
        }
    }
    let mut next = [0u32; 17];
    let mut acc = 0u32;
    for i in 1..=16 {
        next[i] = acc;
        acc += count[i] << (16 - i);
    }
    let mut codes = vec![0u16; lens.len()];
    for (sym, &len) in lens.iter().enumerate() {
        if len > 0 {
            let l = len as usize;
            codes[sym] = (next[l] >> (16 - l)) as u16;
            next[l] += 1 << (16 - l);
        }
    }
    codes
}

/// One element of the run-length-coded main length table.
enum CLenItem {
    /// A code-length alphabet symbol.
    Pt(u16),
    /// Raw extra bits following a run escape.
    Extra(u16, u8),
}

/// Walk the main alphabet's lengths in their wire encoding: symbols 0..=2
/// escape runs of absent symbols, symbol `k + 2` means length `k`.
fn for_each_c_len_item(c_lens: &[u8], n: usize, mut f: impl FnMut(CLenItem)) {
    let mut i = 0;
    while i < n {
        let k = c_lens[i];
        i += 1;
        if k > 0 {
            f(CLenItem::Pt(k as u16 + 2));
            continue;
        }
        let mut run = 1u16;
        while i < n && c_lens[i] == 0 {
            i += 1;
            run += 1;
        }
        if run <= 2 {
            for _ in 0..run {
                f(CLenItem::Pt(0));
            }
        } else if run <= 18 {
            f(CLenItem::Pt(1));
            f(CLenItem::Extra(run - 3, 4));
        } else if run == 19 {
            f(CLenItem::Pt(0));
            f(CLenItem::Pt(1));
            f(CLenItem::Extra(15, 4));
        } else {
            f(CLenItem::Pt(2));
            f(CLenItem::Extra(run - 20, CBIT));
        }
    }
}

/// Write a small alphabet's lengths: raw 3-bit values with a unary escape
/// above 6, plus the 2-bit zero-skip field after index 2 when `special`.
fn write_small_alphabet(
    writer: &mut MsbBitWriter,
    lens: &[u8],
    nbit: u8,
    special: Option<usize>,
) {
    let mut n = lens.len();
    while n > 0 && lens[n - 1] == 0 {
        n -= 1;
    }
    writer.write_bits(n as u16, nbit);
    let mut i = 0;
    while i < n {
        let k = lens[i];
        i += 1;
        if k <= 6 {
            writer.write_bits(k as u16, 3);
        } else {
            // (k - 3) bits: (k - 4) ones then a zero.
            writer.write_bits((1u16 << (k - 3)) - 2, k - 3);
        }
        if special == Some(i) {
            let skipped = i;
            let mut j = i;
            while j < 6 && j < lens.len() && lens[j] == 0 {
                j += 1;
            }
            i = j;
            writer.write_bits((i - skipped) as u16, 2);
        }
    }
}

fn emit_block(writer: &mut MsbBitWriter, tokens: &[Token]) {
    let mut c_freq = vec![0u32; NC];
    let mut p_freq = vec![0u32; NP];
    for token in tokens {
        match *token {
            Token::Literal(byte) => c_freq[byte as usize] += 1,
            Token::Match { len, dist } => {
                c_freq[256 + len - THRESHOLD] += 1;
                p_freq[p_bucket(dist - 1).0 as usize] += 1;
            }
        }
    }
    let c_code = AlphabetCode::build(&c_freq);
    let p_code = AlphabetCode::build(&p_freq);

    writer.write_bits(tokens.len() as u16, 16);

    match &c_code {
        AlphabetCode::Escape(sym) => {
            // No length stream follows, so the code-length alphabet is
            // escaped too.
            writer.write_bits(0, TBIT);
            writer.write_bits(0, TBIT);
            writer.write_bits(0, CBIT);
            writer.write_bits(*sym, CBIT);
        }
        AlphabetCode::Table { lens: c_lens, .. } => {
            let mut n = NC;
            while n > 0 && c_lens[n - 1] == 0 {
                n -= 1;
            }

            let mut t_freq = vec![0u32; NT];
            for_each_c_len_item(c_lens, n, |item| {
                if let CLenItem::Pt(sym) = item {
                    t_freq[sym as usize] += 1;
                }
            });
            let t_code = AlphabetCode::build(&t_freq);
            match &t_code {
                AlphabetCode::Escape(sym) => {
                    writer.write_bits(0, TBIT);
                    writer.write_bits(*sym, TBIT);
                }
                AlphabetCode::Table { lens, .. } => {
                    write_small_alphabet(writer, lens, TBIT, Some(3));
                }
            }

            writer.write_bits(n as u16, CBIT);
            for_each_c_len_item(c_lens, n, |item| match item {
                CLenItem::Pt(sym) => t_code.put(writer, sym),
                CLenItem::Extra(value, bits) => writer.write_bits(value, bits),
            });
        }
    }

    match &p_code {
        AlphabetCode::Escape(sym) => {
            writer.write_bits(0, PBIT);
            writer.write_bits(*sym, PBIT);
        }
        AlphabetCode::Table { lens, .. } => {
            write_small_alphabet(writer, lens, PBIT, None);
        }
    }

    for token in tokens {
        match *token {
            Token::Literal(byte) => c_code.put(writer, byte as u16),
            Token::Match { len, dist } => {
                c_code.put(writer, (256 + len - THRESHOLD) as u16);
                let (p, extra, extra_bits) = p_bucket(dist - 1);
                p_code.put(writer, p);
                if extra_bits > 0 {
                    writer.write_bits(extra, extra_bits);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::lh5_decompress;

    #[test]
    fn test_roundtrip_empty() {
        let packed = lh5_compress(&[]);
        assert!(packed.is_empty());
        assert_eq!(lh5_decompress(&packed, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_roundtrip_single_byte() {
        let packed = lh5_compress(b"A");
        assert_eq!(lh5_decompress(&packed, 1).unwrap(), b"A");
    }

    #[test]
    fn test_roundtrip_two_distinct_bytes() {
        let packed = lh5_compress(b"AB");
        assert_eq!(lh5_decompress(&packed, 2).unwrap(), b"AB");
    }

    #[test]
    fn test_roundtrip_repeated_byte_uses_matches() {
        let data = vec![0x55u8; 1000];
        let packed = lh5_compress(&data);
        assert!(packed.len() < data.len() / 4);
        assert_eq!(lh5_decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_text() {
        let data = b"the quick brown fox jumps over the lazy dog, \
                     the quick brown fox jumps over the lazy dog again";
        let packed = lh5_compress(data);
        assert_eq!(lh5_decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).cycle().take(2048).collect();
        let packed = lh5_compress(&data);
        assert_eq!(lh5_decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_p_bucket_boundaries() {
        assert_eq!(p_bucket(0), (0, 0, 0));
        assert_eq!(p_bucket(1), (1, 0, 0));
        assert_eq!(p_bucket(2), (2, 0, 1));
        assert_eq!(p_bucket(3), (2, 1, 1));
        assert_eq!(p_bucket(4), (3, 0, 2));
        assert_eq!(p_bucket(8191), (13, 4095, 12));
    }

    #[test]
    fn test_limited_lengths_are_complete() {
        // A skewed distribution; the weighted lengths must fill the code
        // space exactly or the decoder refuses the table.
        let mut freqs = vec![0u32; 40];
        for (i, f) in freqs.iter_mut().enumerate() {
            *f = 1 << (i % 20);
        }
        let lens = limited_lengths(&freqs, 16);
        let total: u32 = lens
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 1u32 << (16 - l as u32))
            .sum();
        assert_eq!(total, 1 << 16);
        assert!(lens.iter().all(|&l| l <= 16));
    }
}
