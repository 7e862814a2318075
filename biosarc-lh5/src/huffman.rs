//! Canonical Huffman decoding tables.
//!
//! LH5 transmits each alphabet as a list of code lengths; the codes
//! themselves are implied canonically (shorter codes first, ties broken by
//! symbol index). Decoding uses a hybrid structure: codes no longer than
//! `table_bits` resolve through a flat lookup table in a single peek, and
//! longer codes fall through to a binary tree walked one bit at a time.
//!
//! A length set is only usable if it fills the 16-bit code space exactly.
//! [`HuffmanTable::from_lengths`] verifies that in 32-bit arithmetic and
//! rejects oversubscribed or incomplete sets before building anything, so a
//! hostile length list can never write out of bounds.

use biosarc_core::bitstream::MsbBitReader;
use biosarc_core::error::{BiosArcError, Result};

/// Maximum code length the wire format can express.
pub const MAX_CODE_LEN: u8 = 16;

/// Where the table builder is currently pointing while threading a long
/// code through the overflow tree.
#[derive(Clone, Copy)]
enum Slot {
    /// Flat table entry.
    Table(usize),
    /// Left child of a tree node.
    Left(usize),
    /// Right child of a tree node.
    Right(usize),
}

/// A decoding table for one canonical Huffman alphabet.
pub struct HuffmanTable {
    nchar: u16,
    table_bits: u8,
    /// Code length per symbol; 0 for absent symbols and for fixed tables.
    lens: Vec<u8>,
    /// Flat lookup: values below `nchar` are symbols, values at or above
    /// `nchar` are overflow tree node ids.
    table: Vec<u16>,
    left: Vec<u16>,
    right: Vec<u16>,
}

impl HuffmanTable {
    /// Build a table from per-symbol code lengths.
    ///
    /// `lengths[sym]` is the code length of `sym`, 0 meaning the symbol does
    /// not occur. Fails with [`BiosArcError::MalformedTable`] if any length
    /// exceeds 16 bits or if the weighted lengths do not sum to exactly
    /// `2^16`.
    pub fn from_lengths(lengths: &[u8], table_bits: u8) -> Result<Self> {
        debug_assert!(table_bits >= 1 && table_bits <= 15);
        let nchar = lengths.len();

        let mut count = [0u32; 17];
        for (sym, &len) in lengths.iter().enumerate() {
            if len > MAX_CODE_LEN {
                return Err(BiosArcError::malformed_table(format!(
                    "symbol {sym} has code length {len}, maximum is {MAX_CODE_LEN}"
                )));
            }
            if len > 0 {
                count[len as usize] += 1;
            }
        }

        // Weighted sum over the 16-bit code space, checked in u32 so an
        // oversubscribed length set cannot wrap around to look complete.
        let mut start = [0u32; 18];
        for i in 1..=16 {
            start[i + 1] = start[i] + (count[i] << (16 - i));
        }
        if start[17] != 1 << 16 {
            return Err(BiosArcError::malformed_table(format!(
                "code space sums to {:#x}, expected 0x10000",
                start[17]
            )));
        }

        let jutbits = 16 - table_bits as u32;
        let mut weight = [0u32; 17];
        for i in 1..=table_bits as usize {
            start[i] >>= jutbits;
            weight[i] = 1 << (table_bits as usize - i);
        }
        for i in (table_bits as usize + 1)..=16 {
            weight[i] = 1 << (16 - i);
        }

        let mut this = Self {
            nchar: nchar as u16,
            table_bits,
            lens: lengths.to_vec(),
            table: vec![0u16; 1 << table_bits],
            left: vec![0u16; 2 * nchar.max(1)],
            right: vec![0u16; 2 * nchar.max(1)],
        };

        let mut avail = nchar as u16;
        for (sym, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let l = len as usize;
            let nextcode = start[l] + weight[l];
            if len <= table_bits {
                // Short code: replicate the symbol across every table entry
                // sharing its prefix.
                if nextcode as usize > this.table.len() {
                    return Err(BiosArcError::malformed_table(format!(
                        "symbol {sym} overflows the lookup table"
                    )));
                }
                for entry in &mut this.table[start[l] as usize..nextcode as usize] {
                    *entry = sym as u16;
                }
            } else {
                // Long code: thread the remaining bits through the tree.
                let mut k = start[l] as u16;
                let mut slot = Slot::Table((k as u32 >> jutbits) as usize);
                let mask = 1u16 << (15 - table_bits);
                for _ in 0..(len - table_bits) {
                    let cur = this.slot_get(slot);
                    let node = if cur == 0 {
                        if avail as usize >= this.left.len() {
                            return Err(BiosArcError::malformed_table(
                                "overflow tree exceeds its node budget",
                            ));
                        }
                        let node = avail;
                        avail += 1;
                        this.slot_set(slot, node);
                        node
                    } else {
                        cur
                    };
                    slot = if k & mask != 0 {
                        Slot::Right(node as usize)
                    } else {
                        Slot::Left(node as usize)
                    };
                    k <<= 1;
                }
                this.slot_set(slot, sym as u16);
            }
            start[l] = nextcode;
        }

        Ok(this)
    }

    /// Build a degenerate table that decodes `symbol` without consuming any
    /// bits, for the zero-count escape in the table transmission format.
    pub fn fixed(nchar: usize, table_bits: u8, symbol: u16) -> Result<Self> {
        if symbol as usize >= nchar {
            return Err(BiosArcError::malformed_table(format!(
                "fixed symbol {symbol} out of range for alphabet of {nchar}"
            )));
        }
        Ok(Self {
            nchar: nchar as u16,
            table_bits,
            lens: vec![0; nchar],
            table: vec![symbol; 1 << table_bits],
            left: Vec::new(),
            right: Vec::new(),
        })
    }

    /// Decode one symbol from `reader`.
    ///
    /// Consumes exactly the symbol's code length (zero bits for a fixed
    /// table). Input exhaustion is not an error here; the bit reader feeds
    /// zeros past the end and the caller's output budget bounds the loop.
    pub fn decode(&self, reader: &mut MsbBitReader<'_>) -> Result<u16> {
        let mut sym = self.table[reader.peek_bits(self.table_bits) as usize];
        if sym < self.nchar {
            reader.consume(self.lens[sym as usize]);
            return Ok(sym);
        }
        reader.consume(self.table_bits);
        for _ in self.table_bits..MAX_CODE_LEN {
            let node = sym as usize;
            if node >= self.left.len() {
                return Err(BiosArcError::malformed_table(format!(
                    "dangling overflow tree node {node}"
                )));
            }
            sym = if reader.read_bits(1) != 0 {
                self.right[node]
            } else {
                self.left[node]
            };
            if sym < self.nchar {
                return Ok(sym);
            }
        }
        Err(BiosArcError::malformed_table(
            "code exceeds 16 bits during decode",
        ))
    }

    fn slot_get(&self, slot: Slot) -> u16 {
        match slot {
            Slot::Table(i) => self.table[i],
            Slot::Left(n) => self.left[n],
            Slot::Right(n) => self.right[n],
        }
    }

    fn slot_set(&mut self, slot: Slot, value: u16) {
        match slot {
            Slot::Table(i) => self.table[i] = value,
            Slot::Left(n) => self.left[n] = value,
            Slot::Right(n) => self.right[n] = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosarc_core::bitstream::MsbBitWriter;

    #[test]
    fn test_flat_decode() {
        // Canonical codes: a=0, b=10, c=11.
        let lens = [1u8, 2, 2];
        let table = HuffmanTable::from_lengths(&lens, 8).unwrap();

        let mut writer = MsbBitWriter::new();
        writer.write_bits(0b0, 1); // a
        writer.write_bits(0b10, 2); // b
        writer.write_bits(0b11, 2); // c
        writer.write_bits(0b0, 1); // a
        let bytes = writer.finish();

        let mut reader = MsbBitReader::new(&bytes);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
        assert_eq!(table.decode(&mut reader).unwrap(), 1);
        assert_eq!(table.decode(&mut reader).unwrap(), 2);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
    }

    #[test]
    fn test_tree_decode_beyond_table_bits() {
        // Lengths 1,2,3,4,4 with a 2-bit flat table force the last codes
        // through the overflow tree.
        let lens = [1u8, 2, 3, 4, 4];
        let table = HuffmanTable::from_lengths(&lens, 2).unwrap();

        // Canonical codes: 0, 10, 110, 1110, 1111.
        let mut writer = MsbBitWriter::new();
        writer.write_bits(0b1111, 4);
        writer.write_bits(0b1110, 4);
        writer.write_bits(0b110, 3);
        writer.write_bits(0b0, 1);
        let bytes = writer.finish();

        let mut reader = MsbBitReader::new(&bytes);
        assert_eq!(table.decode(&mut reader).unwrap(), 4);
        assert_eq!(table.decode(&mut reader).unwrap(), 3);
        assert_eq!(table.decode(&mut reader).unwrap(), 2);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
    }

    #[test]
    fn test_oversubscribed_lengths_rejected() {
        // Four codes of length 1 claim twice the code space.
        let lens = [1u8, 1, 1, 1];
        assert!(matches!(
            HuffmanTable::from_lengths(&lens, 8),
            Err(BiosArcError::MalformedTable { .. })
        ));
    }

    #[test]
    fn test_incomplete_lengths_rejected() {
        // A single length-2 code leaves three quarters of the space unused.
        let lens = [2u8];
        assert!(matches!(
            HuffmanTable::from_lengths(&lens, 8),
            Err(BiosArcError::MalformedTable { .. })
        ));
    }

    #[test]
    fn test_wraparound_lengths_rejected() {
        // 131072 codes of length 16 sum to 0x20000, which wraps to zero in
        // 16-bit arithmetic. The 32-bit check must still reject it.
        let lens = vec![16u8; 1 << 17];
        assert!(HuffmanTable::from_lengths(&lens, 12).is_err());
    }

    #[test]
    fn test_length_over_16_rejected() {
        let lens = [17u8];
        assert!(HuffmanTable::from_lengths(&lens, 8).is_err());
    }

    #[test]
    fn test_fixed_table_consumes_no_bits() {
        let table = HuffmanTable::fixed(19, 8, 5).unwrap();
        let mut reader = MsbBitReader::new(&[0xAA]);
        assert_eq!(table.decode(&mut reader).unwrap(), 5);
        assert_eq!(table.decode(&mut reader).unwrap(), 5);
        // Nothing was consumed.
        assert_eq!(reader.peek_bits(8), 0xAA);
    }

    #[test]
    fn test_fixed_symbol_out_of_range() {
        assert!(HuffmanTable::fixed(19, 8, 19).is_err());
    }
}
