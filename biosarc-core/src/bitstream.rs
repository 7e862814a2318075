//! Bit-level I/O for the firmware compression codecs.
//!
//! # Bit ordering
//!
//! The LH5/LZHUF streams embedded in BIOS images pack bits MSB-first within
//! each byte, so the reader here mirrors lha's classic 16-bit window over an
//! 8-bit refill register. Reads past the end of the input yield zero bits
//! forever; the LH5 decoder depends on this to terminate cleanly once the
//! externally-declared output length has been produced, so there is no error
//! path at this layer.
//!
//! # Example
//!
//! ```
//! use biosarc_core::bitstream::{MsbBitReader, MsbBitWriter};
//!
//! let mut writer = MsbBitWriter::new();
//! writer.write_bits(0b101, 3);
//! writer.write_bits(0b1100, 4);
//! let bytes = writer.finish();
//!
//! let mut reader = MsbBitReader::new(&bytes);
//! assert_eq!(reader.read_bits(3), 0b101);
//! assert_eq!(reader.read_bits(4), 0b1100);
//! ```

/// MSB-first bit cursor over a compressed byte slice.
///
/// Maintains a 16-bit peek window (`bitbuf`) refilled byte-at-a-time from
/// the input, exactly like the lha bit machinery the BIOS vendors shipped.
/// Up to 16 bits can be peeked or consumed per call.
#[derive(Debug)]
pub struct MsbBitReader<'a> {
    input: &'a [u8],
    pos: usize,
    bitbuf: u16,
    subbitbuf: u8,
    bitcount: u8,
}

impl<'a> MsbBitReader<'a> {
    /// Create a reader over `input` with the 16-bit window pre-filled.
    pub fn new(input: &'a [u8]) -> Self {
        let mut reader = Self {
            input,
            pos: 0,
            bitbuf: 0,
            subbitbuf: 0,
            bitcount: 0,
        };
        reader.consume(16);
        reader
    }

    /// Number of input bytes consumed into the window so far.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    /// Look at the next `count` bits (count <= 16) without advancing.
    ///
    /// Bits beyond the end of the input read as zero.
    #[inline]
    pub fn peek_bits(&self, count: u8) -> u16 {
        debug_assert!(count <= 16, "cannot peek more than 16 bits");
        if count == 0 {
            return 0;
        }
        self.bitbuf >> (16 - count)
    }

    /// Advance the cursor by `count` bits (count <= 16), refilling the
    /// window from the input as needed.
    #[inline]
    pub fn consume(&mut self, count: u8) {
        debug_assert!(count <= 16, "cannot consume more than 16 bits");
        let mut n = count;
        while n > self.bitcount {
            n -= self.bitcount;
            self.bitbuf =
                (self.bitbuf << self.bitcount) | ((self.subbitbuf as u16) >> (8 - self.bitcount));
            self.subbitbuf = if self.pos < self.input.len() {
                let byte = self.input[self.pos];
                self.pos += 1;
                byte
            } else {
                0
            };
            self.bitcount = 8;
        }
        self.bitcount -= n;
        self.bitbuf = (self.bitbuf << n) | ((self.subbitbuf as u16) >> (8 - n));
        self.subbitbuf = ((self.subbitbuf as u16) << n) as u8;
    }

    /// Read and consume `count` bits (count <= 16).
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> u16 {
        let bits = self.peek_bits(count);
        self.consume(count);
        bits
    }
}

/// MSB-first bit accumulator, the writer-side mirror of [`MsbBitReader`].
///
/// Used by the reference LH5 encoder and by tests that synthesize
/// compressed streams.
#[derive(Debug, Default)]
pub struct MsbBitWriter {
    out: Vec<u8>,
    hold: u32,
    nbits: u8,
}

impl MsbBitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `count` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u16, count: u8) {
        debug_assert!(count <= 16, "cannot write more than 16 bits");
        if count == 0 {
            return;
        }
        let mask = if count == 16 {
            u16::MAX
        } else {
            (1u16 << count) - 1
        };
        self.hold = (self.hold << count) | (value & mask) as u32;
        self.nbits += count;
        while self.nbits >= 8 {
            self.out.push((self.hold >> (self.nbits - 8)) as u8);
            self.nbits -= 8;
        }
    }

    /// Append a single bit.
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(bit as u16, 1);
    }

    /// Total bits written so far, including unflushed ones.
    pub fn bits_written(&self) -> usize {
        self.out.len() * 8 + self.nbits as usize
    }

    /// Zero-pad the final partial byte and return the stream.
    pub fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.out.push((self.hold << (8 - self.nbits)) as u8);
        }
        self.out
    }
}
