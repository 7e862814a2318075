//! Payload storage methods and their expansion.

use std::fmt;

use biosarc_core::Result;

/// How a module payload is stored in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Stored as-is.
    Raw,
    /// LH5: 8 KiB window LZSS plus canonical Huffman.
    Lh5,
    /// 4 KiB ring-buffer LZSS, Phoenix style.
    Lzss,
}

impl Codec {
    /// Expands `packed` according to this codec.
    ///
    /// `expanded_len` is the output size the surrounding directory
    /// announced. LH5 streams need it to know where to stop; raw and LZSS
    /// payloads carry their own extent and ignore it.
    pub fn expand(self, packed: &[u8], expanded_len: usize) -> Result<Vec<u8>> {
        match self {
            Codec::Raw => Ok(packed.to_vec()),
            Codec::Lh5 => biosarc_lh5::lh5_decompress(packed, expanded_len),
            Codec::Lzss => biosarc_lzss::lzss_decompress(packed),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Codec::Raw => "raw",
            Codec::Lh5 => "lh5",
            Codec::Lzss => "lzss",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_copies_verbatim() {
        let data = [0xF0u8, 0x0F, 0x55];
        assert_eq!(Codec::Raw.expand(&data, 3).unwrap(), data);
    }

    #[test]
    fn lh5_honours_announced_length() {
        let packed = biosarc_lh5::lh5_compress(b"firmware");
        assert_eq!(Codec::Lh5.expand(&packed, 8).unwrap(), b"firmware");
    }
}
