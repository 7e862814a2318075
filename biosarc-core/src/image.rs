//! Read-only BIOS image arena.
//!
//! A [`BiosImage`] owns the raw flash image, either memory-mapped from disk
//! or held in an owned buffer, and is the single source of bytes for every
//! directory walker. All access goes through bounds-checked readers that
//! fail with [`BiosArcError::BufferOverrun`] instead of slicing blindly;
//! vendor directory structures routinely carry offsets pointing outside the
//! image and every such pointer must be validated before the bytes behind
//! it are interpreted.
//!
//! # Example
//!
//! ```
//! use biosarc_core::image::BiosImage;
//!
//! let image = BiosImage::from_vec(vec![0x12, 0x34, 0x56, 0x78]);
//! assert_eq!(image.read_u16_le(0).unwrap(), 0x3412);
//! assert_eq!(image.read_u32_le(0).unwrap(), 0x7856_3412);
//! assert!(image.read_u32_le(1).is_err());
//! ```

use crate::error::{BiosArcError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Backing storage for a [`BiosImage`].
#[derive(Debug)]
enum Backing {
    /// OS-managed read-only mapping of the image file.
    Mapped(Mmap),
    /// Owned copy, used for synthetic images in tests and for nested
    /// volumes carved out of a parent image.
    Owned(Vec<u8>),
}

/// An immutable BIOS flash image with bounds-checked accessors.
///
/// Walkers borrow the image for the duration of a walk; the bytes never
/// move once loaded.
#[derive(Debug)]
pub struct BiosImage {
    backing: Backing,
}

impl BiosImage {
    /// Map the image file at `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: read-only mapping; the image file is treated as immutable
        // for the lifetime of the program.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            backing: Backing::Mapped(mmap),
        })
    }

    /// Wrap an in-memory image.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            backing: Backing::Owned(data),
        }
    }

    /// Total image length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the image is zero-length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole image as a byte slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => mmap,
            Backing::Owned(data) => data,
        }
    }

    /// Bounds-checked sub-slice `[offset, offset + length)`.
    pub fn slice(&self, offset: usize, length: usize) -> Result<&[u8]> {
        let data = self.as_slice();
        let end = offset
            .checked_add(length)
            .ok_or_else(|| BiosArcError::buffer_overrun(offset, length, data.len()))?;
        if end > data.len() {
            return Err(BiosArcError::buffer_overrun(offset, length, data.len()));
        }
        Ok(&data[offset..end])
    }

    /// Everything from `offset` to the end of the image.
    pub fn slice_from(&self, offset: usize) -> Result<&[u8]> {
        let data = self.as_slice();
        if offset > data.len() {
            return Err(BiosArcError::buffer_overrun(offset, 0, data.len()));
        }
        Ok(&data[offset..])
    }

    /// Read one byte.
    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&self, offset: usize) -> Result<u16> {
        let bytes = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&self, offset: usize) -> Result<u32> {
        let bytes = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Find the first occurrence of `needle` at or after `start`.
    pub fn find(&self, needle: &[u8], start: usize) -> Option<usize> {
        let data = self.as_slice();
        if needle.is_empty() || start >= data.len() {
            return None;
        }
        data[start..]
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|pos| start + pos)
    }

    /// Iterate over every occurrence of `needle` in the image.
    pub fn find_all<'a>(&'a self, needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
        SignatureScan {
            image: self,
            needle,
            next: 0,
        }
    }
}

struct SignatureScan<'a> {
    image: &'a BiosImage,
    needle: &'a [u8],
    next: usize,
}

impl Iterator for SignatureScan<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let hit = self.image.find(self.needle, self.next)?;
        self.next = hit + 1;
        Some(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_slice_in_bounds() {
        let image = BiosImage::from_vec(vec![1, 2, 3, 4, 5]);
        assert_eq!(image.slice(1, 3).unwrap(), &[2, 3, 4]);
        assert_eq!(image.slice(5, 0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let image = BiosImage::from_vec(vec![1, 2, 3, 4, 5]);
        let err = image.slice(3, 4).unwrap_err();
        assert!(matches!(err, BiosArcError::BufferOverrun { .. }));
    }

    #[test]
    fn test_slice_offset_overflow() {
        let image = BiosImage::from_vec(vec![0; 16]);
        assert!(image.slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_scalar_reads() {
        let image = BiosImage::from_vec(vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(image.read_u8(3).unwrap(), 0x12);
        assert_eq!(image.read_u16_le(0).unwrap(), 0x5678);
        assert_eq!(image.read_u32_le(0).unwrap(), 0x1234_5678);
        assert!(image.read_u16_le(3).is_err());
    }

    #[test]
    fn test_find() {
        let image = BiosImage::from_vec(b"xxBCPSEGMENTxxBCPSEGMENT".to_vec());
        assert_eq!(image.find(b"BCPSEGMENT", 0), Some(2));
        assert_eq!(image.find(b"BCPSEGMENT", 3), Some(14));
        assert_eq!(image.find(b"BCPSEGMENT", 15), None);
        assert_eq!(image.find(b"", 0), None);
    }

    #[test]
    fn test_find_all() {
        let image = BiosImage::from_vec(b"ab-lh5-cd-lh5-".to_vec());
        let hits: Vec<usize> = image.find_all(b"-lh5-").collect();
        assert_eq!(hits, vec![2, 9]);
    }

    #[test]
    fn test_open_mapped_file() {
        let path = std::env::temp_dir().join("biosarc_image_open_test.bin");
        let contents = b"AMIBIOSC0725";
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file");
        file.sync_all().expect("sync temp file");

        let image = BiosImage::open(&path).expect("map image");
        assert_eq!(image.len(), contents.len());
        assert_eq!(image.as_slice(), contents);
        assert_eq!(image.find(b"AMIBIOSC", 0), Some(0));

        let _ = std::fs::remove_file(&path);
    }
}
