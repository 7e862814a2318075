//! Core infrastructure for the BiosArc firmware extraction toolkit.
//!
//! This crate provides the shared pieces the format walkers and codecs are
//! built on:
//!
//! - [`error`]: the [`BiosArcError`] type used across the workspace
//! - [`bitstream`]: MSB-first bit reader/writer for the LH5 codec
//! - [`crc`]: CRC-16 as used by LHA level-1 headers
//! - [`image`]: the read-only, bounds-checked [`BiosImage`] arena
//!
//! # Example
//!
//! ```
//! use biosarc_core::prelude::*;
//!
//! let image = BiosImage::from_vec(b"AMIBIOSC".to_vec());
//! assert_eq!(image.find(b"AMIBIOSC", 0), Some(0));
//! ```

#![warn(missing_docs)]

pub mod bitstream;
pub mod crc;
pub mod error;
pub mod image;

pub use bitstream::{MsbBitReader, MsbBitWriter};
pub use crc::{Crc16, crc16};
pub use error::{BiosArcError, Result};
pub use image::BiosImage;

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::bitstream::{MsbBitReader, MsbBitWriter};
    pub use crate::crc::{Crc16, crc16};
    pub use crate::error::{BiosArcError, Result};
    pub use crate::image::BiosImage;
}
