//! BIOS flash image parsing and module extraction.
//!
//! Legacy PC firmwares pack their code as a directory of compressed
//! modules inside the flash image. Each vendor family uses its own
//! directory layout and its own flavour of compression:
//!
//! - AMIBIOS '95 and later ("AMI95"): a pointer table of linked part
//!   headers, LH5-compressed payloads.
//! - AMIBIOS '94 ("AMI94"): a flat run of LH5 records, plus the mid-1994
//!   "1010" variant with a small pointer table in the header.
//! - Award: LHA level-1 `-lh5-` members scattered through the image.
//! - Phoenix: BCP descriptor segments with a linked module chain, LH5 or
//!   ring-buffer LZSS payloads, and on newer cores a GUID-keyed firmware
//!   volume directory (FFV).
//!
//! [`extract_image`] detects the family and walks the matching directory,
//! returning every module it can recover. Per-module problems (a bad
//! header, a payload that fails to expand) are reported alongside the
//! successful modules rather than aborting the walk; only a structurally
//! unusable image is a hard error.
//!
//! # Example
//!
//! ```no_run
//! use biosarc_core::BiosImage;
//! use biosarc_image::extract_image;
//!
//! # fn main() -> biosarc_core::Result<()> {
//! let image = BiosImage::open("bios.rom")?;
//! let extraction = extract_image(&image)?;
//! println!("{} image, {} modules", extraction.family, extraction.modules.len());
//! for module in &extraction.modules {
//!     std::fs::write(&module.name, &module.data)?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use std::fmt;

use biosarc_core::{BiosArcError, BiosImage, Result};

pub mod ami94;
pub mod ami95;
pub mod award;
pub mod detect;
pub mod dispatch;
pub mod ffv;
pub mod names;
pub mod phoenix;

pub use detect::{detect, Detection};
pub use dispatch::Codec;

/// The firmware families this crate can take apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiosFamily {
    /// AMIBIOS '95 and later, linked part headers under an `AMIBIOSC` root.
    Ami95,
    /// AMIBIOS '94, flat back-to-back LH5 records.
    Ami94,
    /// AMIBIOS '94 dated 10/10/94, pointer table at 0x14.
    Ami1010,
    /// Award/Phoenix-Award, LHA level-1 members found by signature scan.
    Award,
    /// Phoenix, BCP descriptor segments and optionally an FFV directory.
    Phoenix,
}

impl fmt::Display for BiosFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BiosFamily::Ami95 => "AMIBIOS 95",
            BiosFamily::Ami94 => "AMIBIOS 94",
            BiosFamily::Ami1010 => "AMIBIOS 94 (1010)",
            BiosFamily::Award => "Award",
            BiosFamily::Phoenix => "Phoenix",
        };
        f.write_str(name)
    }
}

/// One module recovered from an image.
#[derive(Debug, Clone)]
pub struct ExtractedModule {
    /// Output file name, built the way the vendor's own tools name parts.
    pub name: String,
    /// Human-readable part description, when the vendor id is known.
    pub kind: Option<&'static str>,
    /// Offset of the module header (or payload, for headerless formats)
    /// within the image file.
    pub offset: usize,
    /// Stored payload size in bytes, before expansion.
    pub packed_len: usize,
    /// How the payload was stored.
    pub codec: Codec,
    /// Expanded module contents.
    pub data: Vec<u8>,
}

/// A module the walker found but could not fully recover.
///
/// The walk continues past these; they are collected so callers can report
/// them without losing the modules that did extract.
#[derive(Debug)]
pub struct ModuleFailure {
    /// Offset of the offending module header within the image.
    pub offset: usize,
    /// Name the module would have been given.
    pub name: String,
    /// What went wrong.
    pub error: BiosArcError,
}

/// Everything recovered from one image.
#[derive(Debug)]
pub struct Extraction {
    /// Detected firmware family.
    pub family: BiosFamily,
    /// Core version string, when the directory carries one.
    pub version: Option<String>,
    /// Build date string, when the directory carries one.
    pub date: Option<String>,
    /// Successfully extracted modules, in directory order.
    pub modules: Vec<ExtractedModule>,
    /// Modules that were present but could not be recovered.
    pub failures: Vec<ModuleFailure>,
}

impl Extraction {
    fn new(family: BiosFamily) -> Self {
        Extraction {
            family,
            version: None,
            date: None,
            modules: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn push_module(&mut self, module: ExtractedModule) {
        log::info!(
            "0x{:05x}: {} ({}, {} -> {} bytes)",
            module.offset,
            module.name,
            module.codec,
            module.packed_len,
            module.data.len()
        );
        self.modules.push(module);
    }

    fn push_failure(&mut self, offset: usize, name: String, error: BiosArcError) {
        log::warn!("0x{offset:05x}: {name}: {error}");
        self.failures.push(ModuleFailure {
            offset,
            name,
            error,
        });
    }
}

/// Detects the firmware family of `image` and extracts all of its modules.
///
/// Returns [`BiosArcError::UnknownFormat`] when no family signature
/// matches, or a structural error when the matched directory is unusable.
/// Per-module problems end up in [`Extraction::failures`] instead.
pub fn extract_image(image: &BiosImage) -> Result<Extraction> {
    let detection = detect(image)?;
    log::info!(
        "{} image, {} bytes",
        detection.family,
        image.len()
    );
    match detection.family {
        BiosFamily::Ami95 => ami95::extract(image, detection.marker, detection.anchor),
        BiosFamily::Ami94 => ami94::extract_flat(image),
        BiosFamily::Ami1010 => ami94::extract_1010(image),
        BiosFamily::Award => award::extract(image),
        BiosFamily::Phoenix => phoenix::extract(image, detection.marker, detection.anchor),
    }
}
