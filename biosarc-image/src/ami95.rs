//! AMIBIOS '95 part chain walker.
//!
//! The `AMIBIOSC` container header points at the last-built part; each
//! part header links to the one built before it, so the walk runs
//! backwards through the build order. Link addresses are flash addresses,
//! normalized to file offsets by subtracting the image's distance from the
//! 1 MiB boundary.

use std::collections::HashMap;

use biosarc_core::{BiosArcError, BiosImage, Result};

use crate::dispatch::Codec;
use crate::names;
use crate::{BiosFamily, ExtractedModule, Extraction};

/// Part header size.
const PART_HEADER_LEN: usize = 0x14;
/// Raw payloads start right after the 16-bit size field.
const RAW_PAYLOAD_AT: usize = 0x0C;
/// Upper bound on chain length, against looped links.
const MAX_PARTS: usize = 0x80;

/// Per-sample knobs for the revisions of this directory format.
///
/// The BeginHi shift amount and the compression-flag polarity both varied
/// across historical cores without an in-image version marker, so they are
/// configuration rather than detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ami95Quirks {
    /// Shift applied to the high word of link addresses. `None` selects by
    /// image size: 16 for images over 1 MiB, 4 otherwise.
    pub begin_shift: Option<u32>,
    /// When set, a part with bit 7 of its flag byte set is treated as
    /// compressed instead of raw.
    pub inverted_flag: bool,
}

/// One decoded part header.
struct Part {
    prev_lo: u16,
    prev_hi: u16,
    csize: u16,
    id: u8,
    flags: u8,
    dest: u32,
    rom_size: u32,
    exp_size: u32,
}

impl Part {
    fn read(image: &BiosImage, offset: usize) -> Result<Part> {
        let header = image.slice(offset, PART_HEADER_LEN)?;
        Ok(Part {
            prev_lo: u16::from_le_bytes([header[0], header[1]]),
            prev_hi: u16::from_le_bytes([header[2], header[3]]),
            csize: u16::from_le_bytes([header[4], header[5]]),
            id: header[6],
            flags: header[7],
            dest: u32::from_le_bytes([header[8], header[9], header[10], header[11]]),
            rom_size: u32::from_le_bytes([header[12], header[13], header[14], header[15]]),
            exp_size: u32::from_le_bytes([header[16], header[17], header[18], header[19]]),
        })
    }

    fn is_last(&self) -> bool {
        self.prev_lo == 0xFFFF || self.prev_hi == 0xFFFF
    }
}

/// Walks the part chain rooted at the container header at `abc_offset`.
///
/// `boot_offset` is where the boot-block marker was found; the boot block
/// itself (marker segment to end of image) is emitted first as
/// `amiboot.rom`.
pub fn extract(image: &BiosImage, boot_offset: usize, abc_offset: usize) -> Result<Extraction> {
    extract_with_quirks(image, boot_offset, abc_offset, Ami95Quirks::default())
}

/// [`extract`] with explicit [`Ami95Quirks`].
pub fn extract_with_quirks(
    image: &BiosImage,
    boot_offset: usize,
    abc_offset: usize,
    quirks: Ami95Quirks,
) -> Result<Extraction> {
    let mut out = Extraction::new(BiosFamily::Ami95);

    let version = image.slice(abc_offset + 8, 4)?;
    out.version = Some(String::from_utf8_lossy(version).into_owned());
    if image.len() >= 11 {
        let date = image.slice(image.len() - 11, 8)?;
        out.date = Some(String::from_utf8_lossy(date).into_owned());
    }

    let begin_lo = image.read_u16_le(abc_offset + 18)?;
    let begin_hi = image.read_u16_le(abc_offset + 20)?;

    let shift = quirks
        .begin_shift
        .unwrap_or(if image.len() > 0x100000 { 16 } else { 4 });
    let bios_offset = 0x100000usize.saturating_sub(image.len());

    // Boot block first: marker segment start to end of image.
    let boot_start = boot_offset & 0xFFFF_0000;
    let boot = image.slice_from(boot_start)?;
    out.push_module(ExtractedModule {
        name: "amiboot.rom".into(),
        kind: Some("Boot Block"),
        offset: boot_start,
        packed_len: boot.len(),
        codec: Codec::Raw,
        data: boot.to_vec(),
    });

    let mut link = ((begin_hi as usize) << shift) + begin_lo as usize;
    let mut seen_names: HashMap<String, u32> = HashMap::new();

    for _ in 0..MAX_PARTS {
        let offset = match link.checked_sub(bios_offset) {
            Some(at) => at,
            None => {
                return Err(BiosArcError::invalid_module(
                    link,
                    "part link below the image base",
                ));
            }
        };

        let part = match Part::read(image, offset) {
            Ok(part) => part,
            Err(error) => {
                // A dangling link ends the walk; nothing to follow.
                out.push_failure(offset, format!("part_{offset:05x}"), error);
                break;
            }
        };

        let compressed = ((part.flags & 0x80 != 0) == quirks.inverted_flag)
            && part.id != 0x40
            && part.id != 0x60;

        let mut name = names::ami95_file_name(part.id, part.dest);
        let count = seen_names.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            let n = *count;
            if let Some(stem) = name.strip_suffix(".rom") {
                name = format!("{stem}_{n}.rom");
            }
        }

        let result = if compressed {
            extract_compressed(image, offset, &part)
        } else {
            extract_raw(image, offset, &part)
        };

        match result {
            Ok((payload_at, packed_len, codec, data)) => {
                out.push_module(ExtractedModule {
                    name,
                    kind: names::ami_module_name(part.id),
                    offset: payload_at,
                    packed_len,
                    codec,
                    data,
                });
            }
            Err(error) => out.push_failure(offset, name, error),
        }

        if part.is_last() {
            break;
        }
        link = ((part.prev_hi as usize) << shift) + part.prev_lo as usize;
    }

    Ok(out)
}

fn extract_compressed(
    image: &BiosImage,
    offset: usize,
    part: &Part,
) -> Result<(usize, usize, Codec, Vec<u8>)> {
    let payload_at = offset + PART_HEADER_LEN;
    let packed = image.slice(payload_at, part.rom_size as usize)?;
    let data = Codec::Lh5.expand(packed, part.exp_size as usize)?;
    Ok((payload_at, packed.len(), Codec::Lh5, data))
}

fn extract_raw(
    image: &BiosImage,
    offset: usize,
    part: &Part,
) -> Result<(usize, usize, Codec, Vec<u8>)> {
    let size = if part.csize == 0 || part.csize == 0xFFFF {
        // Oversized part: the real length sits in a u32 just before the
        // header.
        image.read_u32_le(offset.checked_sub(8).ok_or_else(|| {
            BiosArcError::invalid_module(offset, "oversized part at image start")
        })?)? as usize
    } else {
        part.csize as usize
    };
    let payload_at = offset + RAW_PAYLOAD_AT;
    let data = image.slice(payload_at, size)?.to_vec();
    Ok((payload_at, size, Codec::Raw, data))
}
