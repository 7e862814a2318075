//! Phoenix BCP directory walker.
//!
//! A `BCPSEGMENT` block holds a run of named descriptor records. `BCPSYS`
//! carries the build stamps and the head of the module chain; `BCPFFV`
//! points at the firmware volume directory used by newer cores; `BCPCMP`
//! names the compression algorithm those volumes use. Module nodes link
//! backwards through flash addresses, masked to file offsets by the image
//! size (Phoenix images are power-of-two sized).

use biosarc_core::{BiosArcError, BiosImage, Result};

use crate::dispatch::Codec;
use crate::ffv::{self, VolumeCompression};
use crate::names;
use crate::{BiosFamily, ExtractedModule, Extraction};

/// BCP descriptor records start this far into the segment block.
const RECORD_AT: usize = 10;
/// Module node header size, padded layout.
const MODULE_HEADER_LEN: usize = 28;
/// Satellite fragment header: next u32, bank u8, length u32.
const FRAGMENT_HEADER_LEN: usize = 9;
/// Upper bound on chain length, against looped links.
const MAX_MODULES: usize = 0x80;

/// Masks a stored flash address down to a file offset.
fn mask(image: &BiosImage, address: u32) -> usize {
    address as usize & (image.len() - 1)
}

/// Collects the `BCPSYS` and `BCPFFV` record offsets from the segment
/// block. Records are { name[6], flags u16, length u16 } and run until a
/// NUL name.
fn scan_records(image: &BiosImage, segment: usize) -> (Option<usize>, Option<usize>) {
    let mut sys = None;
    let mut ffv = None;
    let mut at = segment + RECORD_AT;
    while let Ok(record) = image.slice(at, 10) {
        if record[0] == 0 {
            break;
        }
        let length = u16::from_le_bytes([record[8], record[9]]);
        if length == 0 {
            break;
        }
        if &record[0..6] == b"BCPSYS" {
            sys = Some(at);
        } else if &record[0..6] == b"BCPFFV" {
            ffv = Some(at);
        }
        if sys.is_some() && ffv.is_some() {
            break;
        }
        at += length as usize;
    }
    (sys, ffv)
}

/// Volume compression algorithm named by the `BCPCMP` record.
fn scan_compression(image: &BiosImage) -> VolumeCompression {
    match image.find(b"BCPCMP", 0) {
        Some(at) => match image.read_u8(at + 11) {
            Ok(alg) => VolumeCompression::from_tag(alg),
            Err(_) => VolumeCompression::Lzhuf,
        },
        None => {
            // Older cores have no BCPCMP block; LZHUF is what they ship.
            log::debug!("no BCPCMP record, assuming LZHUF volumes");
            VolumeCompression::Lzhuf
        }
    }
}

/// Walks the module chain (or the FFV directory) of a Phoenix image.
///
/// `marker` locates the core's marketing string, `segment` the
/// `BCPSEGMENT` block.
pub fn extract(image: &BiosImage, marker: usize, segment: usize) -> Result<Extraction> {
    let mut out = Extraction::new(BiosFamily::Phoenix);

    if let Ok(tail) = image.slice_from(marker) {
        let end = tail.iter().position(|&b| b == 0).unwrap_or(0);
        log::info!("core: {}", String::from_utf8_lossy(&tail[..end]));
    }

    let (sys, ffv) = scan_records(image, segment);
    let compression = scan_compression(image);

    let chain = match sys {
        Some(sys) => {
            let date = image.slice(sys + 0x0F, 8)?;
            let time = image.slice(sys + 0x18, 8)?;
            let version = image.slice(sys + 0x37, 8)?;
            out.version = Some(String::from_utf8_lossy(version).into_owned());
            out.date = Some(format!(
                "{} {}",
                String::from_utf8_lossy(date),
                String::from_utf8_lossy(time)
            ));
            mask(image, image.read_u32_le(sys + 0x77)?)
        }
        None => 0,
    };

    if chain == 0 {
        // No module chain; newer cores keep everything in firmware
        // volumes instead.
        let Some(ffv) = ffv else {
            return Err(BiosArcError::invalid_module(
                segment,
                "neither a module chain nor an FFV directory",
            ));
        };
        ffv::extract_directory(image, ffv, compression, &mut out)?;
        return Ok(out);
    }

    let mut offset = chain;
    for _ in 0..MAX_MODULES {
        if offset == 0 {
            break;
        }
        offset = mask(image, walk_module(image, offset, &mut out));
    }

    Ok(out)
}

/// Extracts the module node at `offset`, returning the link to the
/// previous node (0 ends the walk).
fn walk_module(image: &BiosImage, offset: usize, out: &mut Extraction) -> u32 {
    let header = match image.slice(offset, MODULE_HEADER_LEN) {
        Ok(header) => header,
        Err(error) => {
            out.push_failure(offset, format!("module_{offset:05x}"), error);
            return 0;
        }
    };

    let previous = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if header[4] != 0 || header[5] != 0x31 || header[6] != 0x31 {
        out.push_failure(
            offset,
            format!("module_{offset:05x}"),
            BiosArcError::invalid_module(offset, "bad module signature"),
        );
        return 0;
    }

    let id = header[7];
    let type_char = header[8];
    let head_len = header[9] as usize;
    let compression = header[10];
    let exp_len = u32::from_le_bytes([header[16], header[17], header[18], header[19]]) as usize;
    let frag_len = u32::from_le_bytes([header[20], header[21], header[22], header[23]]) as usize;
    let next_frag = u32::from_le_bytes([header[24], header[25], header[26], header[27]]);

    let name = names::phoenix_file_name(type_char, id);

    if offset + head_len + 4 + frag_len > image.len() {
        out.push_failure(
            offset,
            name,
            BiosArcError::buffer_overrun(offset, head_len + 4 + frag_len, image.len()),
        );
        return previous;
    }

    // NextFrag doubles as either the expanded length again or the flash
    // address of the first satellite fragment.
    let payload = if next_frag & 0xF000_0000 == 0xF000_0000 {
        match assemble_fragments(image, offset, head_len, frag_len, exp_len, next_frag) {
            Ok(payload) => payload,
            Err(error) => {
                out.push_failure(offset, name, error);
                return previous;
            }
        }
    } else {
        match image.slice(offset + head_len, frag_len) {
            Ok(payload) => payload.to_vec(),
            Err(error) => {
                out.push_failure(offset, name, error);
                return previous;
            }
        }
    };

    let kind = names::phoenix_module_name(type_char);
    let expanded = match compression {
        5 => {
            // The payload leads with its own u32 expanded length.
            if payload.len() < 4 {
                Err(BiosArcError::truncated(offset + head_len, 4))
            } else {
                Codec::Lh5
                    .expand(&payload[4..], exp_len)
                    .map(|data| (Codec::Lh5, data))
            }
        }
        3 => Codec::Lzss.expand(&payload, exp_len).map(|data| (Codec::Lzss, data)),
        0 => Ok((Codec::Raw, payload.clone())),
        tag => Err(BiosArcError::unsupported_compression(tag, name.clone())),
    };

    match expanded {
        Ok((codec, data)) => out.push_module(ExtractedModule {
            name,
            kind,
            offset,
            packed_len: payload.len(),
            codec,
            data,
        }),
        Err(error) => {
            // Keep the stored bytes; an unknown scheme may still be
            // useful to someone with the matching decompressor.
            let dump_raw = matches!(error, BiosArcError::UnsupportedCompression { .. });
            out.push_failure(offset, name.clone(), error);
            if dump_raw {
                out.push_module(ExtractedModule {
                    name,
                    kind,
                    offset,
                    packed_len: payload.len(),
                    codec: Codec::Raw,
                    data: payload,
                });
            }
        }
    }

    previous
}

/// Reassembles a fragmented payload: the primary fragment behind the
/// module header plus a chain of satellite fragments.
fn assemble_fragments(
    image: &BiosImage,
    offset: usize,
    head_len: usize,
    frag_len: usize,
    exp_len: usize,
    next_frag: u32,
) -> Result<Vec<u8>> {
    if frag_len > exp_len {
        return Err(BiosArcError::invalid_module(
            offset,
            "first fragment exceeds the announced size",
        ));
    }

    let mut payload = Vec::with_capacity(exp_len);
    payload.extend_from_slice(image.slice(offset + head_len, frag_len)?);

    let mut frag_at = mask(image, next_frag);
    for _ in 0..MAX_MODULES {
        if frag_at == 0 {
            return Ok(payload);
        }
        let header = image.slice(frag_at, FRAGMENT_HEADER_LEN)?;
        let next = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let length = u32::from_le_bytes([header[5], header[6], header[7], header[8]]) as usize;
        if payload.len() + length > exp_len {
            return Err(BiosArcError::buffer_overrun(frag_at, length, exp_len));
        }
        payload.extend_from_slice(image.slice(frag_at + FRAGMENT_HEADER_LEN, length)?);
        frag_at = mask(image, next);
    }
    Err(BiosArcError::invalid_module(offset, "fragment chain never ends"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEN: usize = 0x20000;

    /// Image skeleton: marker at 0x100, BCPSEGMENT at 0x400 with BCPSYS,
    /// module chain head patched in by the caller.
    fn skeleton(chain_head: u32) -> Vec<u8> {
        let mut data = vec![0u8; LEN];
        data[0x100..0x10F].copy_from_slice(b"PhoenixBIOS 4.0");
        data[0x400..0x40A].copy_from_slice(b"BCPSEGMENT");

        let sys = 0x400 + RECORD_AT;
        data[sys..sys + 6].copy_from_slice(b"BCPSYS");
        data[sys + 8..sys + 10].copy_from_slice(&0x100u16.to_le_bytes());
        data[sys + 0x0F..sys + 0x17].copy_from_slice(b"01/02/03");
        data[sys + 0x18..sys + 0x20].copy_from_slice(b"12:34:56");
        data[sys + 0x37..sys + 0x3F].copy_from_slice(b"4.0 R6.0");
        data[sys + 0x77..sys + 0x7B].copy_from_slice(&chain_head.to_le_bytes());
        data
    }

    /// Writes a module node; payload bytes must already be in place at
    /// `at + MODULE_HEADER_LEN`.
    #[allow(clippy::too_many_arguments)]
    fn put_module(
        data: &mut [u8],
        at: usize,
        previous: u32,
        id: u8,
        type_char: u8,
        compression: u8,
        exp_len: u32,
        frag_len: u32,
        next_frag: u32,
    ) {
        data[at..at + 4].copy_from_slice(&previous.to_le_bytes());
        data[at + 4] = 0;
        data[at + 5] = 0x31;
        data[at + 6] = 0x31;
        data[at + 7] = id;
        data[at + 8] = type_char;
        data[at + 9] = MODULE_HEADER_LEN as u8;
        data[at + 10] = compression;
        data[at + 16..at + 20].copy_from_slice(&exp_len.to_le_bytes());
        data[at + 20..at + 24].copy_from_slice(&frag_len.to_le_bytes());
        data[at + 24..at + 28].copy_from_slice(&next_frag.to_le_bytes());
    }

    #[test]
    fn chain_walk_with_lh5_and_raw() {
        let body = b"phoenix bios code segment, phoenix bios code segment";
        let mut packed = ((body.len() as u32).to_le_bytes()).to_vec();
        packed.extend(biosarc_lh5::lh5_compress(body));

        let mut data = skeleton(0x2000);
        // Head of chain: compressed bioscode, links back to a raw logo.
        put_module(
            &mut data,
            0x2000,
            0x1000,
            0,
            b'B',
            5,
            body.len() as u32,
            packed.len() as u32,
            body.len() as u32,
        );
        data[0x2000 + MODULE_HEADER_LEN..0x2000 + MODULE_HEADER_LEN + packed.len()]
            .copy_from_slice(&packed);

        let logo = b"raw logo bitmap";
        put_module(
            &mut data,
            0x1000,
            0,
            0,
            b'L',
            0,
            logo.len() as u32,
            logo.len() as u32,
            logo.len() as u32,
        );
        data[0x1000 + MODULE_HEADER_LEN..0x1000 + MODULE_HEADER_LEN + logo.len()]
            .copy_from_slice(logo);

        let out = extract(&BiosImage::from_vec(data), 0x100, 0x400).unwrap();
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(out.version.as_deref(), Some("4.0 R6.0"));
        assert_eq!(out.modules.len(), 2);
        assert_eq!(out.modules[0].name, "bioscode_0.rom");
        assert_eq!(out.modules[0].data, body);
        assert_eq!(out.modules[1].name, "logo_0.rom");
        assert_eq!(out.modules[1].codec, Codec::Raw);
        assert_eq!(out.modules[1].data, logo);
    }

    #[test]
    fn fragmented_module_reassembles_in_chain_order() {
        let part_a = b"display module first half / ";
        let part_b = b"display module second half";
        let total = (part_a.len() + part_b.len()) as u32;

        let mut data = skeleton(0x3000);
        put_module(
            &mut data,
            0x3000,
            0,
            1,
            b'D',
            0,
            total,
            part_a.len() as u32,
            0xF000_0000 | 0x5000,
        );
        data[0x3000 + MODULE_HEADER_LEN..0x3000 + MODULE_HEADER_LEN + part_a.len()]
            .copy_from_slice(part_a);

        // Satellite fragment at 0x5000, last in chain.
        data[0x5000..0x5004].copy_from_slice(&0u32.to_le_bytes());
        data[0x5004] = 0;
        data[0x5005..0x5009].copy_from_slice(&(part_b.len() as u32).to_le_bytes());
        data[0x5009..0x5009 + part_b.len()].copy_from_slice(part_b);

        let out = extract(&BiosImage::from_vec(data), 0x100, 0x400).unwrap();
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(out.modules.len(), 1);
        let mut expected = part_a.to_vec();
        expected.extend_from_slice(part_b);
        assert_eq!(out.modules[0].data, expected);
        assert_eq!(out.modules[0].name, "display_1.rom");
    }

    #[test]
    fn oversized_fragment_is_reported_and_chain_continues() {
        let mut data = skeleton(0x3000);
        // Fragmented module whose satellite claims more than ExpLen.
        put_module(&mut data, 0x3000, 0x1000, 0, b'S', 0, 8, 4, 0xF000_0000 | 0x5000);
        data[0x5005..0x5009].copy_from_slice(&100u32.to_le_bytes());

        let strings = b"string pool";
        put_module(
            &mut data,
            0x1000,
            0,
            1,
            b'S',
            0,
            strings.len() as u32,
            strings.len() as u32,
            strings.len() as u32,
        );
        data[0x1000 + MODULE_HEADER_LEN..0x1000 + MODULE_HEADER_LEN + strings.len()]
            .copy_from_slice(strings);

        let out = extract(&BiosImage::from_vec(data), 0x100, 0x400).unwrap();
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.modules.len(), 1);
        assert_eq!(out.modules[0].data, strings);
    }

    #[test]
    fn unsupported_compression_dumps_raw() {
        let blob = b"opaque";
        let mut data = skeleton(0x3000);
        put_module(
            &mut data,
            0x3000,
            0,
            0,
            b'U',
            9,
            blob.len() as u32,
            blob.len() as u32,
            blob.len() as u32,
        );
        data[0x3000 + MODULE_HEADER_LEN..0x3000 + MODULE_HEADER_LEN + blob.len()]
            .copy_from_slice(blob);

        let out = extract(&BiosImage::from_vec(data), 0x100, 0x400).unwrap();
        assert_eq!(out.failures.len(), 1);
        assert!(matches!(
            out.failures[0].error,
            BiosArcError::UnsupportedCompression { tag: 9, .. }
        ));
        assert_eq!(out.modules.len(), 1);
        assert_eq!(out.modules[0].codec, Codec::Raw);
        assert_eq!(out.modules[0].data, blob);
    }

    #[test]
    fn bad_signature_ends_walk() {
        let data = skeleton(0x3000); // nothing at 0x3000
        let out = extract(&BiosImage::from_vec(data), 0x100, 0x400).unwrap();
        assert!(out.modules.is_empty());
        assert_eq!(out.failures.len(), 1);
    }
}
