//! AMIBIOS '94 directories.
//!
//! The time before `AMIBIOSC` containers: modules sit back to back behind
//! the image header. The mid-1994 "1010" core (dated 10/10/94) adds a
//! small pointer table instead; both are strictly sequential, no links.

use biosarc_core::{BiosArcError, BiosImage, Result};

use crate::dispatch::Codec;
use crate::names;
use crate::{BiosFamily, ExtractedModule, Extraction};

/// First flat record sits right behind the date header.
const FLAT_START: usize = 0x10;
/// Size record preceding each LH5 payload.
const RECORD_LEN: usize = 8;
/// Against runaway tables and zero-stride records.
const MAX_PARTS: usize = 0x80;

/// The 8-byte size record: packed and expanded lengths, low words first.
struct SizeRecord {
    packed_lo: u16,
    expanded_lo: u16,
}

impl SizeRecord {
    fn read(image: &BiosImage, offset: usize) -> Result<SizeRecord> {
        let rec = image.slice(offset, RECORD_LEN)?;
        Ok(SizeRecord {
            packed_lo: u16::from_le_bytes([rec[0], rec[1]]),
            expanded_lo: u16::from_le_bytes([rec[4], rec[5]]),
        })
    }
}

/// Walks the flat '94 layout: size record + LH5 payload, repeated until a
/// zero/zero record.
pub fn extract_flat(image: &BiosImage) -> Result<Extraction> {
    let mut out = Extraction::new(BiosFamily::Ami94);
    out.date = read_date(image);

    let mut offset = FLAT_START;
    for index in 0..MAX_PARTS {
        let record = SizeRecord::read(image, offset)?;
        if record.packed_lo == 0 && record.expanded_lo == 0 {
            break;
        }
        let name = format!("amibody.{index:02x}");
        if (record.packed_lo as usize) < RECORD_LEN {
            out.push_failure(
                offset,
                name,
                BiosArcError::invalid_module(offset, "record length below header size"),
            );
            break;
        }

        // The length field covers the record itself.
        let payload_len = record.packed_lo as usize - RECORD_LEN;
        match expand_lh5(image, offset + RECORD_LEN, payload_len, record.expanded_lo) {
            Ok(data) => out.push_module(ExtractedModule {
                name,
                kind: None,
                offset,
                packed_len: payload_len,
                codec: Codec::Lh5,
                data,
            }),
            Err(error) => out.push_failure(offset, name, error),
        }
        offset += record.packed_lo as usize;
    }

    Ok(out)
}

/// Walks the "1010" pointer table: module count at 0x10, one
/// address/type word pair per module from 0x14.
pub fn extract_1010(image: &BiosImage) -> Result<Extraction> {
    let mut out = Extraction::new(BiosFamily::Ami1010);
    out.date = read_date(image);

    let count = image.read_u16_le(0x10)? as usize;
    if count > MAX_PARTS {
        return Err(BiosArcError::malformed_table(format!(
            "module table announces {count} entries"
        )));
    }

    for index in 0..count {
        let entry = 0x14 + index * 4;
        let mut address = image.read_u16_le(entry)? as usize;
        if index == 0 {
            // The first module lives in the second 64 KiB bank.
            address += 0x10000;
        }
        let word = image.read_u16_le(entry + 2)?;
        let id = (word & 0xFF) as u8;
        let stored_raw = word & 0x8000 != 0;

        let name = format!("amibody.{index:02x}");
        let result = if stored_raw {
            // Raw modules run from their address to the end of the bank.
            match 0x10000usize.checked_sub(address) {
                Some(size) => image
                    .slice(address, size)
                    .map(|raw| (size, Codec::Raw, raw.to_vec())),
                None => Err(BiosArcError::invalid_module(
                    address,
                    "raw module begins past its bank",
                )),
            }
        } else {
            SizeRecord::read(image, address).and_then(|record| {
                let packed_len = record.packed_lo as usize;
                expand_lh5(image, address + RECORD_LEN, packed_len, record.expanded_lo)
                    .map(|data| (packed_len, Codec::Lh5, data))
            })
        };

        match result {
            Ok((packed_len, codec, data)) => out.push_module(ExtractedModule {
                name,
                kind: names::ami_module_name(id),
                offset: address,
                packed_len,
                codec,
                data,
            }),
            Err(error) => out.push_failure(address, name, error),
        }
    }

    Ok(out)
}

/// Expands `packed_len` LH5 bytes at `offset`, tolerating a stored length
/// that runs past the image end (the announced expanded size bounds the
/// output either way).
fn expand_lh5(
    image: &BiosImage,
    offset: usize,
    packed_len: usize,
    expanded_len: u16,
) -> Result<Vec<u8>> {
    let available = image.len().saturating_sub(offset);
    if available == 0 {
        return Err(BiosArcError::truncated(offset, packed_len));
    }
    let packed = image.slice(offset, packed_len.min(available))?;
    Codec::Lh5.expand(packed, expanded_len as usize)
}

/// MM/DD/YY build date from the image tail, as printed by the vendor's
/// own listing tool.
fn read_date(image: &BiosImage) -> Option<String> {
    if image.len() < 11 {
        return None;
    }
    let tail = image.slice(image.len() - 11, 8).ok()?;
    Some(String::from_utf8_lossy(tail).into_owned())
}
