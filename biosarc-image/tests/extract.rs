//! Whole-image extraction through family detection.

use biosarc_core::{crc16, BiosImage};
use biosarc_image::{extract_image, BiosFamily, Codec};

/// Builds an LHA level-1 member around `payload`.
fn lha_member(name: &[u8], payload: &[u8]) -> Vec<u8> {
    let packed = biosarc_lh5::lh5_compress(payload);

    let mut header = Vec::new();
    header.extend_from_slice(b"-lh5-");
    header.extend_from_slice(&(packed.len() as u32).to_le_bytes());
    header.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    header.extend_from_slice(&[0u8; 4]);
    header.push(0x20);
    header.push(1);
    header.push(name.len() as u8);
    header.extend_from_slice(name);
    header.extend_from_slice(&crc16(payload).to_le_bytes());
    header.push(0);
    header.extend_from_slice(&0u16.to_le_bytes());

    let header_size = header.len() as u8;
    let checksum: u8 = header.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));

    let mut member = vec![header_size, checksum];
    member.extend_from_slice(&header);
    member.extend_from_slice(&packed);
    member
}

#[test]
fn award_image_end_to_end() {
    let system = b"system bios segment, runs from shadow ram";
    let video = b"video bios option rom";

    let mut data = vec![0u8; 0x200];
    data[0x10..0x1F].copy_from_slice(b"Award BootBlock");
    data[0x40..0x5C].copy_from_slice(b"= Award Decompression Bios =");
    data.extend(lha_member(b"original.tmp", system));
    data.extend(vec![0xFFu8; 0x100]);
    data.extend(lha_member(b"awardext.rom", video));

    let extraction = extract_image(&BiosImage::from_vec(data)).unwrap();
    assert_eq!(extraction.family, BiosFamily::Award);
    assert!(extraction.failures.is_empty(), "{:?}", extraction.failures);
    assert_eq!(extraction.modules.len(), 2);
    assert_eq!(extraction.modules[0].name, "original.tmp");
    assert_eq!(extraction.modules[0].data, system);
    assert_eq!(extraction.modules[1].name, "awardext.rom");
    assert_eq!(extraction.modules[1].data, video);
}

#[test]
fn ami95_image_end_to_end() {
    let len = 0x20000usize;
    let bios_offset = 0x100000 - len;
    let mut data = vec![0u8; len];

    // Markers: boot block string high in the image, container at 0x500.
    data[0x1F000..0x1F00B].copy_from_slice(b"AMIBOOT ROM");
    let abc = 0x500;
    data[abc..abc + 8].copy_from_slice(b"AMIBIOSC");
    data[abc + 8..abc + 12].copy_from_slice(b"0725");

    // Single compressed part at 0x2000, last in chain.
    let body = b"post and runtime dispatch, post and runtime dispatch";
    let packed = biosarc_lh5::lh5_compress(body);
    let part = 0x2000usize;
    let begin = bios_offset + part;
    let begin_lo = (begin & 0xFFFF) as u16;
    let begin_hi = ((begin - begin_lo as usize) >> 4) as u16;
    data[abc + 18..abc + 20].copy_from_slice(&begin_lo.to_le_bytes());
    data[abc + 20..abc + 22].copy_from_slice(&begin_hi.to_le_bytes());

    data[part..part + 2].copy_from_slice(&0xFFFFu16.to_le_bytes());
    data[part + 2..part + 4].copy_from_slice(&0xFFFFu16.to_le_bytes());
    data[part + 6] = 0x00; // POST
    data[part + 7] = 0x00; // compressed
    data[part + 12..part + 16].copy_from_slice(&(packed.len() as u32).to_le_bytes());
    data[part + 16..part + 20].copy_from_slice(&(body.len() as u32).to_le_bytes());
    data[part + 0x14..part + 0x14 + packed.len()].copy_from_slice(&packed);

    // Build date at the image tail.
    data[len - 11..len - 3].copy_from_slice(b"07/25/95");

    let extraction = extract_image(&BiosImage::from_vec(data)).unwrap();
    assert_eq!(extraction.family, BiosFamily::Ami95);
    assert!(extraction.failures.is_empty(), "{:?}", extraction.failures);
    assert_eq!(extraction.version.as_deref(), Some("0725"));
    assert_eq!(extraction.date.as_deref(), Some("07/25/95"));

    assert_eq!(extraction.modules.len(), 2);
    assert_eq!(extraction.modules[0].name, "amiboot.rom");
    assert_eq!(extraction.modules[0].offset, 0x10000);
    assert_eq!(extraction.modules[1].name, "amibody_00.rom");
    assert_eq!(extraction.modules[1].kind, Some("POST"));
    assert_eq!(extraction.modules[1].codec, Codec::Lh5);
    assert_eq!(extraction.modules[1].data, body);
}

#[test]
fn ami94_image_end_to_end() {
    let body = b"flat ami module, flat ami module";
    let packed = biosarc_lh5::lh5_compress(body);

    let mut data = Vec::new();
    data.extend_from_slice(b"AMIBIOSC");
    data.extend_from_slice(b"07/25/94");
    let total = (packed.len() + 8) as u16;
    data.extend_from_slice(&total.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&(body.len() as u16).to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&packed);
    data.extend_from_slice(&[0u8; 8]);

    let extraction = extract_image(&BiosImage::from_vec(data)).unwrap();
    assert_eq!(extraction.family, BiosFamily::Ami94);
    assert_eq!(extraction.modules.len(), 1);
    assert_eq!(extraction.modules[0].name, "amibody.00");
    assert_eq!(extraction.modules[0].data, body);
}

#[test]
fn unknown_image_is_an_error() {
    let image = BiosImage::from_vec(vec![0x42u8; 0x1000]);
    assert!(extract_image(&image).is_err());
}
