//! Award image walker.
//!
//! Award firmwares carry their modules as plain LHA level-1 `-lh5-`
//! members dropped into the image wherever the build tool left room. The
//! walk is a signature scan: find each `-lh5-` method string, parse the
//! member header around it, expand the payload, continue behind it.

use biosarc_core::{crc16, BiosArcError, BiosImage, Result};

use crate::dispatch::Codec;
use crate::{BiosFamily, ExtractedModule, Extraction};

/// Parsed LHA level-1 member header.
struct MemberHeader {
    /// Total header length, including extended headers; the payload
    /// starts this many bytes after the header start.
    header_len: usize,
    packed_len: usize,
    expanded_len: usize,
    name: String,
    crc: u16,
}

/// Parses the LHA level-1 header at the start of `buf`.
///
/// `buf[2..7]` must already hold `-lh5-`; the remaining header fields are
/// validated here, including the one-byte additive checksum and the
/// extended-header chain (whose sizes are carved out of the stored
/// packed length).
fn parse_member_header(buf: &[u8]) -> Result<MemberHeader> {
    if buf.len() < 27 {
        return Err(BiosArcError::truncated(0, 27));
    }
    if buf[19] != 0x20 {
        return Err(BiosArcError::invalid_module(0, "bad attribute byte"));
    }
    if &buf[2..7] != b"-lh5-" {
        return Err(BiosArcError::invalid_module(0, "method is not -lh5-"));
    }
    if buf[20] != 1 {
        return Err(BiosArcError::invalid_module(0, "unsupported header level"));
    }

    let header_size = buf[0] as usize;
    if buf.len() < header_size + 2 {
        return Err(BiosArcError::truncated(0, header_size + 2));
    }
    let checksum: u8 = buf[2..2 + header_size]
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b));
    if checksum != buf[1] {
        return Err(BiosArcError::invalid_module(0, "header checksum mismatch"));
    }

    let mut packed_len =
        u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]) as usize;
    let expanded_len =
        u32::from_le_bytes([buf[11], buf[12], buf[13], buf[14]]) as usize;

    let name_len = buf[21] as usize;
    if buf.len() < 24 + name_len {
        return Err(BiosArcError::truncated(0, 24 + name_len));
    }
    let name = String::from_utf8_lossy(&buf[22..22 + name_len]).into_owned();
    let crc = u16::from_le_bytes([buf[22 + name_len], buf[23 + name_len]]);

    // Extended headers trail the base header; their sizes count against
    // the stored packed length.
    let mut offset = header_size + 2;
    loop {
        let size_at = offset - 2;
        if buf.len() < size_at + 2 {
            return Err(BiosArcError::truncated(size_at, 2));
        }
        let extend_size = u16::from_le_bytes([buf[size_at], buf[size_at + 1]]) as usize;
        if extend_size == 0 {
            break;
        }
        packed_len = packed_len.checked_sub(extend_size).ok_or_else(|| {
            BiosArcError::invalid_module(size_at, "extended headers exceed packed size")
        })?;
        offset += extend_size;
    }

    Ok(MemberHeader {
        header_len: offset,
        packed_len,
        expanded_len,
        name,
        crc,
    })
}

/// Scans `image` for `-lh5-` members and expands every one of them.
pub fn extract(image: &BiosImage) -> Result<Extraction> {
    let mut out = Extraction::new(BiosFamily::Award);

    let mut scan = 0usize;
    while let Some(hit) = image.find(b"-lh5-", scan) {
        // The method string sits 2 bytes into the header.
        let Some(start) = hit.checked_sub(2) else {
            scan = hit + 5;
            continue;
        };

        let header = match parse_member_header(image.slice_from(start)?) {
            Ok(header) => header,
            Err(error) => {
                // Stray signature bytes, or a member we cannot parse.
                // Either way there is nothing to advance over; resume the
                // scan behind the signature.
                out.push_failure(start, format!("member_{start:05x}"), error);
                scan = hit + 5;
                continue;
            }
        };

        let payload_at = start + header.header_len;
        match image
            .slice(payload_at, header.packed_len)
            .and_then(|packed| Codec::Lh5.expand(packed, header.expanded_len))
        {
            Ok(data) => {
                let computed = crc16(&data);
                if computed != header.crc {
                    // Real images do ship members with stale CRCs; keep
                    // the output and flag it.
                    log::warn!(
                        "0x{start:05x}: {}: {}",
                        header.name,
                        BiosArcError::crc_mismatch(header.crc, computed)
                    );
                }
                out.push_module(ExtractedModule {
                    name: header.name,
                    kind: None,
                    offset: start,
                    packed_len: header.packed_len,
                    codec: Codec::Lh5,
                    data,
                });
            }
            Err(error) => out.push_failure(start, header.name, error),
        }

        scan = start + header.header_len + header.packed_len;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an LHA level-1 member for `payload`.
    fn member(name: &[u8], payload: &[u8]) -> Vec<u8> {
        let packed = biosarc_lh5::lh5_compress(payload);
        let crc = crc16(payload);

        let mut header = Vec::new();
        header.extend_from_slice(b"-lh5-");
        header.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        header.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        header.extend_from_slice(&[0u8; 4]); // time/date stamp
        header.push(0x20); // attribute
        header.push(1); // header level
        header.push(name.len() as u8);
        header.extend_from_slice(name);
        header.extend_from_slice(&crc.to_le_bytes());
        header.push(0); // OS id
        header.extend_from_slice(&0u16.to_le_bytes()); // no extended headers

        let header_size = header.len() as u8;
        let checksum: u8 = header.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));

        let mut member = vec![header_size, checksum];
        member.extend_from_slice(&header);
        member.extend_from_slice(&packed);
        member
    }

    #[test]
    fn finds_and_expands_members() {
        let first = b"award system bios segment";
        let second = b"video option rom, video option rom";

        let mut data = vec![0u8; 0x100];
        data.extend(member(b"awardext.rom", first));
        data.extend(vec![0xFFu8; 0x80]);
        data.extend(member(b"original.tmp", second));
        data.extend(vec![0u8; 0x40]);

        let out = extract(&BiosImage::from_vec(data)).unwrap();
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(out.modules.len(), 2);
        assert_eq!(out.modules[0].name, "awardext.rom");
        assert_eq!(out.modules[0].data, first);
        assert_eq!(out.modules[1].name, "original.tmp");
        assert_eq!(out.modules[1].data, second);
    }

    #[test]
    fn stray_signature_is_skipped() {
        let payload = b"decompression bios block";
        let mut data = vec![0u8; 0x40];
        data.extend_from_slice(b"-lh5-"); // bytes that merely look like a method string
        data.extend(vec![0u8; 0x20]);
        data.extend(member(b"awardbmp.bmp", payload));

        let out = extract(&BiosImage::from_vec(data)).unwrap();
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.modules.len(), 1);
        assert_eq!(out.modules[0].data, payload);
    }

    #[test]
    fn header_checksum_must_hold() {
        let mut m = member(b"x.rom", b"payload bytes");
        m[1] ^= 0xFF; // break the checksum
        let mut data = vec![0u8; 0x10];
        data.extend(m);

        let out = extract(&BiosImage::from_vec(data)).unwrap();
        assert!(out.modules.is_empty());
        assert_eq!(out.failures.len(), 1);
    }

    #[test]
    fn extended_headers_reduce_packed_size() {
        let payload = b"extended header member";
        let packed = biosarc_lh5::lh5_compress(payload);

        let mut header = Vec::new();
        header.extend_from_slice(b"-lh5-");
        // Stored packed size includes the 6-byte extended header.
        header.extend_from_slice(&((packed.len() + 6) as u32).to_le_bytes());
        header.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        header.extend_from_slice(&[0u8; 4]);
        header.push(0x20);
        header.push(1);
        header.push(5);
        header.extend_from_slice(b"e.rom");
        header.extend_from_slice(&crc16(payload).to_le_bytes());
        header.push(0);
        header.extend_from_slice(&6u16.to_le_bytes()); // one extended header, 6 bytes

        let header_size = header.len() as u8;
        let checksum: u8 = header.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));

        let mut data = vec![header_size, checksum];
        data.extend_from_slice(&header);
        data.extend_from_slice(&[0x01, 0xAA, 0xBB, 0xCC]); // extended header body
        data.extend_from_slice(&0u16.to_le_bytes()); // chain terminator
        data.extend_from_slice(&packed);

        let out = extract(&BiosImage::from_vec(data)).unwrap();
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(out.modules[0].name, "e.rom");
        assert_eq!(out.modules[0].packed_len, packed.len());
        assert_eq!(out.modules[0].data, payload);
    }
}
