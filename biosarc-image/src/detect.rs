//! Firmware family detection.
//!
//! Each family is identified by a pair of signature strings that must both
//! be present somewhere in the image: a marketing/boot-block marker and a
//! directory anchor. AMIBIOS '94 images carry no marker string beyond the
//! `AMIBIOSC` magic at offset 0, so they are picked up by a fallback check
//! on the build date digits that follow the magic.

use biosarc_core::{BiosArcError, BiosImage, Result};

use crate::BiosFamily;

/// Where an identified image keeps its landmarks.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    /// Detected firmware family.
    pub family: BiosFamily,
    /// Offset of the family's marker string.
    pub marker: usize,
    /// Offset of the directory anchor the module walk starts from.
    pub anchor: usize,
}

/// Marker/anchor string pairs, tried in order.
const SIGNATURES: &[(&[u8], &[u8], BiosFamily)] = &[
    (b"AMIBOOT ROM", b"AMIBIOSC", BiosFamily::Ami95),
    (b"$ASUSAMI$", b"AMIBIOSC", BiosFamily::Ami95),
    (
        b"Award BootBlock",
        b"= Award Decompression Bios =",
        BiosFamily::Award,
    ),
    (b"Phoenix FirstBIOS", b"BCPSEGMENT", BiosFamily::Phoenix),
    (b"PhoenixBIOS 4.0", b"BCPSEGMENT", BiosFamily::Phoenix),
    (b"Phoenix ServerBIOS 3", b"BCPSEGMENT", BiosFamily::Phoenix),
    (b"Phoenix TrustedCore", b"BCPSEGMENT", BiosFamily::Phoenix),
];

/// Identifies the firmware family of `image`.
///
/// Returns [`BiosArcError::UnknownFormat`] when nothing matches.
pub fn detect(image: &BiosImage) -> Result<Detection> {
    for &(marker, anchor, family) in SIGNATURES {
        let Some(marker_at) = image.find(marker, 0) else {
            continue;
        };
        let Some(anchor_at) = image.find(anchor, 0) else {
            continue;
        };
        return Ok(Detection {
            family,
            marker: marker_at,
            anchor: anchor_at,
        });
    }

    // AMIBIOS '94 has its magic at the very start, followed by an
    // MM/DD/YY date. The 10/10/94 core uses a different directory.
    let head = image.as_slice();
    if head.len() >= 13 && head.starts_with(b"AMIBIOSC") {
        let family = if head[8] == b'1'
            && head[9] == b'0'
            && head[11] == b'1'
            && head[12] == b'0'
        {
            BiosFamily::Ami1010
        } else {
            BiosFamily::Ami94
        };
        return Ok(Detection {
            family,
            marker: 0,
            anchor: 0,
        });
    }

    Err(BiosArcError::UnknownFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with(chunks: &[(usize, &[u8])], len: usize) -> BiosImage {
        let mut data = vec![0u8; len];
        for &(at, bytes) in chunks {
            data[at..at + bytes.len()].copy_from_slice(bytes);
        }
        BiosImage::from_vec(data)
    }

    #[test]
    fn ami95_needs_both_strings() {
        let image = image_with(&[(0x100, b"AMIBOOT ROM")], 0x1000);
        assert!(matches!(
            detect(&image),
            Err(BiosArcError::UnknownFormat)
        ));

        let image = image_with(
            &[(0x100, b"AMIBOOT ROM"), (0x800, b"AMIBIOSC")],
            0x1000,
        );
        let det = detect(&image).unwrap();
        assert_eq!(det.family, BiosFamily::Ami95);
        assert_eq!(det.marker, 0x100);
        assert_eq!(det.anchor, 0x800);
    }

    #[test]
    fn asus_marker_also_means_ami95() {
        let image = image_with(
            &[(0x40, b"$ASUSAMI$"), (0x200, b"AMIBIOSC")],
            0x1000,
        );
        assert_eq!(detect(&image).unwrap().family, BiosFamily::Ami95);
    }

    #[test]
    fn phoenix_markers() {
        for marker in [
            &b"Phoenix FirstBIOS"[..],
            b"PhoenixBIOS 4.0",
            b"Phoenix ServerBIOS 3",
            b"Phoenix TrustedCore",
        ] {
            let image = image_with(
                &[(0x30, marker), (0x400, b"BCPSEGMENT")],
                0x1000,
            );
            let det = detect(&image).unwrap();
            assert_eq!(det.family, BiosFamily::Phoenix);
            assert_eq!(det.anchor, 0x400);
        }
    }

    #[test]
    fn ami94_date_heuristic() {
        let image = image_with(&[(0, b"AMIBIOSC07/25/94")], 0x1000);
        assert_eq!(detect(&image).unwrap().family, BiosFamily::Ami94);

        let image = image_with(&[(0, b"AMIBIOSC10/10/94")], 0x1000);
        assert_eq!(detect(&image).unwrap().family, BiosFamily::Ami1010);
    }

    #[test]
    fn garbage_is_unknown() {
        let image = BiosImage::from_vec(vec![0xFFu8; 0x400]);
        assert!(matches!(
            detect(&image),
            Err(BiosArcError::UnknownFormat)
        ));
    }
}
