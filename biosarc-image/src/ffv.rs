//! Phoenix firmware volume (FFV) directories.
//!
//! Newer Phoenix cores replace most of the BCP module chain with firmware
//! volumes: a `volumedir` module lists volumes either as 9-byte typed
//! entries (first generation) or as 24-byte GUID-keyed entries
//! (`volumedir.bin2`). Volumes are raw "holes" or nested streams of FFV
//! modules, each 0xF8-signed with a 15-byte name split around a 0xFF
//! marker byte.

use biosarc_core::{BiosArcError, BiosImage, Result};

use crate::dispatch::Codec;
use crate::names;
use crate::{ExtractedModule, Extraction};

/// FFV module header size; module content follows it.
const HEADER_LEN: usize = 0x18;
/// Compression sub-header inside a COMPRESSION section.
const COMP_HEADER_LEN: usize = 12;

/// Nested-stream volume GUID.
const GUID_FFV_STREAM: &str = "FED91FBA-D37B-4EEA-8729-2EF29FB37A78";
/// Extended System Configuration Data volume GUID.
const GUID_ESCD: &str = "FD21E8FD-2525-4A95-BB90-47EC5763FF9E";
/// Raw code hole volume GUID.
const GUID_RAW_CODE: &str = "F6AE0F63-5F8C-4316-A2EA-76B9AF762756";

/// Volume compression algorithm from the `BCPCMP` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeCompression {
    /// Ring-buffer LZSS.
    Lzss,
    /// LZARI (arithmetic-coded LZSS); no expander here.
    Lzari,
    /// LZHUF, the LH5 family.
    Lzhuf,
    /// LZINT, LH5-compatible in practice.
    Lzint,
    /// Anything else.
    Other(u8),
}

impl VolumeCompression {
    /// Maps the `BCPCMP` algorithm byte.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => VolumeCompression::Lzss,
            1 => VolumeCompression::Lzari,
            2 => VolumeCompression::Lzhuf,
            3 => VolumeCompression::Lzint,
            other => VolumeCompression::Other(other),
        }
    }

    fn is_lh5(self) -> bool {
        matches!(self, VolumeCompression::Lzhuf | VolumeCompression::Lzint)
    }
}

fn mask(image: &BiosImage, address: u32) -> usize {
    address as usize & (image.len() - 1)
}

/// Decoded FFV module header.
struct FfvModule {
    /// Combined 24-bit length field, header included.
    combined_len: usize,
    file_type: u8,
    raw_name: [u8; 16],
}

impl FfvModule {
    fn read(image: &BiosImage, offset: usize) -> Result<Option<FfvModule>> {
        let header = image.slice(offset, HEADER_LEN)?;
        if header[0] != 0xF8 {
            return Ok(None);
        }
        let mut raw_name = [0u8; 16];
        raw_name.copy_from_slice(&header[8..24]);
        let length_lo = u16::from_le_bytes([header[4], header[5]]) as usize;
        Ok(Some(FfvModule {
            combined_len: ((header[6] as usize) << 16) | length_lo,
            file_type: header[7],
            raw_name,
        }))
    }

    /// The 15-character name, with the 0xFF marker byte at index 8
    /// removed and trailing NULs trimmed. `None` when the marker is
    /// absent (GUID-named module).
    fn name(&self) -> Option<String> {
        if self.raw_name[8] != 0xFF {
            return None;
        }
        let mut chars = Vec::with_capacity(15);
        chars.extend_from_slice(&self.raw_name[0..8]);
        chars.extend_from_slice(&self.raw_name[9..16]);
        while chars.last() == Some(&0) {
            chars.pop();
        }
        Some(String::from_utf8_lossy(&chars).into_owned())
    }
}

/// Follows the `BCPFFV` record at `ffv_record` to the volume directory
/// and extracts every volume it lists.
pub fn extract_directory(
    image: &BiosImage,
    ffv_record: usize,
    compression: VolumeCompression,
    out: &mut Extraction,
) -> Result<()> {
    let dir = mask(image, image.read_u32_le(ffv_record + 0xA)?);
    if dir == 0 {
        return Err(BiosArcError::invalid_module(
            ffv_record,
            "FFV directory offset is null",
        ));
    }

    let module = FfvModule::read(image, dir)?.ok_or_else(|| {
        BiosArcError::invalid_module(dir, "volume directory lacks the FFV signature")
    })?;
    if dir + module.combined_len > image.len() {
        return Err(BiosArcError::buffer_overrun(dir, module.combined_len, image.len()));
    }

    match module.name().as_deref() {
        Some("volumedir.bin") => walk_typed_volumes(image, dir, module.combined_len, compression, out),
        Some("volumedir.bin2") => walk_guid_volumes(image, dir, compression, out),
        other => Err(BiosArcError::invalid_module(
            dir,
            format!("FFV points at {:?}, not a volume directory", other),
        )),
    }
}

/// First-generation directory: 9-byte entries { type u8, base u32,
/// length u32 } behind the directory module header.
fn walk_typed_volumes(
    image: &BiosImage,
    dir: usize,
    dir_len: usize,
    compression: VolumeCompression,
    out: &mut Extraction,
) -> Result<()> {
    let count = dir_len.saturating_sub(HEADER_LEN) / 9;
    let mut hole = 0u8;
    for index in 0..count {
        let at = dir + HEADER_LEN + index * 9;
        let entry = image.slice(at, 9)?;
        let volume_type = entry[0];
        let base = mask(
            image,
            u32::from_le_bytes([entry[1], entry[2], entry[3], entry[4]]),
        );
        let length =
            (u32::from_le_bytes([entry[5], entry[6], entry[7], entry[8]]) as usize).saturating_sub(1);

        match volume_type {
            0x01 => emit_hole(image, base, length, &mut hole, out),
            0x02 => walk_stream(image, base, length, compression, out),
            other => log::debug!("0x{base:05x}: volume type {other:02x} skipped"),
        }
    }
    Ok(())
}

/// GUID-keyed directory: { unk u16, unk u16, length u32 } then 24-byte
/// entries of GUID, base, length.
fn walk_guid_volumes(
    image: &BiosImage,
    dir: usize,
    compression: VolumeCompression,
    out: &mut Extraction,
) -> Result<()> {
    let table = dir + HEADER_LEN;
    let table_len = image.read_u32_le(table + 4)? as usize;
    let count = table_len.saturating_sub(8) / 24;
    let mut hole = 0u8;
    for index in 0..count {
        let at = table + 8 + index * 24;
        let entry = image.slice(at, 24)?;
        let guid = format_guid(entry);
        let base = mask(
            image,
            u32::from_le_bytes([entry[16], entry[17], entry[18], entry[19]]),
        );
        let length =
            (u32::from_le_bytes([entry[20], entry[21], entry[22], entry[23]]) as usize)
                .saturating_sub(1);

        match guid.as_str() {
            GUID_FFV_STREAM => walk_stream(image, base, length, compression, out),
            GUID_ESCD => match image.slice(base, length) {
                Ok(data) => out.push_module(ExtractedModule {
                    name: "ESCD.bin".into(),
                    kind: Some("ESCD"),
                    offset: base,
                    packed_len: length,
                    codec: Codec::Raw,
                    data: data.to_vec(),
                }),
                Err(error) => out.push_failure(base, "ESCD.bin".into(), error),
            },
            GUID_RAW_CODE => emit_hole(image, base, length, &mut hole, out),
            _ => out.push_failure(at, guid.clone(), BiosArcError::unknown_guid(guid)),
        }
    }
    Ok(())
}

/// `%08X-%04X-%04X-%04X-%04X%08X`, first three fields little endian,
/// the rest big endian.
fn format_guid(entry: &[u8]) -> String {
    let g1 = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
    let g2 = u16::from_le_bytes([entry[4], entry[5]]);
    let g3 = u16::from_le_bytes([entry[6], entry[7]]);
    let g4 = u16::from_be_bytes([entry[8], entry[9]]);
    let g5 = u16::from_be_bytes([entry[10], entry[11]]);
    let g6 = u32::from_be_bytes([entry[12], entry[13], entry[14], entry[15]]);
    format!("{g1:08X}-{g2:04X}-{g3:04X}-{g4:04X}-{g5:04X}{g6:08X}")
}

fn emit_hole(image: &BiosImage, base: usize, length: usize, hole: &mut u8, out: &mut Extraction) {
    let name = format!("hole_{:02x}.bin", *hole);
    *hole += 1;
    match image.slice(base, length) {
        Ok(data) => out.push_module(ExtractedModule {
            name,
            kind: Some("Hole (raw code)"),
            offset: base,
            packed_len: length,
            codec: Codec::Raw,
            data: data.to_vec(),
        }),
        Err(error) => out.push_failure(base, name, error),
    }
}

/// Walks a nested stream of FFV modules in `[base, base + length)`.
fn walk_stream(
    image: &BiosImage,
    base: usize,
    length: usize,
    compression: VolumeCompression,
    out: &mut Extraction,
) {
    let end = base + length;
    let mut offset = base;
    while offset < end && offset < image.len() {
        offset += extract_module(image, offset, compression, out);
    }
}

/// Extracts one FFV module, returning how far to advance. A byte that
/// does not carry the module signature advances by one, which is how the
/// stream walk rides over padding.
fn extract_module(
    image: &BiosImage,
    offset: usize,
    compression: VolumeCompression,
    out: &mut Extraction,
) -> usize {
    let module = match FfvModule::read(image, offset) {
        Ok(Some(module)) => module,
        Ok(None) => return 1,
        Err(_) => return 1,
    };

    let Some(length) = module.combined_len.checked_sub(1) else {
        return 1;
    };
    if offset + length >= image.len() {
        out.push_failure(
            offset,
            format!("ffv_{offset:05x}"),
            BiosArcError::buffer_overrun(offset, length, image.len()),
        );
        return 1;
    }

    // GAP entries pad the volume out; nothing to extract.
    if module.file_type == 0xF0 {
        return length.max(1);
    }

    let name = module.name();
    let filename = name.as_deref().and_then(file_name_for);

    if module.file_type == 0x02 {
        extract_section(image, offset, length, &module, name.as_deref(), filename, compression, out);
    } else if let Some(filename) = filename.or_else(|| default_name(module.file_type, offset, length)) {
        emit_content(image, offset, length, filename, module.file_type, out);
    }

    length.max(1)
}

/// Maps a de-marked module name to an output file name. `_Xnn` names go
/// through the module-type table; GUID-named modules (no name) get none.
fn file_name_for(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    if bytes.len() == 4 && bytes[0] == b'_' {
        match names::phoenix_module_name(bytes[1]) {
            Some(base) => Some(format!(
                "{base}_{}{}.rom",
                bytes[2] as char, bytes[3] as char
            )),
            None => Some(format!("{name}.rom")),
        }
    } else if name.is_empty() {
        None
    } else {
        Some(name.to_owned())
    }
}

/// `TYPE_0xSTART-0xEND` fallback for content modules without a usable
/// name.
fn default_name(file_type: u8, offset: usize, length: usize) -> Option<String> {
    Some(format!(
        "{}_0x{:08x}-0x{:08x}",
        names::ffv_file_type(file_type),
        offset,
        offset + length
    ))
}

/// Writes the module content bytes (everything behind the header) as-is.
fn emit_content(
    image: &BiosImage,
    offset: usize,
    length: usize,
    name: String,
    file_type: u8,
    out: &mut Extraction,
) {
    let Some(content_len) = length.checked_sub(HEADER_LEN) else {
        return;
    };
    match image.slice(offset + HEADER_LEN, content_len) {
        Ok(data) => out.push_module(ExtractedModule {
            name,
            kind: Some(names::ffv_file_type(file_type)),
            offset,
            packed_len: content_len,
            codec: Codec::Raw,
            data: data.to_vec(),
        }),
        Err(error) => out.push_failure(offset, name, error),
    }
}

/// SECTION file type: expands COMPRESSION sections, dumps the rest.
#[allow(clippy::too_many_arguments)]
fn extract_section(
    image: &BiosImage,
    offset: usize,
    length: usize,
    module: &FfvModule,
    name: Option<&str>,
    filename: Option<String>,
    compression: VolumeCompression,
    out: &mut Extraction,
) {
    // GUID-defined groups and nameless sections are containers, not
    // content.
    let Some(filename) = filename else {
        return;
    };
    if name.map(|n| n.as_bytes().get(1) == Some(&b'G')).unwrap_or(false) {
        return;
    }

    let section_type = match image.read_u8(offset + HEADER_LEN + 3) {
        Ok(t) => t,
        Err(error) => {
            out.push_failure(offset, filename, error);
            return;
        }
    };

    if section_type != 0x01 {
        log::debug!(
            "0x{offset:05x}: section {}",
            names::ffv_section_type(section_type)
        );
        emit_content(image, offset, length, filename, module.file_type, out);
        return;
    }

    match expand_compressed_section(image, offset, length, compression) {
        Ok(Some((packed_len, data))) => out.push_module(ExtractedModule {
            name: filename,
            kind: Some(names::ffv_file_type(module.file_type)),
            offset,
            packed_len,
            codec: Codec::Lh5,
            data,
        }),
        Ok(None) => {}
        Err(error) => {
            // Keep the stored section when expansion fails.
            out.push_failure(offset, filename.clone(), error);
            emit_content(image, offset, length, filename, module.file_type, out);
        }
    }
}

/// Expands a COMPRESSION section. `Ok(None)` means there is nothing to
/// emit (stored plain, or an empty section).
fn expand_compressed_section(
    image: &BiosImage,
    offset: usize,
    length: usize,
    compression: VolumeCompression,
) -> Result<Option<(usize, Vec<u8>)>> {
    let mut header_at = offset + HEADER_LEN;
    let header = image.slice(header_at, COMP_HEADER_LEN)?;

    // Some volumes wrap the compression header in an extra prefix block;
    // its length field then disagrees with the section extent.
    let total_len = u16::from_le_bytes([header[0], header[1]]) as usize;
    if total_len != length.saturating_sub(HEADER_LEN) && header[11] != 0 {
        header_at += total_len;
    }
    let header = image.slice(header_at, COMP_HEADER_LEN)?;

    let comp_type = header[3];
    let packed_len = ((header[6] as usize) << 16)
        | u16::from_le_bytes([header[4], header[5]]) as usize;
    let real_len = ((header[10] as usize) << 16)
        | u16::from_le_bytes([header[8], header[9]]) as usize;

    if comp_type == 0 || real_len == 0 {
        return Ok(None);
    }
    if !compression.is_lh5() {
        return Err(BiosArcError::unsupported_compression(
            comp_type,
            format!("section at 0x{offset:05x}"),
        ));
    }

    let packed = image.slice(header_at + COMP_HEADER_LEN, packed_len)?;
    let data = Codec::Lh5.expand(packed, real_len)?;
    Ok(Some((packed_len, data)))
}
