//! Vendor part-id lookup tables and output file naming.
//!
//! Output names follow the conventions of the vendors' own build tools, so
//! extracted trees can be fed back to tooling that expects them
//! (`amibody_xx.rom`, `bioscode_0.rom`, and so on).

/// AMI part descriptions, keyed by the part id byte.
const AMI_MODULE_NAMES: &[(u8, &str)] = &[
    (0x00, "POST"),
    (0x01, "Setup Server"),
    (0x02, "RunTime"),
    (0x03, "DIM"),
    (0x04, "Setup Client"),
    (0x05, "Remote Server"),
    (0x06, "DMI Data"),
    (0x07, "Green PC"),
    (0x08, "Interface"),
    (0x09, "MP"),
    (0x0A, "Notebook"),
    (0x0B, "Int-10"),
    (0x0C, "ROM-ID"),
    (0x0D, "Int-13"),
    (0x0E, "OEM Logo"),
    (0x0F, "ACPI Table"),
    (0x10, "ACPI AML"),
    (0x11, "P6 Microcode"),
    (0x12, "Configuration"),
    (0x13, "DMI Code"),
    (0x14, "System Health"),
    (0x15, "Memory Sizing"),
    (0x16, "Memory Test"),
    (0x17, "Debug"),
    (0x18, "ADM (Display MGR)"),
    (0x19, "ADM Font"),
    (0x1A, "Small Logo"),
    (0x1B, "SLAB"),
    (0x20, "PCI AddOn ROM"),
    (0x21, "Multilanguage"),
    (0x22, "UserDefined"),
    (0x23, "ASCII Font"),
    (0x24, "BIG5 Font"),
    (0x25, "OEM Logo"),
    (0x2A, "User ROM"),
    (0x2B, "PXE Code"),
    (0x2C, "AMI Font"),
    (0x2D, "Battery Refresh"),
    (0x2E, "User ROM"),
    (0x30, "Font Database"),
    (0x31, "OEM Logo Data"),
    (0x32, "Graphic Logo Code"),
    (0x33, "Graphic Logo Data"),
    (0x34, "Action Logo Code"),
    (0x35, "Action Logo Data"),
    (0x36, "Virus"),
    (0x37, "Online Menu"),
    (0x38, "Lang1 as ROM"),
    (0x39, "Lang2 as ROM"),
    (0x3A, "Lang3 as ROM"),
    (0x40, "AMD CIM-X NB binary"),
    (0x60, "AMD CIM-X SB binary"),
    (0x70, "OSD Bitmaps"),
    (0xF0, "Asrock Backup Util"),
    (0xF9, "Asrock AMD AHCI DLL"),
    (0xFA, "Asrock LOGO GIF"),
    (0xFB, "Asrock LOGO JPG"),
    (0xFC, "Asrock LOGO JPG"),
    (0xFD, "Asrock LOGO PCX - Instant boot"),
];

/// Human-readable description of an AMI part id, when known.
pub fn ami_module_name(id: u8) -> Option<&'static str> {
    AMI_MODULE_NAMES
        .iter()
        .find(|&&(tag, _)| tag == id)
        .map(|&(_, name)| name)
}

/// Output file name for an AMI95 part.
///
/// PCI option ROMs (id 0x20) encode the vendor/device pair, language
/// modules (id 0x21) the two-letter language code; everything else is
/// named by its id byte. For 0x20 and 0x21 the `tag` is the part's
/// destination field, which holds the PCI id or language code.
pub fn ami95_file_name(id: u8, tag: u32) -> String {
    match id {
        0x20 => {
            let vid = tag & 0xFFFF;
            let pid = tag >> 16;
            format!("amipci_{vid:04X}_{pid:04X}.rom")
        }
        0x21 => {
            let hi = ((tag >> 8) & 0xFF) as u8 as char;
            let lo = (tag & 0xFF) as u8 as char;
            format!("amilang_{hi}{lo}.rom")
        }
        _ => format!("amibody_{id:02x}.rom"),
    }
}

/// Phoenix module base names, keyed by the type character.
const PHOENIX_MODULE_NAMES: &[(u8, &str)] = &[
    (b'A', "acpi"),
    (b'B', "bioscode"),
    (b'C', "update"),
    (b'D', "display"),
    (b'E', "setup"),
    (b'F', "font"),
    (b'G', "decompcode"),
    (b'I', "bootblock"),
    (b'L', "logo"),
    (b'M', "miser"),
    (b'N', "rompilotload"),
    (b'O', "network"),
    (b'P', "rompilotinit"),
    (b'R', "oprom"),
    (b'S', "strings"),
    (b'T', "template"),
    (b'U', "user"),
    (b'X', "romexec"),
    (b'W', "wav"),
    (b'H', "tcpa_H"),
    (b'K', "tcpa_K"),
    (b'Q', "tcpa_Q"),
    (b'<', "tcpa_<"),
    (b'*', "tcpa_*"),
    (b'?', "tcpa_?"),
    (b'$', "biosentry"),
    (b'J', "SmartCardPAS"),
];

/// Base name for a Phoenix module type character, when known.
pub fn phoenix_module_name(type_char: u8) -> Option<&'static str> {
    PHOENIX_MODULE_NAMES
        .iter()
        .find(|&&(tag, _)| tag == type_char)
        .map(|&(_, name)| name)
}

/// Output file name for a Phoenix BCP module.
///
/// Known types get their base name, unknown types fall back to the raw
/// type byte. `id` distinguishes multiple modules of one type.
pub fn phoenix_file_name(type_char: u8, id: u8) -> String {
    match phoenix_module_name(type_char) {
        Some(base) => format!("{base}_{id}.rom"),
        None => format!("{type_char:02X}_{id}.rom"),
    }
}

/// FFV file type descriptions.
const FFV_FILE_TYPES: &[(u8, &str)] = &[
    (0x00, "ALL"),
    (0x01, "BIN"),
    (0x02, "SECTION"),
    (0x03, "CEIMAIN"),
    (0x04, "PEIMAIN"),
    (0x05, "DXEMAIN"),
    (0x06, "PEI"),
    (0x07, "DXE"),
    (0x08, "COMBINED_PEIM_DRIVER"),
    (0x09, "APP"),
    (0x0B, "FFV"),
    (0xC2, "CEI"),
    (0xC3, "XIP"),
    (0xC4, "BB"),
    (0xD0, "SDXE"),
    (0xD1, "DXESDXE"),
    (0xF0, "GAP"),
];

/// Description of an FFV file type byte.
pub fn ffv_file_type(id: u8) -> &'static str {
    FFV_FILE_TYPES
        .iter()
        .find(|&&(tag, _)| tag == id)
        .map_or("UNKNOWN", |&(_, name)| name)
}

/// FFV section type descriptions.
const FFV_SECTION_TYPES: &[(u8, &str)] = &[
    (0x01, "COMPRESSION"),
    (0x02, "GUID_DEFINED"),
    (0x10, "PE32"),
    (0x11, "PIC"),
    (0x12, "TE"),
    (0x13, "DXE_DEPEX"),
    (0x14, "VERSION"),
    (0x15, "USER_INTERFACE"),
    (0x16, "COMPATIBILITY16"),
    (0x17, "FIRMWARE_VOLUME_IMAGE"),
    (0x18, "FREEFORM_SUBTYPE_GUID"),
    (0x19, "BIN"),
    (0x1A, "PE64"),
    (0x1B, "PEI_DEPEX"),
    (0xC0, "SOURCECODE"),
    (0xC1, "FFV"),
    (0xC2, "RE32"),
    (0xC3, "XIP16"),
    (0xC4, "XIP32"),
    (0xC5, "XIP64"),
    (0xC6, "PLACE16"),
    (0xC7, "PLACE32"),
    (0xC8, "PLACE64"),
    (0xCF, "PCI_DEVICE"),
    (0xD0, "PDB"),
];

/// Description of an FFV section type byte.
pub fn ffv_section_type(id: u8) -> &'static str {
    FFV_SECTION_TYPES
        .iter()
        .find(|&&(tag, _)| tag == id)
        .map_or("UNKNOWN", |&(_, name)| name)
}
