//! Error types for biosarc operations.
//!
//! One error enum covers the whole pipeline: image loading, directory
//! walking, and both decompression codecs. Firmware images are untrusted
//! input, so every malformed-data condition is a recoverable error here,
//! never a panic.

use std::io;
use thiserror::Error;

/// The main error type for biosarc operations.
#[derive(Debug, Error)]
pub enum BiosArcError {
    /// I/O error from the underlying file or output sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A Huffman length table failed its code-space invariant.
    #[error("Malformed Huffman table: {message}")]
    MalformedTable {
        /// Description of the violated invariant.
        message: String,
    },

    /// Input ran out where the stream format requires more bytes.
    #[error("Truncated input: needed {needed} more bytes at offset {offset}")]
    TruncatedInput {
        /// Byte offset at which input was exhausted.
        offset: usize,
        /// Number of bytes that were still required.
        needed: usize,
    },

    /// Declared extents reach past the end of the image or a declared size.
    #[error("Buffer overrun: range {offset:#x}+{length:#x} exceeds bound {bound:#x}")]
    BufferOverrun {
        /// Start of the offending range.
        offset: usize,
        /// Length of the offending range.
        length: usize,
        /// The bound that was exceeded.
        bound: usize,
    },

    /// A back-reference pointed before the start of the output.
    #[error("Decode fault: back-reference offset {offset} at output position {position}")]
    DecodeFault {
        /// The back-reference offset.
        offset: usize,
        /// Output position when the fault was detected.
        position: usize,
    },

    /// A module carries a compression tag we do not understand.
    #[error("Unsupported compression tag {tag:#04x} for module {module}")]
    UnsupportedCompression {
        /// The unrecognized tag value.
        tag: u8,
        /// Name of the affected module.
        module: String,
    },

    /// A firmware-volume entry carries a GUID outside the known set.
    #[error("Unknown firmware volume GUID: {guid}")]
    UnknownVolumeGuid {
        /// Textual form of the GUID.
        guid: String,
    },

    /// A module header failed its signature or structural checks.
    #[error("Invalid module header at {offset:#x}: {message}")]
    InvalidModule {
        /// Offset of the bad header.
        offset: usize,
        /// Description of the failure.
        message: String,
    },

    /// CRC checksum mismatch on expanded data.
    #[error("CRC mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    CrcMismatch {
        /// Expected CRC value from the header.
        expected: u16,
        /// Computed CRC value of the data.
        computed: u16,
    },

    /// No known container signature was found in the image.
    #[error("Unknown BIOS image format")]
    UnknownFormat,
}

/// Result type alias for biosarc operations.
pub type Result<T> = std::result::Result<T, BiosArcError>;

impl BiosArcError {
    /// Create a malformed-table error.
    pub fn malformed_table(message: impl Into<String>) -> Self {
        Self::MalformedTable {
            message: message.into(),
        }
    }

    /// Create a truncated-input error.
    pub fn truncated(offset: usize, needed: usize) -> Self {
        Self::TruncatedInput { offset, needed }
    }

    /// Create a buffer-overrun error.
    pub fn buffer_overrun(offset: usize, length: usize, bound: usize) -> Self {
        Self::BufferOverrun {
            offset,
            length,
            bound,
        }
    }

    /// Create a decode-fault error.
    pub fn decode_fault(offset: usize, position: usize) -> Self {
        Self::DecodeFault { offset, position }
    }

    /// Create an unsupported-compression error.
    pub fn unsupported_compression(tag: u8, module: impl Into<String>) -> Self {
        Self::UnsupportedCompression {
            tag,
            module: module.into(),
        }
    }

    /// Create an unknown-GUID error.
    pub fn unknown_guid(guid: impl Into<String>) -> Self {
        Self::UnknownVolumeGuid { guid: guid.into() }
    }

    /// Create an invalid-module error.
    pub fn invalid_module(offset: usize, message: impl Into<String>) -> Self {
        Self::InvalidModule {
            offset,
            message: message.into(),
        }
    }

    /// Create a CRC-mismatch error.
    pub fn crc_mismatch(expected: u16, computed: u16) -> Self {
        Self::CrcMismatch { expected, computed }
    }
}
