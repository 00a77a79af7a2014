// Decode error taxonomy.
//
// Every variant is fatal for the decode session: a misread byte at any depth
// desynchronizes the rest of the stream, so there is no partial result.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("bad stream magic {found:#06X}, expected 0xACED")]
    BadMagic { found: u16 },

    #[error("unsupported stream version {found}, expected 5")]
    BadVersion { found: u16 },

    #[error("unknown tag {tag:#04X} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    #[error("unknown class flags {flags:#04X} for class '{class}' at offset {offset}")]
    UnknownClassFlags {
        flags: u8,
        class: String,
        offset: usize,
    },

    #[error("expected end-of-block marker 0x78 at offset {offset}, found {found:#04X}")]
    MissingEndBlock { found: u8, offset: usize },

    #[error("unsupported array type '{name}' at offset {offset}")]
    UnsupportedArrayType { name: String, offset: usize },

    #[error("unsupported block data for class '{class}' at offset {offset}")]
    UnsupportedBlockClass { class: String, offset: usize },

    #[error(
        "block data for class '{class}' is {actual} bytes, expected {expected} (offset {offset})"
    )]
    BadBlockLength {
        class: String,
        expected: usize,
        actual: usize,
        offset: usize,
    },

    #[error("reference to handle {handle} out of range (table holds {len}) at offset {offset}")]
    OutOfRangeReference {
        handle: i64,
        len: usize,
        offset: usize,
    },

    #[error("truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("invalid boolean {value:#04X} for field '{field}' at offset {offset}")]
    InvalidBoolean {
        value: u8,
        field: String,
        offset: usize,
    },

    #[error("unknown type code {code:?} for field '{field}' at offset {offset}")]
    UnknownFieldType {
        code: char,
        field: String,
        offset: usize,
    },

    #[error("expected {expected}, found {found} at offset {offset}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
        offset: usize,
    },

    #[error("ArrayList class '{class}' has no integer 'size' field (offset {offset})")]
    MissingSizeField { class: String, offset: usize },

    #[error("class hierarchy of '{class}' is cyclic (offset {offset})")]
    CyclicClassHierarchy { class: String, offset: usize },

    #[error("nesting depth limit {limit} exceeded at offset {offset}")]
    DepthLimitExceeded { limit: usize, offset: usize },
}

impl DecodeError {
    /// Byte offset the failure was detected at (not known for header errors).
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::BadMagic { .. } | Self::BadVersion { .. } => None,
            Self::UnknownTag { offset, .. }
            | Self::UnknownClassFlags { offset, .. }
            | Self::MissingEndBlock { offset, .. }
            | Self::UnsupportedArrayType { offset, .. }
            | Self::UnsupportedBlockClass { offset, .. }
            | Self::BadBlockLength { offset, .. }
            | Self::OutOfRangeReference { offset, .. }
            | Self::TruncatedInput { offset, .. }
            | Self::InvalidUtf8 { offset }
            | Self::InvalidBoolean { offset, .. }
            | Self::UnknownFieldType { offset, .. }
            | Self::UnexpectedValue { offset, .. }
            | Self::MissingSizeField { offset, .. }
            | Self::CyclicClassHierarchy { offset, .. }
            | Self::DepthLimitExceeded { offset, .. } => Some(*offset),
        }
    }
}
