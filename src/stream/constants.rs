// Java Object Serialization Stream constants (java.io.ObjectStreamConstants).
//
// Only the subset of tags this decoder dispatches on is listed.

use bitflags::bitflags;

// ---------------------------------------------------------------------------
// Stream header
// ---------------------------------------------------------------------------

pub const STREAM_MAGIC: u16 = 0xACED;
pub const STREAM_VERSION: u16 = 5;

/// First handle assigned on the wire; wire handles are offsets from this.
pub const BASE_WIRE_HANDLE: u32 = 0x7E_0000;

// ---------------------------------------------------------------------------
// Tag bytes
// ---------------------------------------------------------------------------

pub const TC_NULL: u8 = 0x70;
pub const TC_REFERENCE: u8 = 0x71;
pub const TC_CLASSDESC: u8 = 0x72;
pub const TC_OBJECT: u8 = 0x73;
pub const TC_STRING: u8 = 0x74;
pub const TC_ARRAY: u8 = 0x75;
pub const TC_BLOCKDATA: u8 = 0x77;
pub const TC_ENDBLOCKDATA: u8 = 0x78;
pub const TC_ENUM: u8 = 0x7E;

/// Value-introducing tag, as seen by the recursive-descent dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Null,
    Reference,
    String,
    Array,
    Enum,
    ClassDesc,
    Object,
}

impl Tag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            TC_NULL => Some(Self::Null),
            TC_REFERENCE => Some(Self::Reference),
            TC_STRING => Some(Self::String),
            TC_ARRAY => Some(Self::Array),
            TC_ENUM => Some(Self::Enum),
            TC_CLASSDESC => Some(Self::ClassDesc),
            TC_OBJECT => Some(Self::Object),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Class descriptor flags
// ---------------------------------------------------------------------------

bitflags! {
    /// `classDescFlags` byte of a class descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassFlags: u8 {
        const WRITE_METHOD = 0x01;
        const SERIALIZABLE = 0x02;
        const EXTERNALIZABLE = 0x04;
        const BLOCK_DATA = 0x08;
        const ENUM = 0x10;
    }
}

impl ClassFlags {
    /// Flag combinations this decoder accepts.
    pub const ACCEPTED: [u8; 4] = [0x02, 0x03, 0x0C, 0x12];

    /// Parse a flag byte, rejecting combinations outside [`Self::ACCEPTED`].
    pub fn parse(byte: u8) -> Option<Self> {
        if Self::ACCEPTED.contains(&byte) {
            Some(Self::from_bits_retain(byte))
        } else {
            None
        }
    }

    /// Declared fields are written for this class (0x02, 0x03).
    pub fn has_fields(self) -> bool {
        matches!(self.bits(), 0x02 | 0x03)
    }

    /// A block-data section follows the declared fields (0x03, 0x0C, 0x12).
    pub fn has_block_data(self) -> bool {
        matches!(self.bits(), 0x03 | 0x0C | 0x12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_dispatch_covers_value_tags() {
        for byte in [
            TC_NULL,
            TC_REFERENCE,
            TC_STRING,
            TC_ARRAY,
            TC_ENUM,
            TC_CLASSDESC,
            TC_OBJECT,
        ] {
            assert!(Tag::from_byte(byte).is_some(), "{byte:#04x}");
        }
        assert_eq!(Tag::from_byte(TC_BLOCKDATA), None);
        assert_eq!(Tag::from_byte(TC_ENDBLOCKDATA), None);
        assert_eq!(Tag::from_byte(0x00), None);
    }

    #[test]
    fn accepted_flag_bytes() {
        assert!(ClassFlags::parse(0x02).unwrap().has_fields());
        assert!(!ClassFlags::parse(0x02).unwrap().has_block_data());

        let write = ClassFlags::parse(0x03).unwrap();
        assert!(write.has_fields() && write.has_block_data());
        assert!(write.contains(ClassFlags::WRITE_METHOD));

        let ext = ClassFlags::parse(0x0C).unwrap();
        assert!(!ext.has_fields() && ext.has_block_data());

        let en = ClassFlags::parse(0x12).unwrap();
        assert!(!en.has_fields() && en.has_block_data());
        assert!(en.contains(ClassFlags::ENUM));

        assert_eq!(ClassFlags::parse(0x00), None);
        assert_eq!(ClassFlags::parse(0x06), None);
        assert_eq!(ClassFlags::parse(0x01), None);
    }
}
