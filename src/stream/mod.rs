// Java Object Serialization Stream decoding (stream version 5).
//
// # Modules
//
// - `constants`: Magic, version, tag bytes, class descriptor flags
// - `cursor`: Bounds-checked big-endian byte cursor
// - `error`: Decode error taxonomy
// - `handles`: Handle table of referenceable values
// - `value`: Decoded value tree, class descriptors, block data
// - `decoder`: Recursive-descent stream decoder
// - `json`: JSON rendering of decoded values (`json` feature)

pub mod constants;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod handles;
#[cfg(feature = "json")]
pub mod json;
pub mod value;

// Re-export key types for convenience.
pub use constants::{BASE_WIRE_HANDLE, ClassFlags, STREAM_MAGIC, STREAM_VERSION, Tag};
pub use decoder::{DecodeOptions, Stream, StreamDecoder, decode_stream, decode_stream_with};
pub use error::DecodeError;
pub use handles::{Entry, Handle, HandleKind, HandleTable};
pub use value::{
    ArrayValue, BlockData, ClassDesc, EnumValue, FieldDesc, FieldType, MapKey, Object, Value,
};
