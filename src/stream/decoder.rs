// Java Object Serialization Stream decoder.
//
// Recursive descent over a single tag byte per value. Every referenceable
// value is registered in the handle table before its children are decoded,
// matching the writer's pre-registration order, so handle numbering stays in
// step with the stream.

use log::{debug, trace};

use super::constants::{
    BASE_WIRE_HANDLE, ClassFlags, STREAM_MAGIC, STREAM_VERSION, TC_BLOCKDATA, TC_ENDBLOCKDATA, Tag,
};
use super::cursor::Cursor;
use super::error::DecodeError;
use super::handles::{Entry, Handle, HandleTable};
use super::value::{
    ArrayElement, ArrayValue, BlockClass, BlockData, ClassDesc, EnumValue, FieldDesc, FieldType,
    Object, Value,
};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Default nesting limit for recursive values.
///
/// Fits an unoptimized build on a 2 MiB thread stack.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum recursion depth of nested values before decoding fails.
    ///
    /// Decoding recurses once per level. Each nested object costs a few KiB
    /// of stack in debug builds, so limits above the default need a larger
    /// thread stack there.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded stream
// ---------------------------------------------------------------------------

/// Result of decoding one stream: the top-level values and the handle table
/// that owns every composite they point into.
#[derive(Debug, Clone)]
pub struct Stream {
    values: Vec<Value>,
    handles: HandleTable,
}

impl Stream {
    /// Top-level values in stream order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn into_parts(self) -> (Vec<Value>, HandleTable) {
        (self.values, self.handles)
    }

    pub fn object(&self, value: &Value) -> Option<&Object> {
        match value {
            Value::Object(h) => self.handles.object(*h),
            _ => None,
        }
    }

    pub fn array(&self, value: &Value) -> Option<&ArrayValue> {
        match value {
            Value::Array(h) => self.handles.array(*h),
            _ => None,
        }
    }

    pub fn enum_value(&self, value: &Value) -> Option<&EnumValue> {
        match value {
            Value::Enum(h) => self.handles.enum_value(*h),
            _ => None,
        }
    }

    pub fn class(&self, handle: Handle) -> Option<&ClassDesc> {
        self.handles.class_desc(handle)
    }

    /// Block data of an object value.
    pub fn data(&self, value: &Value) -> Option<&BlockData> {
        self.object(value)?.data()
    }

    /// Walk a field path from `value`.
    ///
    /// Each segment names an object field. The segment `data` on an object
    /// carrying block data consumes the next segment as a key of its mapping.
    pub fn path<'s>(&'s self, value: &'s Value, segments: &[&str]) -> Option<&'s Value> {
        let mut current = value;
        let mut segments = segments.iter();
        while let Some(segment) = segments.next() {
            let object = self.object(current)?;
            current = match (*segment, object.data()) {
                ("data", Some(block)) => block.get(segments.next()?)?,
                _ => object.get(segment)?,
            };
        }
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Decode a complete stream with default options.
pub fn decode_stream(data: &[u8]) -> Result<Stream, DecodeError> {
    decode_stream_with(data, DecodeOptions::default())
}

pub fn decode_stream_with(data: &[u8], options: DecodeOptions) -> Result<Stream, DecodeError> {
    StreamDecoder::new(data, options)?.finish()
}

// ---------------------------------------------------------------------------
// StreamDecoder
// ---------------------------------------------------------------------------

/// Incremental decoder yielding one top-level value per call.
pub struct StreamDecoder<'a> {
    cursor: Cursor<'a>,
    handles: HandleTable,
    values: Vec<Value>,
    options: DecodeOptions,
}

impl<'a> StreamDecoder<'a> {
    /// Validate the stream header and position the decoder at the first value.
    pub fn new(data: &'a [u8], options: DecodeOptions) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(data);
        let magic = cursor.read_u16()?;
        if magic != STREAM_MAGIC {
            return Err(DecodeError::BadMagic { found: magic });
        }
        let version = cursor.read_u16()?;
        if version != STREAM_VERSION {
            return Err(DecodeError::BadVersion { found: version });
        }
        Ok(Self {
            cursor,
            handles: HandleTable::new(),
            values: Vec::new(),
            options,
        })
    }

    /// Decode the next top-level value.
    ///
    /// Returns `None` once the input is exhausted at a value boundary.
    pub fn decode_next(&mut self) -> Result<Option<Value>, DecodeError> {
        if self.cursor.is_empty() {
            return Ok(None);
        }
        let value = self.decode_value(0)?;
        self.values.push(value.clone());
        Ok(Some(value))
    }

    /// Decode all remaining values and hand back the decoded stream.
    pub fn finish(mut self) -> Result<Stream, DecodeError> {
        while self.decode_next()?.is_some() {}
        debug!(
            "decoded {} top-level values, {} handles, {} bytes",
            self.values.len(),
            self.handles.len(),
            self.cursor.position()
        );
        Ok(Stream {
            values: self.values,
            handles: self.handles,
        })
    }

    pub fn values_decoded(&self) -> usize {
        self.values.len()
    }

    /// Current byte offset into the stream.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn decode_value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let offset = self.cursor.position();
        if depth > self.options.max_depth {
            return Err(DecodeError::DepthLimitExceeded {
                limit: self.options.max_depth,
                offset,
            });
        }
        let byte = self.cursor.read_u8()?;
        let tag = Tag::from_byte(byte).ok_or(DecodeError::UnknownTag { tag: byte, offset })?;
        trace!("{tag:?} at offset {offset}, depth {depth}");

        match tag {
            Tag::Null => Ok(Value::Null),
            Tag::Reference => self.read_reference(offset),
            Tag::String => self.read_string(),
            Tag::Array => self.read_array(depth, offset),
            Tag::Enum => self.read_enum(depth),
            Tag::ClassDesc => self.read_class_desc(depth, offset),
            Tag::Object => self.read_object(depth, offset),
        }
    }

    fn read_reference(&mut self, offset: usize) -> Result<Value, DecodeError> {
        let wire = self.cursor.read_u32()?;
        let index = i64::from(wire) - i64::from(BASE_WIRE_HANDLE);
        let (handle, entry) =
            self.handles
                .resolve(index)
                .map_err(|e| DecodeError::OutOfRangeReference {
                    handle: e.index,
                    len: e.len,
                    offset,
                })?;
        Ok(match entry {
            Entry::String(s) => Value::String(s.clone()),
            Entry::Array(_) => Value::Array(handle),
            Entry::Enum(_) => Value::Enum(handle),
            Entry::ClassDesc(_) => Value::Class(handle),
            Entry::Object(_) => Value::Object(handle),
        })
    }

    fn read_string(&mut self) -> Result<Value, DecodeError> {
        let s = self.read_utf()?;
        self.handles.register(Entry::String(s.clone()));
        Ok(Value::String(s))
    }

    fn read_array(&mut self, depth: usize, offset: usize) -> Result<Value, DecodeError> {
        let class = self.read_required_class(depth)?;
        let count = self.cursor.read_u32()? as usize;
        let name = &self.class_desc(class, offset)?.name;
        let element =
            ArrayElement::from_class_name(name).ok_or_else(|| DecodeError::UnsupportedArrayType {
                name: name.clone(),
                offset,
            })?;

        let handle = self.handles.register(Entry::Array(ArrayValue {
            class,
            elements: Vec::new(),
        }));
        let mut elements = Vec::with_capacity(count.min(self.cursor.remaining() / element.width()));
        for _ in 0..count {
            elements.push(match element {
                ArrayElement::Byte => Value::Byte(self.cursor.read_u8()?),
                ArrayElement::Int => Value::Bytes(self.cursor.read_bytes(4)?.to_vec()),
            });
        }
        if let Some(array) = self.handles.array_mut(handle) {
            array.elements = elements;
        }
        Ok(Value::Array(handle))
    }

    fn read_enum(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let class = self.read_required_class(depth)?;
        let handle = self.handles.register(Entry::Enum(EnumValue {
            class,
            constant: String::new(),
        }));
        let constant = self.read_required_string(depth)?;
        if let Some(e) = self.handles.enum_mut(handle) {
            e.constant = constant;
        }
        Ok(Value::Enum(handle))
    }

    fn read_class_desc(&mut self, depth: usize, offset: usize) -> Result<Value, DecodeError> {
        let full_name = self.read_utf()?;
        let name = full_name
            .rsplit_once('.')
            .map_or(full_name.as_str(), |(_, simple)| simple)
            .to_string();
        self.cursor.skip(8)?; // serialVersionUID

        let flags_offset = self.cursor.position();
        let flag_byte = self.cursor.read_u8()?;
        let flags = ClassFlags::parse(flag_byte).ok_or_else(|| DecodeError::UnknownClassFlags {
            flags: flag_byte,
            class: full_name.clone(),
            offset: flags_offset,
        })?;
        debug!("class '{full_name}' flags {flag_byte:#04X} at offset {offset}");

        let handle = self.handles.register(Entry::ClassDesc(ClassDesc {
            name,
            flags,
            fields: Vec::new(),
            parent: None,
        }));

        let field_count = self.cursor.read_u16()?;
        for _ in 0..field_count {
            let field_type = FieldType::from_code(self.cursor.read_u8()?);
            let field_name = self.read_utf()?;
            let class_name = if field_type.is_reference() {
                let type_name = self.read_required_string(depth)?;
                Some(
                    type_name
                        .rsplit_once('/')
                        .map_or(type_name.as_str(), |(_, simple)| simple)
                        .to_string(),
                )
            } else {
                None
            };
            if let Some(desc) = self.handles.class_desc_mut(handle) {
                desc.fields.push(FieldDesc {
                    name: field_name,
                    field_type,
                    class_name,
                });
            }
        }

        self.expect_end_block()?;

        let parent = self.read_class_ref(depth)?;
        if let Some(desc) = self.handles.class_desc_mut(handle) {
            desc.parent = parent;
        }
        Ok(Value::Class(handle))
    }

    fn read_object(&mut self, depth: usize, offset: usize) -> Result<Value, DecodeError> {
        let class = self.read_required_class(depth)?;
        let class_name = self.class_desc(class, offset)?.name.clone();
        let handle = self
            .handles
            .register(Entry::Object(Object::new(class, class_name)));

        for ancestor in self.ancestry(class, offset)? {
            let desc = self.class_desc(ancestor, offset)?.clone();
            if desc.flags.has_fields() {
                for field in &desc.fields {
                    let value = self.read_field(field, depth)?;
                    if let Some(object) = self.handles.object_mut(handle) {
                        object.set_field(&field.name, value);
                    }
                }
            }
            if desc.flags.has_block_data() {
                self.read_block_data(handle, &desc.name, depth)?;
            }
        }
        Ok(Value::Object(handle))
    }

    // -----------------------------------------------------------------------
    // Object internals
    // -----------------------------------------------------------------------

    /// Class chain of `class`, root ancestor first.
    fn ancestry(&self, class: Handle, offset: usize) -> Result<Vec<Handle>, DecodeError> {
        let mut chain = vec![class];
        let mut current = class;
        while let Some(parent) = self.class_desc(current, offset)?.parent {
            if chain.contains(&parent) {
                return Err(DecodeError::CyclicClassHierarchy {
                    class: self.class_desc(class, offset)?.name.clone(),
                    offset,
                });
            }
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    fn read_field(&mut self, field: &FieldDesc, depth: usize) -> Result<Value, DecodeError> {
        let offset = self.cursor.position();
        Ok(match field.field_type {
            FieldType::Int => Value::Int(u64::from(self.cursor.read_u32()?)),
            FieldType::Short => Value::Int(u64::from(self.cursor.read_u16()?)),
            FieldType::Long => Value::Int(self.cursor.read_u64()?),
            FieldType::Boolean => match self.cursor.read_u8()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                value => {
                    return Err(DecodeError::InvalidBoolean {
                        value,
                        field: field.name.clone(),
                        offset,
                    });
                }
            },
            FieldType::Float => Value::Float(self.cursor.read_array()?),
            FieldType::Byte | FieldType::Char => Value::Byte(self.cursor.read_u8()?),
            FieldType::Object | FieldType::Array => self.decode_value(depth + 1)?,
            FieldType::Other(code) => {
                return Err(DecodeError::UnknownFieldType {
                    code: char::from(code),
                    field: field.name.clone(),
                    offset,
                });
            }
        })
    }

    /// Read the optional block section written by a class's `writeObject`,
    /// followed by the end-of-block marker.
    fn read_block_data(
        &mut self,
        handle: Handle,
        class_name: &str,
        depth: usize,
    ) -> Result<(), DecodeError> {
        let offset = self.cursor.position();
        let marker = self.cursor.read_u8()?;
        if marker == TC_ENDBLOCKDATA {
            // writeObject wrote nothing beyond the default fields
            return Ok(());
        }
        if marker != TC_BLOCKDATA {
            return Err(DecodeError::MissingEndBlock {
                found: marker,
                offset,
            });
        }

        let len = self.cursor.read_u8()? as usize;
        let block = self.cursor.read_bytes(len)?;
        let kind = BlockClass::from_class_name(class_name).ok_or_else(|| {
            DecodeError::UnsupportedBlockClass {
                class: class_name.to_string(),
                offset,
            }
        })?;
        if len != kind.block_len() {
            return Err(DecodeError::BadBlockLength {
                class: class_name.to_string(),
                expected: kind.block_len(),
                actual: len,
                offset,
            });
        }

        let count = match kind {
            BlockClass::Map | BlockClass::Set => {
                u32::from_be_bytes([block[len - 4], block[len - 3], block[len - 2], block[len - 1]])
                    as usize
            }
            BlockClass::List => self.list_size(handle, class_name, offset)?,
        };
        debug!("block data for '{class_name}' at offset {offset}: {count} entries");

        // Each nested value takes at least one byte.
        let capacity = count.min(self.cursor.remaining());
        let data = match kind {
            BlockClass::Map => {
                let mut pairs = Vec::with_capacity(capacity / 2);
                for _ in 0..count {
                    let key = self.decode_value(depth + 1)?;
                    let value = self.decode_value(depth + 1)?;
                    pairs.push((key, value));
                }
                BlockData::from_pairs(pairs)
            }
            BlockClass::Set | BlockClass::List => {
                let mut items = Vec::with_capacity(capacity);
                for _ in 0..count {
                    items.push(self.decode_value(depth + 1)?);
                }
                BlockData::Seq(items)
            }
        };
        if let Some(object) = self.handles.object_mut(handle) {
            object.set_data(data);
        }

        self.expect_end_block()
    }

    /// Element count of an ArrayList: its already-decoded `size` field.
    fn list_size(
        &self,
        object: Handle,
        class_name: &str,
        offset: usize,
    ) -> Result<usize, DecodeError> {
        self.handles
            .object(object)
            .and_then(|o| o.get("size"))
            .and_then(Value::as_int)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| DecodeError::MissingSizeField {
                class: class_name.to_string(),
                offset,
            })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn read_utf(&mut self) -> Result<String, DecodeError> {
        let offset = self.cursor.position();
        let bytes = self.cursor.read_short_prefixed()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }

    fn expect_end_block(&mut self) -> Result<(), DecodeError> {
        let offset = self.cursor.position();
        match self.cursor.read_u8()? {
            TC_ENDBLOCKDATA => Ok(()),
            found => Err(DecodeError::MissingEndBlock { found, offset }),
        }
    }

    /// A nested class descriptor slot, which may be null.
    fn read_class_ref(&mut self, depth: usize) -> Result<Option<Handle>, DecodeError> {
        let offset = self.cursor.position();
        match self.decode_value(depth + 1)? {
            Value::Class(h) => Ok(Some(h)),
            Value::Null => Ok(None),
            other => Err(DecodeError::UnexpectedValue {
                expected: "class descriptor",
                found: other.kind_name(),
                offset,
            }),
        }
    }

    fn read_required_class(&mut self, depth: usize) -> Result<Handle, DecodeError> {
        let offset = self.cursor.position();
        self.read_class_ref(depth)?
            .ok_or(DecodeError::UnexpectedValue {
                expected: "class descriptor",
                found: "null",
                offset,
            })
    }

    fn read_required_string(&mut self, depth: usize) -> Result<String, DecodeError> {
        let offset = self.cursor.position();
        match self.decode_value(depth + 1)? {
            Value::String(s) => Ok(s),
            other => Err(DecodeError::UnexpectedValue {
                expected: "string",
                found: other.kind_name(),
                offset,
            }),
        }
    }

    fn class_desc(&self, handle: Handle, offset: usize) -> Result<&ClassDesc, DecodeError> {
        self.handles
            .class_desc(handle)
            .ok_or(DecodeError::UnexpectedValue {
                expected: "class descriptor",
                found: "other handle",
                offset,
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
