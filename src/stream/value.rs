// Decoded value tree.
//
// Referenceable composites (arrays, enums, class descriptors, objects) live in
// the handle table and appear in the tree as handles, so every back-reference
// to a slot denotes the same instance.

use std::collections::HashMap;

use super::constants::ClassFlags;
use super::handles::Handle;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// One decoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    /// `int`, `short` and `long` fields, big-endian, read as unsigned.
    Int(u64),
    /// `byte`/`char` fields and `byte[]` elements, left undecoded.
    Byte(u8),
    /// `float` fields as their raw big-endian bytes.
    Float([u8; 4]),
    /// One `int[]` element as its raw big-endian bytes.
    Bytes(Vec<u8>),
    String(String),
    Array(Handle),
    Enum(Handle),
    Class(Handle),
    Object(Handle),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Byte(_) => "byte",
            Self::Float(_) => "float",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Enum(_) => "enum",
            Self::Class(_) => "class descriptor",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Handle of a table-resident composite value.
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Self::Array(h) | Self::Enum(h) | Self::Class(h) | Self::Object(h) => Some(*h),
            _ => None,
        }
    }
}

/// Render a float field the way diagnostics show raw bytes: `"3F 80 00 00"`.
pub fn float_hex(bytes: &[u8; 4]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Map keys and block data
// ---------------------------------------------------------------------------

/// A value usable as a mapping key. Composite values never are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Null,
    Bool(bool),
    Int(u64),
    Byte(u8),
    Float([u8; 4]),
    String(String),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Int(n) => Some(Self::Int(*n)),
            Value::Byte(b) => Some(Self::Byte(*b)),
            Value::Float(f) => Some(Self::Float(*f)),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Bytes(_)
            | Value::Array(_)
            | Value::Enum(_)
            | Value::Class(_)
            | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<MapKey> for Value {
    fn from(key: MapKey) -> Self {
        match key {
            MapKey::Null => Value::Null,
            MapKey::Bool(b) => Value::Bool(b),
            MapKey::Int(n) => Value::Int(n),
            MapKey::Byte(b) => Value::Byte(b),
            MapKey::Float(f) => Value::Float(f),
            MapKey::String(s) => Value::String(s),
        }
    }
}

/// Payload of a class's `writeObject` block section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockData {
    /// HashMap/Hashtable entries, in read order.
    Map(Vec<(MapKey, Value)>),
    /// HashMap/Hashtable entries when some key is a composite value, as
    /// `(key, value)` pairs in read order.
    ///
    /// This shape is inherited behaviour kept for existing consumers of the
    /// session tooling. The wire format itself does not call for it.
    Pairs(Vec<(Value, Value)>),
    /// HashSet/ArrayList elements, in read order.
    Seq(Vec<Value>),
}

impl BlockData {
    /// Build a mapping from decoded pairs, falling back to `Pairs` if any key
    /// is not key-safe. Duplicate keys keep their first position and take the
    /// last value.
    pub fn from_pairs(pairs: Vec<(Value, Value)>) -> Self {
        let mut map: Vec<(MapKey, Value)> = Vec::with_capacity(pairs.len());
        let mut index: HashMap<MapKey, usize> = HashMap::with_capacity(pairs.len());
        for (key, value) in &pairs {
            let Some(key) = MapKey::from_value(key) else {
                return Self::Pairs(pairs);
            };
            match index.get(&key) {
                Some(&slot) => map[slot].1 = value.clone(),
                None => {
                    index.insert(key.clone(), map.len());
                    map.push((key, value.clone()));
                }
            }
        }
        Self::Map(map)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Map(m) => m.len(),
            Self::Pairs(p) => p.len(),
            Self::Seq(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a string key in a `Map` block.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(m) => m
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::Seq(s) => Some(s),
            _ => None,
        }
    }
}

/// Collection classes whose block encoding is understood, matched by suffix
/// of the simple class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClass {
    /// `HashMap`/`Hashtable`: capacity (4) + entry count (4).
    Map,
    /// `HashSet`: capacity (4) + load factor (4) + entry count (4).
    Set,
    /// `ArrayList`: capacity (4); the count comes from the `size` field.
    List,
}

impl BlockClass {
    pub fn from_class_name(name: &str) -> Option<Self> {
        if name.ends_with("HashMap") || name.ends_with("Hashtable") {
            Some(Self::Map)
        } else if name.ends_with("HashSet") {
            Some(Self::Set)
        } else if name.ends_with("ArrayList") {
            Some(Self::List)
        } else {
            None
        }
    }

    pub fn block_len(self) -> usize {
        match self {
            Self::Map => 8,
            Self::Set => 12,
            Self::List => 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Class descriptors
// ---------------------------------------------------------------------------

/// Declared type of a serializable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Short,
    Long,
    Boolean,
    Float,
    Byte,
    Char,
    Object,
    Array,
    /// A type code this decoder does not read (e.g. `D`).
    Other(u8),
}

impl FieldType {
    pub fn from_code(code: u8) -> Self {
        match code {
            b'I' => Self::Int,
            b'S' => Self::Short,
            b'J' => Self::Long,
            b'Z' => Self::Boolean,
            b'F' => Self::Float,
            b'B' => Self::Byte,
            b'C' => Self::Char,
            b'L' => Self::Object,
            b'[' => Self::Array,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Int => b'I',
            Self::Short => b'S',
            Self::Long => b'J',
            Self::Boolean => b'Z',
            Self::Float => b'F',
            Self::Byte => b'B',
            Self::Char => b'C',
            Self::Object => b'L',
            Self::Array => b'[',
            Self::Other(c) => c,
        }
    }

    /// Object and array fields carry a declared type name on the wire.
    pub fn is_reference(self) -> bool {
        matches!(self, Self::Object | Self::Array)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDesc {
    pub name: String,
    pub field_type: FieldType,
    /// Last `/`-delimited segment of the declared type, for object/array fields.
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDesc {
    /// Last `.`-delimited segment of the fully-qualified class name.
    pub name: String,
    pub flags: ClassFlags,
    pub fields: Vec<FieldDesc>,
    pub parent: Option<Handle>,
}

// ---------------------------------------------------------------------------
// Arrays, enums, objects
// ---------------------------------------------------------------------------

/// Element layouts of the supported primitive arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayElement {
    /// `[B`
    Byte,
    /// `[I`
    Int,
}

impl ArrayElement {
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name {
            "[B" => Some(Self::Byte),
            "[I" => Some(Self::Int),
            _ => None,
        }
    }

    pub fn width(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Int => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayValue {
    pub class: Handle,
    pub elements: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub class: Handle,
    /// Constant name; empty while the enum shell is being decoded.
    pub constant: String,
}

/// A decoded `TC_OBJECT` instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub class: Handle,
    /// Simple name of the object's own class.
    pub class_name: String,
    fields: Vec<(String, Value)>,
    data: Option<BlockData>,
}

impl Object {
    pub fn new(class: Handle, class_name: impl Into<String>) -> Self {
        Self {
            class,
            class_name: class_name.into(),
            fields: Vec::new(),
            data: None,
        }
    }

    /// Field by name. Fields declared by descendants shadow ancestors'.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Fields in declaration order, oldest ancestor first.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn data(&self) -> Option<&BlockData> {
        self.data.as_ref()
    }

    pub(crate) fn set_field(&mut self, name: &str, value: Value) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub(crate) fn set_data(&mut self, data: BlockData) {
        self.data = Some(data);
    }
}
