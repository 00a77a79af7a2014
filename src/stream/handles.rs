// Handle table: append-only registry of every referenceable value.
//
// Handle N is the Nth registered entry. Entries are registered as shells
// before their children are decoded and then filled in place, so a lookup
// against a slot still under construction sees the partial value.

use std::fmt;

use thiserror::Error;

use super::value::{ArrayValue, ClassDesc, EnumValue, Object};

/// Index of an entry in a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// 0-based table index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    String,
    Array,
    Enum,
    ClassDesc,
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    String(String),
    Array(ArrayValue),
    Enum(EnumValue),
    ClassDesc(ClassDesc),
    Object(Object),
}

impl Entry {
    pub fn kind(&self) -> HandleKind {
        match self {
            Self::String(_) => HandleKind::String,
            Self::Array(_) => HandleKind::Array,
            Self::Enum(_) => HandleKind::Enum,
            Self::ClassDesc(_) => HandleKind::ClassDesc,
            Self::Object(_) => HandleKind::Object,
        }
    }
}

/// Lookup of a handle that was never registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("handle {index} out of range (table holds {len})")]
pub struct OutOfRange {
    pub index: i64,
    pub len: usize,
}

#[derive(Debug, Clone, Default)]
pub struct HandleTable {
    entries: Vec<Entry>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, returning its handle.
    pub fn register(&mut self, entry: Entry) -> Handle {
        let handle = Handle(self.entries.len());
        log::trace!("register {handle} as {:?}", entry.kind());
        self.entries.push(entry);
        handle
    }

    /// Resolve a 0-based index (already translated from the wire base).
    pub fn resolve(&self, index: i64) -> Result<(Handle, &Entry), OutOfRange> {
        let out_of_range = OutOfRange {
            index,
            len: self.entries.len(),
        };
        let i = usize::try_from(index).map_err(|_| out_of_range)?;
        let entry = self.entries.get(i).ok_or(out_of_range)?;
        Ok((Handle(i), entry))
    }

    pub fn entry(&self, handle: Handle) -> Option<&Entry> {
        self.entries.get(handle.0)
    }

    pub(crate) fn entry_mut(&mut self, handle: Handle) -> Option<&mut Entry> {
        self.entries.get_mut(handle.0)
    }

    pub fn class_desc(&self, handle: Handle) -> Option<&ClassDesc> {
        match self.entry(handle)? {
            Entry::ClassDesc(c) => Some(c),
            _ => None,
        }
    }

    pub fn object(&self, handle: Handle) -> Option<&Object> {
        match self.entry(handle)? {
            Entry::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn array(&self, handle: Handle) -> Option<&ArrayValue> {
        match self.entry(handle)? {
            Entry::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn enum_value(&self, handle: Handle) -> Option<&EnumValue> {
        match self.entry(handle)? {
            Entry::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn class_desc_mut(&mut self, handle: Handle) -> Option<&mut ClassDesc> {
        match self.entry_mut(handle)? {
            Entry::ClassDesc(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn object_mut(&mut self, handle: Handle) -> Option<&mut Object> {
        match self.entry_mut(handle)? {
            Entry::Object(o) => Some(o),
            _ => None,
        }
    }

    pub(crate) fn array_mut(&mut self, handle: Handle) -> Option<&mut ArrayValue> {
        match self.entry_mut(handle)? {
            Entry::Array(a) => Some(a),
            _ => None,
        }
    }

    pub(crate) fn enum_mut(&mut self, handle: Handle) -> Option<&mut EnumValue> {
        match self.entry_mut(handle)? {
            Entry::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &Entry)> {
        self.entries.iter().enumerate().map(|(i, e)| (Handle(i), e))
    }
}
