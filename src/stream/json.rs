// JSON rendering of decoded values.
//
// Each handle is expanded once per render, at its first occurrence in
// document order. Every later occurrence, shared or cyclic, is emitted as
// `{"$ref": n}` with `n` the handle index, so output size stays linear in the
// number of handles.
//
// Objects carry two synthetic keys, `_class` and `data`. A declared field
// with one of those names is emitted as `_field.<name>` instead.

use std::collections::HashSet;

use serde_json::{Map, Value as Json, json};

use super::decoder::Stream;
use super::handles::{Entry, Handle};
use super::value::{BlockData, MapKey, Value, float_hex};

impl Stream {
    /// Render one decoded value.
    pub fn to_json(&self, value: &Value) -> Json {
        Renderer::new(self).value(value)
    }

    /// Render every top-level value as a JSON array. A top-level value that
    /// repeats an earlier one renders as `{"$ref": n}`.
    pub fn to_json_all(&self) -> Json {
        let mut renderer = Renderer::new(self);
        Json::Array(self.values().iter().map(|v| renderer.value(v)).collect())
    }
}

const SYNTHETIC_KEYS: [&str; 2] = ["_class", "data"];

struct Renderer<'s> {
    stream: &'s Stream,
    expanded: HashSet<Handle>,
}

impl<'s> Renderer<'s> {
    fn new(stream: &'s Stream) -> Self {
        Self {
            stream,
            expanded: HashSet::new(),
        }
    }

    fn value(&mut self, value: &Value) -> Json {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => json!(n),
            Value::Byte(b) => json!(b),
            Value::Float(f) => Json::String(float_hex(f)),
            Value::Bytes(bytes) => match <[u8; 4]>::try_from(bytes.as_slice()) {
                Ok(word) => json!(i32::from_be_bytes(word)),
                Err(_) => Json::String(bytes.iter().map(|b| format!("{b:02X}")).collect()),
            },
            Value::String(s) => Json::String(s.clone()),
            Value::Array(h) | Value::Enum(h) | Value::Class(h) | Value::Object(h) => {
                self.handle(*h)
            }
        }
    }

    fn handle(&mut self, handle: Handle) -> Json {
        let stream = self.stream;
        let Some(entry) = stream.handles().entry(handle) else {
            return Json::Null;
        };
        if !self.expanded.insert(handle) {
            return json!({ "$ref": handle.index() });
        }
        match entry {
            Entry::String(s) => Json::String(s.clone()),
            Entry::Array(array) => {
                Json::Array(array.elements.iter().map(|e| self.value(e)).collect())
            }
            Entry::Enum(e) => json!({
                "_class": self.class_name(e.class),
                "_name": e.constant,
            }),
            Entry::ClassDesc(c) => json!({ "_classdesc": c.name }),
            Entry::Object(object) => {
                let mut map = Map::new();
                map.insert("_class".into(), Json::String(object.class_name.clone()));
                for (name, value) in object.fields() {
                    let rendered = self.value(value);
                    let key = if SYNTHETIC_KEYS.contains(&name) {
                        format!("_field.{name}")
                    } else {
                        name.to_string()
                    };
                    map.insert(key, rendered);
                }
                if let Some(data) = object.data() {
                    let rendered = self.block(data);
                    map.insert("data".into(), rendered);
                }
                Json::Object(map)
            }
        }
    }

    fn block(&mut self, data: &BlockData) -> Json {
        match data {
            BlockData::Map(entries) => {
                let keys: Vec<String> = entries.iter().map(|(k, _)| key_string(k)).collect();
                let distinct: HashSet<&str> = keys.iter().map(String::as_str).collect();
                if distinct.len() < keys.len() {
                    // e.g. Int(1) and String("1"): keep both as pairs
                    return Json::Array(
                        entries
                            .iter()
                            .map(|(k, v)| {
                                let key = self.value(&Value::from(k.clone()));
                                Json::Array(vec![key, self.value(v)])
                            })
                            .collect(),
                    );
                }
                let mut map = Map::new();
                for (key, (_, value)) in keys.into_iter().zip(entries) {
                    let rendered = self.value(value);
                    map.insert(key, rendered);
                }
                Json::Object(map)
            }
            BlockData::Pairs(pairs) => Json::Array(
                pairs
                    .iter()
                    .map(|(k, v)| {
                        let key = self.value(k);
                        Json::Array(vec![key, self.value(v)])
                    })
                    .collect(),
            ),
            BlockData::Seq(items) => Json::Array(items.iter().map(|v| self.value(v)).collect()),
        }
    }

    fn class_name(&self, class: Handle) -> String {
        self.stream
            .class(class)
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }
}

fn key_string(key: &MapKey) -> String {
    match key {
        MapKey::Null => "null".to_string(),
        MapKey::Bool(b) => b.to_string(),
        MapKey::Int(n) => n.to_string(),
        MapKey::Byte(b) => b.to_string(),
        MapKey::Float(f) => float_hex(f),
        MapKey::String(s) => s.clone(),
    }
}
