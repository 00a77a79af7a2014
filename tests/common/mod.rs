#![allow(dead_code)] // each test binary uses a different subset

//! Hand-assembled serialization streams for tests.
//!
//! The builder tracks handle numbering the same way `ObjectOutputStream`
//! assigns it, so tests can write back-references by handle index.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread;

pub const BASE_WIRE_HANDLE: u32 = 0x7E_0000;

pub const FLAGS_SERIALIZABLE: u8 = 0x02;
pub const FLAGS_WRITE_METHOD: u8 = 0x03;
pub const FLAGS_EXTERNALIZABLE: u8 = 0x0C;
pub const FLAGS_ENUM: u8 = 0x12;

pub struct Field<'a> {
    pub code: u8,
    pub name: &'a str,
    pub type_name: Option<&'a str>,
}

pub fn prim(code: u8, name: &str) -> Field<'_> {
    Field {
        code,
        name,
        type_name: None,
    }
}

pub fn obj<'a>(name: &'a str, type_name: &'a str) -> Field<'a> {
    Field {
        code: b'L',
        name,
        type_name: Some(type_name),
    }
}

pub struct StreamBuilder {
    buf: Vec<u8>,
    handles: u32,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self {
            buf: vec![0xAC, 0xED, 0x00, 0x05],
            handles: 0,
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Claim the next handle (for object and array shells written by hand).
    pub fn assign(&mut self) -> u32 {
        let h = self.handles;
        self.handles += 1;
        h
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn byte(&mut self, b: u8) -> &mut Self {
        self.buf.push(b);
        self
    }

    pub fn short(&mut self, v: u16) -> &mut Self {
        self.raw(&v.to_be_bytes())
    }

    pub fn int(&mut self, v: u32) -> &mut Self {
        self.raw(&v.to_be_bytes())
    }

    pub fn long(&mut self, v: u64) -> &mut Self {
        self.raw(&v.to_be_bytes())
    }

    pub fn boolean(&mut self, v: bool) -> &mut Self {
        self.byte(v as u8)
    }

    fn utf(&mut self, s: &str) -> &mut Self {
        self.short(s.len() as u16).raw(s.as_bytes())
    }

    pub fn null(&mut self) -> &mut Self {
        self.byte(0x70)
    }

    pub fn string(&mut self, s: &str) -> u32 {
        self.byte(0x74).utf(s);
        self.assign()
    }

    pub fn reference(&mut self, handle: u32) -> &mut Self {
        self.byte(0x71).int(BASE_WIRE_HANDLE + handle)
    }

    /// Write a class descriptor up to and including its end-of-block marker.
    /// The parent descriptor (or null) must be written next.
    pub fn class_desc(&mut self, name: &str, flags: u8, fields: &[Field<'_>]) -> u32 {
        self.byte(0x72).utf(name).long(0x1122_3344_5566_7788).byte(flags);
        let handle = self.assign();
        self.short(fields.len() as u16);
        for field in fields {
            self.byte(field.code).utf(field.name);
            if let Some(type_name) = field.type_name {
                self.string(type_name);
            }
        }
        self.byte(0x78);
        handle
    }

    pub fn begin_object(&mut self) -> &mut Self {
        self.byte(0x73)
    }

    pub fn begin_array(&mut self) -> &mut Self {
        self.byte(0x75)
    }

    pub fn begin_enum(&mut self) -> &mut Self {
        self.byte(0x7E)
    }

    pub fn block(&mut self, data: &[u8]) -> &mut Self {
        self.byte(0x77).byte(data.len() as u8).raw(data)
    }

    pub fn end_block(&mut self) -> &mut Self {
        self.byte(0x78)
    }

    // -----------------------------------------------------------------------
    // Standard collection class descriptors (root classes, null parent)
    // -----------------------------------------------------------------------

    pub fn hashmap_class(&mut self) -> u32 {
        let h = self.class_desc(
            "java.util.HashMap",
            FLAGS_WRITE_METHOD,
            &[prim(b'F', "loadFactor"), prim(b'I', "threshold")],
        );
        self.null();
        h
    }

    pub fn hashset_class(&mut self) -> u32 {
        let h = self.class_desc("java.util.HashSet", FLAGS_WRITE_METHOD, &[]);
        self.null();
        h
    }

    pub fn arraylist_class(&mut self) -> u32 {
        let h = self.class_desc("java.util.ArrayList", FLAGS_WRITE_METHOD, &[prim(b'I', "size")]);
        self.null();
        h
    }

    /// HashMap field values and block header for `count` entries.
    pub fn hashmap_header(&mut self, count: u32) -> &mut Self {
        self.raw(&[0x3F, 0x40, 0x00, 0x00]).int(12);
        let mut block = 16u32.to_be_bytes().to_vec();
        block.extend_from_slice(&count.to_be_bytes());
        self.block(&block)
    }

    /// HashSet block header for `count` entries.
    pub fn hashset_header(&mut self, count: u32) -> &mut Self {
        let mut block = 16u32.to_be_bytes().to_vec();
        block.extend_from_slice(&[0x3F, 0x40, 0x00, 0x00]);
        block.extend_from_slice(&count.to_be_bytes());
        self.block(&block)
    }

    /// ArrayList `size` field and capacity block for `count` elements.
    pub fn arraylist_header(&mut self, count: u32) -> &mut Self {
        self.int(count);
        self.block(&count.max(10).to_be_bytes())
    }

    /// A complete `HashMap<String, String>`; returns the object handle.
    pub fn string_hashmap(&mut self, entries: &[(&str, &str)]) -> u32 {
        self.begin_object();
        self.hashmap_class();
        let handle = self.assign();
        self.hashmap_header(entries.len() as u32);
        for (k, v) in entries {
            self.string(k);
            self.string(v);
        }
        self.end_block();
        handle
    }
}

// ---------------------------------------------------------------------------
// Fake memcached
// ---------------------------------------------------------------------------

/// Serve `get` requests for a fixed set of items on a loopback port.
///
/// Connections are handled one at a time until the test process exits.
pub fn fake_memcache(items: &[(&str, Vec<u8>)]) -> SocketAddr {
    let items: HashMap<String, Vec<u8>> = items
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for conn in listener.incoming() {
            let Ok(conn) = conn else { break };
            let mut writer = conn.try_clone().unwrap();
            let mut line = String::new();
            let mut reader = BufReader::new(conn);
            while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                let reply = match line.trim_end().strip_prefix("get ") {
                    Some(key) => match items.get(key) {
                        Some(data) => {
                            let mut out = format!("VALUE {key} 0 {}\r\n", data.len()).into_bytes();
                            out.extend_from_slice(data);
                            out.extend_from_slice(b"\r\nEND\r\n");
                            out
                        }
                        None => b"END\r\n".to_vec(),
                    },
                    None => b"ERROR\r\n".to_vec(),
                };
                if writer.write_all(&reply).is_err() {
                    break;
                }
                line.clear();
            }
        }
    });
    addr
}
