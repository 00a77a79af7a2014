//! javaser: Java Object Serialization Stream decoding in Rust.
//!
//! The crate provides:
//! - A decoder for serialization stream version 5 (`stream`)
//! - A minimal memcached `get` client for fetching serialized blobs (`memcache`)
//! - Control Center session extraction and formatting (`report`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use javaser::stream::{decode_stream, Value};
//!
//! // ObjectOutputStream.writeObject("hi")
//! let blob = [0xAC, 0xED, 0x00, 0x05, 0x74, 0x00, 0x02, b'h', b'i'];
//! let stream = decode_stream(&blob).unwrap();
//! assert_eq!(stream.values(), &[Value::String("hi".into())]);
//! ```

pub mod memcache;
pub mod report;
pub mod stream;

#[cfg(feature = "cli")]
pub mod cli;
