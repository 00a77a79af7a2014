// Minimal memcached text-protocol client.
//
// Only `get` is implemented: the cache holds JVM-serialized blobs and this
// crate never writes back. The response is framed by its `VALUE` header, so
// the payload is read by length rather than by scanning for the `END` line.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, trace};
use thiserror::Error;

/// Default memcached port.
pub const DEFAULT_PORT: u16 = 11211;

/// Longest key memcached accepts.
pub const MAX_KEY_LEN: usize = 250;

/// Largest item accepted by default: memcached's upper bound for `-I`.
pub const DEFAULT_MAX_ITEM_SIZE: usize = 1024 * 1024 * 1024;

/// Initial payload buffer; the buffer grows as bytes actually arrive.
const READ_CHUNK: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MemcacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid key {0:?}")]
    InvalidKey(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("item of {len} bytes exceeds the {limit}-byte limit")]
    TooLarge { len: usize, limit: usize },
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Applied to connect, read and write. `None` blocks indefinitely.
    pub timeout: Option<Duration>,
    /// Items whose announced length exceeds this fail with `TooLarge`.
    pub max_item_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            max_item_size: DEFAULT_MAX_ITEM_SIZE,
        }
    }
}

/// One stored item returned by `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub flags: u32,
    pub data: Vec<u8>,
}

/// Blocking client over any byte transport.
pub struct MemcacheClient<S: Read + Write> {
    conn: BufReader<S>,
    max_item_size: usize,
}

impl MemcacheClient<TcpStream> {
    /// Connect to the first reachable address of `addr`.
    pub fn connect<A: ToSocketAddrs>(addr: A, config: ClientConfig) -> Result<Self, MemcacheError> {
        let mut last_err = None;
        for sock in addr.to_socket_addrs()? {
            debug!("memcache: connecting to {sock}");
            let attempt = match config.timeout {
                Some(t) => TcpStream::connect_timeout(&sock, t),
                None => TcpStream::connect(sock),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_read_timeout(config.timeout)?;
                    stream.set_write_timeout(config.timeout)?;
                    return Ok(Self::from_stream_with(stream, config));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address to connect to"))
            .into())
    }
}

impl<S: Read + Write> MemcacheClient<S> {
    pub fn from_stream(stream: S) -> Self {
        Self::from_stream_with(stream, ClientConfig::default())
    }

    /// Wrap `stream`; only `max_item_size` applies, timeouts are the
    /// transport's business.
    pub fn from_stream_with(stream: S, config: ClientConfig) -> Self {
        Self {
            conn: BufReader::new(stream),
            max_item_size: config.max_item_size,
        }
    }

    /// Fetch `key`. Returns `None` on a cache miss.
    pub fn get(&mut self, key: &str) -> Result<Option<Item>, MemcacheError> {
        validate_key(key)?;
        debug!("memcache: sending command: get {key}");
        let stream = self.conn.get_mut();
        stream.write_all(format!("get {key}\r\n").as_bytes())?;
        stream.flush()?;

        let line = self.read_line()?;
        if line == "END" {
            debug!("memcache: miss for {key}");
            return Ok(None);
        }
        let header = parse_value_header(&line)?;
        if header.key != key {
            return Err(MemcacheError::Protocol(format!(
                "response for key {:?}, requested {key:?}",
                header.key
            )));
        }

        if header.len > self.max_item_size {
            return Err(MemcacheError::TooLarge {
                len: header.len,
                limit: self.max_item_size,
            });
        }

        let mut data = Vec::with_capacity(header.len.min(READ_CHUNK));
        (&mut self.conn).take(header.len as u64).read_to_end(&mut data)?;
        if data.len() != header.len {
            return Err(MemcacheError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload ended after {} of {} bytes", data.len(), header.len),
            )));
        }
        let mut crlf = [0u8; 2];
        self.conn.read_exact(&mut crlf)?;
        if &crlf != b"\r\n" {
            return Err(MemcacheError::Protocol("data block not terminated by CRLF".into()));
        }
        trace!("memcache: payload {data:02X?}");

        let trailer = self.read_line()?;
        if trailer != "END" {
            return Err(MemcacheError::Protocol(format!(
                "expected END after value, got {trailer:?}"
            )));
        }
        debug!(
            "memcache: metadata: VALUE {} {} {}",
            header.key, header.flags, header.len
        );
        Ok(Some(Item {
            key: header.key,
            flags: header.flags,
            data,
        }))
    }

    pub fn into_inner(self) -> S {
        self.conn.into_inner()
    }

    /// Read one CRLF-terminated line, mapping server error replies.
    fn read_line(&mut self) -> Result<String, MemcacheError> {
        let mut raw = Vec::new();
        let n = self.conn.read_until(b'\n', &mut raw)?;
        if n == 0 {
            return Err(MemcacheError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        let line = String::from_utf8_lossy(&raw)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        trace!("memcache: received line {line:?}");

        if line == "ERROR" {
            return Err(MemcacheError::Server("ERROR".into()));
        }
        if let Some(msg) = line
            .strip_prefix("CLIENT_ERROR ")
            .or_else(|| line.strip_prefix("SERVER_ERROR "))
        {
            return Err(MemcacheError::Server(msg.to_string()));
        }
        Ok(line)
    }
}

// ---------------------------------------------------------------------------
// Protocol helpers
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
struct ValueHeader {
    key: String,
    flags: u32,
    len: usize,
}

/// Parse `VALUE <key> <flags> <bytes> [<cas unique>]`.
fn parse_value_header(line: &str) -> Result<ValueHeader, MemcacheError> {
    let bad = || MemcacheError::Protocol(format!("unexpected response line {line:?}"));
    let mut parts = line.split(' ');
    if parts.next() != Some("VALUE") {
        return Err(bad());
    }
    let key = parts.next().ok_or_else(bad)?.to_string();
    let flags = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    let len = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    // optional cas unique
    if let Some(cas) = parts.next() {
        cas.parse::<u64>().map_err(|_| bad())?;
    }
    if parts.next().is_some() {
        return Err(bad());
    }
    Ok(ValueHeader { key, flags, len })
}

fn validate_key(key: &str) -> Result<(), MemcacheError> {
    let ok = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control());
    if ok {
        Ok(())
    } else {
        Err(MemcacheError::InvalidKey(key.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
