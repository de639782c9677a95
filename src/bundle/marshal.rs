//! Script container codec
//!
//! Script containers are Ruby Marshal (format 4.8) streams holding one array
//! of `[index, name, payload]` triples. Only the subset of Marshal that such
//! containers can contain is understood:
//!
//! | byte | value |
//! |------|-------|
//! | `0` `T` `F` | nil, true, false |
//! | `i` | Fixnum (packed long) |
//! | `l` | Bignum |
//! | `f` | Float |
//! | `"` | String (raw bytes) |
//! | `I` | object with instance variables (string encodings) |
//! | `:` `;` | Symbol, symbol link |
//! | `@` | object link |
//! | `[` | Array |
//! | `{` `}` | Hash, hash with default |
//!
//! Anything else is rejected with [`MarshalError::UnsupportedType`].

use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::debug;

use super::ContainerReader;

/// Marshal major version.
const MAJOR: u8 = 4;
/// Marshal minor version.
const MINOR: u8 = 8;
/// Deepest nesting accepted before giving up.
const MAX_DEPTH: usize = 256;
/// Largest integer Marshal stores as a Fixnum (31-bit signed).
const FIXNUM_MAX: i64 = (1 << 30) - 1;
const FIXNUM_MIN: i64 = -(1 << 30);
/// Most values one document may expand to, object links included.
const MAX_VALUES: usize = 1 << 20;

/// Marshal errors
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("I/O error reading container: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected end of container data at offset {0}")]
    UnexpectedEof(usize),

    #[error("incompatible marshal format {major}.{minor} (expected 4.8)")]
    Version { major: u8, minor: u8 },

    #[error("unsupported marshal type byte 0x{byte:02x} at offset {offset}")]
    UnsupportedType { byte: u8, offset: usize },

    #[error("bad symbol link {0}")]
    BadSymbolLink(i64),

    #[error("bad object link {0}")]
    BadObjectLink(i64),

    #[error("negative length {0}")]
    NegativeLength(i64),

    #[error("invalid float literal {0:?}")]
    BadFloat(String),

    #[error("nesting deeper than 256 levels")]
    TooDeep,

    #[error("object links expand beyond 1048576 values")]
    TooLarge,

    #[error("container is not an array (found {0})")]
    NotAnArray(&'static str),

    #[error("entry {position} is malformed: {reason}")]
    BadEntry { position: usize, reason: String },
}

/// Marshal result
pub type MarshalResult<T> = Result<T, MarshalError>;

/// A decoded Marshal value.
#[derive(Debug, Clone, PartialEq)]
pub enum MarshalValue {
    Nil,
    Bool(bool),
    Int(i64),
    /// Bignum too wide for `i64`; magnitude is little-endian.
    BigInt { negative: bool, magnitude: Vec<u8> },
    Float(f64),
    Str(Vec<u8>),
    Symbol(String),
    Array(Vec<MarshalValue>),
    Hash(Vec<(MarshalValue, MarshalValue)>),
}

impl MarshalValue {
    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            MarshalValue::Nil => "nil",
            MarshalValue::Bool(_) => "boolean",
            MarshalValue::Int(_) | MarshalValue::BigInt { .. } => "integer",
            MarshalValue::Float(_) => "float",
            MarshalValue::Str(_) => "string",
            MarshalValue::Symbol(_) => "symbol",
            MarshalValue::Array(_) => "array",
            MarshalValue::Hash(_) => "hash",
        }
    }
}

/// One undecoded container entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Ordinal field as stored (usually a random id, not the position).
    pub index: i64,
    /// Name as stored; may be empty.
    pub name: String,
    /// Compressed script source.
    pub payload: Vec<u8>,
}

impl RawEntry {
    pub fn new(
        index: i64,
        name: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            payload,
        }
    }
}

/// Decode one Marshal value from `data`.
pub fn load(data: &[u8]) -> MarshalResult<MarshalValue> {
    Decoder::new(data).read_document()
}

/// Decode a script container from `data`.
pub fn load_entries(data: &[u8]) -> MarshalResult<Vec<RawEntry>> {
    let value = load(data)?;
    entries_from_value(value)
}

/// Interpret a decoded value as a list of container entries.
pub fn entries_from_value(value: MarshalValue) -> MarshalResult<Vec<RawEntry>> {
    let items = match value {
        MarshalValue::Array(items) => items,
        other => return Err(MarshalError::NotAnArray(other.type_name())),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| entry_from_value(position, item))
        .collect()
}

fn entry_from_value(
    position: usize,
    value: MarshalValue,
) -> MarshalResult<RawEntry> {
    let bad = |reason: String| MarshalError::BadEntry { position, reason };

    let fields = match value {
        MarshalValue::Array(fields) => fields,
        other => return Err(bad(format!("expected array, found {}", other.type_name()))),
    };
    if fields.len() != 3 {
        return Err(bad(format!("expected 3 fields, found {}", fields.len())));
    }

    let mut fields = fields.into_iter();
    let (index, name, payload) = match (fields.next(), fields.next(), fields.next()) {
        (Some(index), Some(name), Some(payload)) => (index, name, payload),
        _ => return Err(bad("missing fields".to_string())),
    };

    let index = match index {
        MarshalValue::Int(n) => n,
        MarshalValue::BigInt { .. } => return Err(bad("index does not fit in 64 bits".to_string())),
        other => return Err(bad(format!("index is {}, not an integer", other.type_name()))),
    };
    let name = match name {
        MarshalValue::Str(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        other => return Err(bad(format!("name is {}, not a string", other.type_name()))),
    };
    let payload = match payload {
        MarshalValue::Str(bytes) => bytes,
        other => return Err(bad(format!("payload is {}, not a string", other.type_name()))),
    };

    Ok(RawEntry {
        index,
        name,
        payload,
    })
}

/// Streaming decoder over an in-memory buffer.
struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    symbols: Vec<String>,
    /// Object table with the number of values each entry expands to;
    /// `None` while an array or hash is still being read.
    objects: Vec<Option<(MarshalValue, usize)>>,
    depth: usize,
    /// Values produced so far, counting every copy made through a link.
    built: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            symbols: Vec::new(),
            objects: Vec::new(),
            depth: 0,
            built: 0,
        }
    }

    fn read_document(&mut self) -> MarshalResult<MarshalValue> {
        let major = self.read_byte()?;
        let minor = self.read_byte()?;
        if major != MAJOR || minor > MINOR {
            return Err(MarshalError::Version { major, minor });
        }
        let value = self.read_value()?;
        debug!(
            bytes = self.pos,
            symbols = self.symbols.len(),
            objects = self.objects.len(),
            "marshal document decoded"
        );
        Ok(value)
    }

    fn read_byte(&mut self) -> MarshalResult<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(MarshalError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(
        &mut self,
        len: usize,
    ) -> MarshalResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(MarshalError::UnexpectedEof(self.data.len()))?;
        let data = self.data;
        let bytes = &data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Packed long: small values inline, otherwise a signed byte count
    /// followed by little-endian bytes.
    fn read_long(&mut self) -> MarshalResult<i64> {
        let c = self.read_byte()? as i8;
        match c {
            0 => Ok(0),
            5..=127 => Ok(i64::from(c) - 5),
            -128..=-5 => Ok(i64::from(c) + 5),
            1..=4 => {
                let mut x: i64 = 0;
                for i in 0..c as u32 {
                    x |= i64::from(self.read_byte()?) << (8 * i);
                }
                Ok(x)
            }
            _ => {
                let mut x: i64 = -1;
                for i in 0..(-c) as u32 {
                    x &= !(0xff << (8 * i));
                    x |= i64::from(self.read_byte()?) << (8 * i);
                }
                Ok(x)
            }
        }
    }

    fn read_len(&mut self) -> MarshalResult<usize> {
        let len = self.read_long()?;
        usize::try_from(len).map_err(|_| MarshalError::NegativeLength(len))
    }

    fn read_string_bytes(&mut self) -> MarshalResult<&'a [u8]> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    fn remember(
        &mut self,
        value: &MarshalValue,
    ) {
        self.objects.push(Some((value.clone(), 1)));
    }

    fn grow(
        &mut self,
        count: usize,
    ) -> MarshalResult<()> {
        self.built = self.built.saturating_add(count);
        if self.built > MAX_VALUES {
            return Err(MarshalError::TooLarge);
        }
        Ok(())
    }

    fn read_symbol_body(&mut self) -> MarshalResult<String> {
        let name = String::from_utf8_lossy(self.read_string_bytes()?).into_owned();
        self.symbols.push(name.clone());
        Ok(name)
    }

    fn read_symbol(&mut self) -> MarshalResult<String> {
        let offset = self.pos;
        match self.read_byte()? {
            b':' => self.read_symbol_body(),
            b';' => self.read_symbol_link(),
            byte => Err(MarshalError::UnsupportedType { byte, offset }),
        }
    }

    fn read_symbol_link(&mut self) -> MarshalResult<String> {
        let link = self.read_long()?;
        usize::try_from(link)
            .ok()
            .and_then(|i| self.symbols.get(i))
            .cloned()
            .ok_or(MarshalError::BadSymbolLink(link))
    }

    fn read_value(&mut self) -> MarshalResult<MarshalValue> {
        if self.depth >= MAX_DEPTH {
            return Err(MarshalError::TooDeep);
        }
        self.depth += 1;
        let value = self.read_value_inner();
        self.depth -= 1;
        value
    }

    fn read_value_inner(&mut self) -> MarshalResult<MarshalValue> {
        let offset = self.pos;
        let byte = self.read_byte()?;
        if byte != b'@' {
            self.grow(1)?;
        }
        match byte {
            b'0' => Ok(MarshalValue::Nil),
            b'T' => Ok(MarshalValue::Bool(true)),
            b'F' => Ok(MarshalValue::Bool(false)),
            b'i' => Ok(MarshalValue::Int(self.read_long()?)),
            b'l' => {
                let value = self.read_bignum()?;
                self.remember(&value);
                Ok(value)
            }
            b'f' => {
                let value = self.read_float()?;
                self.remember(&value);
                Ok(value)
            }
            b'"' => {
                let value = MarshalValue::Str(self.read_string_bytes()?.to_vec());
                self.remember(&value);
                Ok(value)
            }
            b':' => Ok(MarshalValue::Symbol(self.read_symbol_body()?)),
            b';' => Ok(MarshalValue::Symbol(self.read_symbol_link()?)),
            b'@' => {
                let link = self.read_long()?;
                let size = self.linked(link)?.1;
                self.grow(size)?;
                Ok(self.linked(link)?.0.clone())
            }
            b'I' => {
                let value = self.read_value()?;
                let count = self.read_len()?;
                for _ in 0..count {
                    // Encoding ivars (`E`, `encoding`); the bytes are kept as-is.
                    self.read_symbol()?;
                    self.read_value()?;
                }
                Ok(value)
            }
            b'[' => {
                let len = self.read_len()?;
                let slot = self.reserve();
                let start = self.built;
                let mut items = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
                let value = MarshalValue::Array(items);
                self.objects[slot] = Some((value.clone(), self.built - start + 1));
                Ok(value)
            }
            b'{' | b'}' => {
                let len = self.read_len()?;
                let slot = self.reserve();
                let start = self.built;
                let mut pairs = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    let key = self.read_value()?;
                    let value = self.read_value()?;
                    pairs.push((key, value));
                }
                if byte == b'}' {
                    // Default value; not representable, read and dropped.
                    self.read_value()?;
                }
                let value = MarshalValue::Hash(pairs);
                self.objects[slot] = Some((value.clone(), self.built - start + 1));
                Ok(value)
            }
            byte => Err(MarshalError::UnsupportedType { byte, offset }),
        }
    }

    /// Resolve an object link to a finished value and its expanded size.
    fn linked(
        &self,
        link: i64,
    ) -> MarshalResult<&(MarshalValue, usize)> {
        usize::try_from(link)
            .ok()
            .and_then(|i| self.objects.get(i))
            .and_then(|slot| slot.as_ref())
            .ok_or(MarshalError::BadObjectLink(link))
    }

    fn reserve(&mut self) -> usize {
        self.objects.push(None);
        self.objects.len() - 1
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_bignum(&mut self) -> MarshalResult<MarshalValue> {
        let negative = self.read_byte()? == b'-';
        let shorts = self.read_len()?;
        let len = shorts
            .checked_mul(2)
            .ok_or(MarshalError::UnexpectedEof(self.data.len()))?;
        let mut magnitude = self.read_bytes(len)?.to_vec();
        while magnitude.last() == Some(&0) {
            magnitude.pop();
        }

        if magnitude.len() <= 8 {
            let mut raw = [0u8; 8];
            raw[..magnitude.len()].copy_from_slice(&magnitude);
            let unsigned = u64::from_le_bytes(raw);
            match i64::try_from(unsigned) {
                Ok(n) => return Ok(MarshalValue::Int(if negative { -n } else { n })),
                Err(_) if negative && unsigned == i64::MIN.unsigned_abs() => {
                    return Ok(MarshalValue::Int(i64::MIN))
                }
                Err(_) => {}
            }
        }
        Ok(MarshalValue::BigInt {
            negative,
            magnitude,
        })
    }

    fn read_float(&mut self) -> MarshalResult<MarshalValue> {
        let bytes = self.read_string_bytes()?;
        // Old writers append mantissa bytes after a NUL.
        let text_end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        let text = String::from_utf8_lossy(&bytes[..text_end]).into_owned();
        text.parse::<f64>()
            .map(MarshalValue::Float)
            .map_err(|_| MarshalError::BadFloat(text))
    }
}

/// Encoder for script containers.
///
/// Names are written as UTF-8 tagged strings, payloads as raw byte strings,
/// which is what the editor itself produces.
#[derive(Debug)]
pub struct MarshalWriter {
    buf: Vec<u8>,
    symbols: Vec<String>,
}

impl MarshalWriter {
    /// Create a writer with the version header already emitted.
    pub fn new() -> Self {
        Self {
            buf: vec![MAJOR, MINOR],
            symbols: Vec::new(),
        }
    }

    /// Encode a whole container.
    pub fn write_entries(
        mut self,
        entries: &[RawEntry],
    ) -> Vec<u8> {
        self.buf.push(b'[');
        self.write_long(entries.len() as i64);
        for entry in entries {
            self.buf.push(b'[');
            self.write_long(3);
            self.write_integer(entry.index);
            self.write_utf8_string(&entry.name);
            self.write_raw_string(&entry.payload);
        }
        self.buf
    }

    fn write_long(
        &mut self,
        x: i64,
    ) {
        if x == 0 {
            self.buf.push(0);
        } else if 0 < x && x < 123 {
            self.buf.push((x + 5) as u8);
        } else if -124 < x && x < 0 {
            self.buf.push(((x - 5) & 0xff) as u8);
        } else {
            let mut bytes = Vec::with_capacity(4);
            let mut rest = x;
            loop {
                bytes.push((rest & 0xff) as u8);
                rest >>= 8;
                if rest == 0 {
                    self.buf.push(bytes.len() as u8);
                    break;
                }
                if rest == -1 {
                    self.buf.push((-(bytes.len() as i8)) as u8);
                    break;
                }
            }
            self.buf.extend_from_slice(&bytes);
        }
    }

    fn write_integer(
        &mut self,
        n: i64,
    ) {
        if (FIXNUM_MIN..=FIXNUM_MAX).contains(&n) {
            self.buf.push(b'i');
            self.write_long(n);
            return;
        }

        self.buf.push(b'l');
        self.buf.push(if n < 0 { b'-' } else { b'+' });
        let mut magnitude = n.unsigned_abs().to_le_bytes().to_vec();
        while magnitude.last() == Some(&0) {
            magnitude.pop();
        }
        if magnitude.len() % 2 == 1 {
            magnitude.push(0);
        }
        self.write_long((magnitude.len() / 2) as i64);
        self.buf.extend_from_slice(&magnitude);
    }

    fn write_raw_string(
        &mut self,
        bytes: &[u8],
    ) {
        self.buf.push(b'"');
        self.write_long(bytes.len() as i64);
        self.buf.extend_from_slice(bytes);
    }

    fn write_utf8_string(
        &mut self,
        text: &str,
    ) {
        self.buf.push(b'I');
        self.write_raw_string(text.as_bytes());
        self.write_long(1);
        self.write_symbol("E");
        self.buf.push(b'T');
    }

    fn write_symbol(
        &mut self,
        name: &str,
    ) {
        if let Some(link) = self.symbols.iter().position(|s| s == name) {
            self.buf.push(b';');
            self.write_long(link as i64);
        } else {
            self.buf.push(b':');
            self.write_long(name.len() as i64);
            self.buf.extend_from_slice(name.as_bytes());
            self.symbols.push(name.to_string());
        }
    }
}

impl Default for MarshalWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode entries as a script container.
pub fn dump_entries(entries: &[RawEntry]) -> Vec<u8> {
    MarshalWriter::new().write_entries(entries)
}

/// Write entries as a script container to `writer`.
pub fn write_entries<W: Write>(
    writer: &mut W,
    entries: &[RawEntry],
) -> io::Result<()> {
    writer.write_all(&dump_entries(entries))
}

/// The default [`ContainerReader`]: Ruby Marshal 4.8.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarshalReader;

impl ContainerReader for MarshalReader {
    fn read_entries(
        &self,
        reader: &mut dyn Read,
    ) -> MarshalResult<Vec<RawEntry>> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        load_entries(&data)
    }
}
