//! Minimal MessagePack reader and writer.
//!
//! Decoding borrows strings and binary payloads straight out of the input
//! buffer, so a memory-mapped snapshot is never copied before the f16
//! decode. All multi-byte fields are big-endian.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::util::{Error, Result};

/// Maximum nesting of arrays/maps accepted by the decoder.
pub const MAX_DEPTH: usize = 64;

/// A decoded MessagePack value borrowing from the input buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    Str(&'a str),
    Bin(&'a [u8]),
    Array(Vec<Value<'a>>),
    Map(Vec<(Value<'a>, Value<'a>)>),
    Ext(i8, &'a [u8]),
}

impl<'a> Value<'a> {
    /// Look up a string key in a map. Returns `None` for non-maps.
    pub fn get(&self, key: &str) -> Option<&Value<'a>> {
        match self {
            Self::Map(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, Value::Str(s) if *s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_bin(&self) -> Option<&'a [u8]> {
        match self {
            Self::Bin(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Self::Str(s) => Some(*s),
            _ => None,
        }
    }

    /// Integer value if it is non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::UInt(v) => Some(v),
            Self::Int(v) if v >= 0 => Some(v as u64),
            _ => None,
        }
    }

    /// Short type name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::UInt(_) => "int",
            Self::F32(_) | Self::F64(_) => "float",
            Self::Str(_) => "str",
            Self::Bin(_) => "bin",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Ext(..) => "ext",
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode the first value in `data`. Trailing bytes are ignored, matching a
/// streaming unpacker that only pulls one object.
pub fn decode(data: &[u8]) -> Result<Value<'_>> {
    Decoder::new(data).read_value()
}

/// Streaming decoder over a byte slice.
pub struct Decoder<'a> {
    cursor: Cursor<&'a [u8]>,
    depth: usize,
}

fn truncated(e: std::io::Error) -> Error {
    Error::format(format!("msgpack data truncated: {}", e))
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(data), depth: 0 }
    }

    /// Byte offset of the next unread value.
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    /// Borrow the next `len` bytes and advance past them.
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::format(format!(
                "msgpack payload of {} bytes at offset {} exceeds buffer",
                len,
                self.position()
            )));
        }
        let start = self.position();
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    fn read_len(&mut self, width: usize) -> Result<usize> {
        let len = match width {
            1 => self.cursor.read_u8().map(u64::from),
            2 => self.cursor.read_u16::<BigEndian>().map(u64::from),
            _ => self.cursor.read_u32::<BigEndian>().map(u64::from),
        }
        .map_err(truncated)?;
        Ok(len as usize)
    }

    fn read_str(&mut self, len: usize) -> Result<Value<'a>> {
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(Value::Str)
            .map_err(|e| Error::format(format!("invalid UTF-8 in msgpack string: {}", e)))
    }

    fn read_ext(&mut self, len: usize) -> Result<Value<'a>> {
        let tag = self.cursor.read_i8().map_err(truncated)?;
        Ok(Value::Ext(tag, self.take(len)?))
    }

    fn read_array(&mut self, len: usize) -> Result<Value<'a>> {
        self.enter()?;
        // Every element takes at least one byte.
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.read_value()?);
        }
        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn read_map(&mut self, len: usize) -> Result<Value<'a>> {
        self.enter()?;
        let mut entries = Vec::with_capacity(len.min(self.remaining() / 2));
        for _ in 0..len {
            let key = self.read_value()?;
            let value = self.read_value()?;
            entries.push((key, value));
        }
        self.depth -= 1;
        Ok(Value::Map(entries))
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::format(format!("msgpack nesting deeper than {}", MAX_DEPTH)));
        }
        Ok(())
    }

    /// Read one complete value.
    pub fn read_value(&mut self) -> Result<Value<'a>> {
        let marker = self.cursor.read_u8().map_err(truncated)?;
        match marker {
            0x00..=0x7f => Ok(Value::UInt(marker as u64)),
            0x80..=0x8f => self.read_map((marker & 0x0f) as usize),
            0x90..=0x9f => self.read_array((marker & 0x0f) as usize),
            0xa0..=0xbf => self.read_str((marker & 0x1f) as usize),
            0xc0 => Ok(Value::Nil),
            0xc2 => Ok(Value::Bool(false)),
            0xc3 => Ok(Value::Bool(true)),
            0xc4 => {
                let len = self.read_len(1)?;
                Ok(Value::Bin(self.take(len)?))
            }
            0xc5 => {
                let len = self.read_len(2)?;
                Ok(Value::Bin(self.take(len)?))
            }
            0xc6 => {
                let len = self.read_len(4)?;
                Ok(Value::Bin(self.take(len)?))
            }
            0xc7 => {
                let len = self.read_len(1)?;
                self.read_ext(len)
            }
            0xc8 => {
                let len = self.read_len(2)?;
                self.read_ext(len)
            }
            0xc9 => {
                let len = self.read_len(4)?;
                self.read_ext(len)
            }
            0xca => self.cursor.read_f32::<BigEndian>().map(Value::F32).map_err(truncated),
            0xcb => self.cursor.read_f64::<BigEndian>().map(Value::F64).map_err(truncated),
            0xcc => self.cursor.read_u8().map(|v| Value::UInt(v as u64)).map_err(truncated),
            0xcd => self.cursor.read_u16::<BigEndian>().map(|v| Value::UInt(v as u64)).map_err(truncated),
            0xce => self.cursor.read_u32::<BigEndian>().map(|v| Value::UInt(v as u64)).map_err(truncated),
            0xcf => self.cursor.read_u64::<BigEndian>().map(Value::UInt).map_err(truncated),
            0xd0 => self.cursor.read_i8().map(|v| Value::Int(v as i64)).map_err(truncated),
            0xd1 => self.cursor.read_i16::<BigEndian>().map(|v| Value::Int(v as i64)).map_err(truncated),
            0xd2 => self.cursor.read_i32::<BigEndian>().map(|v| Value::Int(v as i64)).map_err(truncated),
            0xd3 => self.cursor.read_i64::<BigEndian>().map(Value::Int).map_err(truncated),
            0xd4 => self.read_ext(1),
            0xd5 => self.read_ext(2),
            0xd6 => self.read_ext(4),
            0xd7 => self.read_ext(8),
            0xd8 => self.read_ext(16),
            0xd9 => {
                let len = self.read_len(1)?;
                self.read_str(len)
            }
            0xda => {
                let len = self.read_len(2)?;
                self.read_str(len)
            }
            0xdb => {
                let len = self.read_len(4)?;
                self.read_str(len)
            }
            0xdc => {
                let len = self.read_len(2)?;
                self.read_array(len)
            }
            0xdd => {
                let len = self.read_len(4)?;
                self.read_array(len)
            }
            0xde => {
                let len = self.read_len(2)?;
                self.read_map(len)
            }
            0xdf => {
                let len = self.read_len(4)?;
                self.read_map(len)
            }
            0xe0..=0xff => Ok(Value::Int(marker as i8 as i64)),
            0xc1 => Err(Error::format(format!(
                "reserved msgpack marker 0xc1 at offset {}",
                self.position() - 1
            ))),
        }
    }

    /// Read every value until the buffer is exhausted.
    pub fn read_all(&mut self) -> Result<Vec<Value<'a>>> {
        let mut values = Vec::new();
        while self.remaining() > 0 {
            values.push(self.read_value()?);
        }
        Ok(values)
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a value tree, always choosing the smallest representation.
pub fn encode(value: &Value<'_>) -> Vec<u8> {
    let mut buf = Vec::new();
    write_value(&mut buf, value);
    buf
}

fn write_len(buf: &mut Vec<u8>, len: usize, markers: [u8; 3]) {
    // Writes into a Vec cannot fail.
    if len <= u8::MAX as usize && markers[0] != 0 {
        buf.push(markers[0]);
        buf.push(len as u8);
    } else if len <= u16::MAX as usize {
        buf.push(markers[1]);
        let _ = buf.write_u16::<BigEndian>(len as u16);
    } else {
        buf.push(markers[2]);
        let _ = buf.write_u32::<BigEndian>(len as u32);
    }
}

/// Append the encoding of `value` to `buf`.
pub fn write_value(buf: &mut Vec<u8>, value: &Value<'_>) {
    match value {
        Value::Nil => buf.push(0xc0),
        Value::Bool(b) => buf.push(if *b { 0xc3 } else { 0xc2 }),
        Value::UInt(v) => write_uint(buf, *v),
        Value::Int(v) if *v >= 0 => write_uint(buf, *v as u64),
        Value::Int(v) => write_int(buf, *v),
        Value::F32(v) => {
            buf.push(0xca);
            let _ = buf.write_f32::<BigEndian>(*v);
        }
        Value::F64(v) => {
            buf.push(0xcb);
            let _ = buf.write_f64::<BigEndian>(*v);
        }
        Value::Str(s) => {
            if s.len() < 32 {
                buf.push(0xa0 | s.len() as u8);
            } else {
                write_len(buf, s.len(), [0xd9, 0xda, 0xdb]);
            }
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Bin(b) => {
            write_len(buf, b.len(), [0xc4, 0xc5, 0xc6]);
            buf.extend_from_slice(b);
        }
        Value::Array(items) => {
            if items.len() < 16 {
                buf.push(0x90 | items.len() as u8);
            } else {
                write_len(buf, items.len(), [0, 0xdc, 0xdd]);
            }
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Map(entries) => {
            if entries.len() < 16 {
                buf.push(0x80 | entries.len() as u8);
            } else {
                write_len(buf, entries.len(), [0, 0xde, 0xdf]);
            }
            for (k, v) in entries {
                write_value(buf, k);
                write_value(buf, v);
            }
        }
        Value::Ext(tag, data) => {
            match data.len() {
                1 => buf.push(0xd4),
                2 => buf.push(0xd5),
                4 => buf.push(0xd6),
                8 => buf.push(0xd7),
                16 => buf.push(0xd8),
                len => write_len(buf, len, [0xc7, 0xc8, 0xc9]),
            }
            buf.push(*tag as u8);
            buf.extend_from_slice(data);
        }
    }
}

fn write_uint(buf: &mut Vec<u8>, v: u64) {
    if v < 0x80 {
        buf.push(v as u8);
    } else if v <= u8::MAX as u64 {
        buf.push(0xcc);
        buf.push(v as u8);
    } else if v <= u16::MAX as u64 {
        buf.push(0xcd);
        let _ = buf.write_u16::<BigEndian>(v as u16);
    } else if v <= u32::MAX as u64 {
        buf.push(0xce);
        let _ = buf.write_u32::<BigEndian>(v as u32);
    } else {
        buf.push(0xcf);
        let _ = buf.write_u64::<BigEndian>(v);
    }
}

fn write_int(buf: &mut Vec<u8>, v: i64) {
    if v >= -32 {
        buf.push(v as i8 as u8);
    } else if v >= i8::MIN as i64 {
        buf.push(0xd0);
        let _ = buf.write_i8(v as i8);
    } else if v >= i16::MIN as i64 {
        buf.push(0xd1);
        let _ = buf.write_i16::<BigEndian>(v as i16);
    } else if v >= i32::MIN as i64 {
        buf.push(0xd2);
        let _ = buf.write_i32::<BigEndian>(v as i32);
    } else {
        buf.push(0xd3);
        let _ = buf.write_i64::<BigEndian>(v);
    }
}
