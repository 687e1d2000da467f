// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fast codec restricted to the [`Value`] model.
//!
//! ## Format
//!
//! A version byte followed by one tagged value. Integers are little-endian,
//! lengths and counts are `u32`.
//!
//! | Tag | Value                                    |
//! |-----|------------------------------------------|
//! | `N` | null                                     |
//! | `T` | true                                     |
//! | `F` | false                                    |
//! | `i` | `i64`                                    |
//! | `g` | `f64` bits                               |
//! | `u` | length + UTF-8 bytes                     |
//! | `s` | length + raw bytes                       |
//! | `[` | count + values                           |
//! | `{` | count + (length + UTF-8 key, value)      |

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use snafu::{OptionExt, ResultExt, ensure};

use crate::{
    Codec, FlatRecord, Result, Value,
    codec::{
        CodecError, InvalidUtf8Snafu, NotAMappingSnafu, TooDeepSnafu, TooLongSnafu,
        TrailingBytesSnafu, UnexpectedEofSnafu, UnknownTagSnafu, UnsupportedVersionSnafu,
    },
    error::{DeserializationSnafu, SerializationSnafu},
};

const FORMAT_VERSION: u8 = 1;

/// Maximum container nesting accepted in either direction.
pub const MAX_DEPTH: usize = 64;

const TAG_NULL: u8 = b'N';
const TAG_TRUE: u8 = b'T';
const TAG_FALSE: u8 = b'F';
const TAG_INT: u8 = b'i';
const TAG_FLOAT: u8 = b'g';
const TAG_STR: u8 = b'u';
const TAG_BYTES: u8 = b's';
const TAG_LIST: u8 = b'[';
const TAG_MAP: u8 = b'{';

type CodecResult<T> = std::result::Result<T, CodecError>;

/// Tagged binary codec for [`Value`] and [`FlatRecord`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveCodec;

impl PrimitiveCodec {
    fn encode_to(value: &Value) -> CodecResult<Bytes> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(FORMAT_VERSION);
        encode_value(&mut buf, value, 0)?;
        Ok(buf.freeze())
    }

    fn decode_from(mut data: &[u8]) -> CodecResult<Value> {
        need(data, 1)?;
        let version = data.get_u8();
        ensure!(version == FORMAT_VERSION, UnsupportedVersionSnafu { version });
        let value = decode_value(&mut data, 0)?;
        ensure!(
            data.is_empty(),
            TrailingBytesSnafu {
                remaining: data.len(),
            }
        );
        Ok(value)
    }
}

impl Codec<Value> for PrimitiveCodec {
    fn encode(&self, value: &Value) -> Result<Bytes> {
        Self::encode_to(value).boxed().context(SerializationSnafu)
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        Self::decode_from(data).boxed().context(DeserializationSnafu)
    }
}

impl Codec<FlatRecord> for PrimitiveCodec {
    fn encode(&self, record: &FlatRecord) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(FORMAT_VERSION);
        encode_map(&mut buf, record, 0)
            .boxed()
            .context(SerializationSnafu)?;
        Ok(buf.freeze())
    }

    fn decode(&self, data: &[u8]) -> Result<FlatRecord> {
        match Self::decode_from(data) {
            Ok(Value::Map(record)) => Ok(record),
            Ok(other) => NotAMappingSnafu { found: other.kind() }
                .fail()
                .boxed()
                .context(DeserializationSnafu),
            Err(e) => Err(e).boxed().context(DeserializationSnafu),
        }
    }
}

fn put_len(buf: &mut BytesMut, len: usize) -> CodecResult<()> {
    let len = u32::try_from(len).ok().context(TooLongSnafu { len })?;
    buf.put_u32_le(len);
    Ok(())
}

fn put_str(buf: &mut BytesMut, s: &str) -> CodecResult<()> {
    put_len(buf, s.len())?;
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn encode_map(buf: &mut BytesMut, map: &BTreeMap<String, Value>, depth: usize) -> CodecResult<()> {
    ensure!(depth < MAX_DEPTH, TooDeepSnafu { max: MAX_DEPTH });
    buf.put_u8(TAG_MAP);
    put_len(buf, map.len())?;
    for (key, value) in map {
        put_str(buf, key)?;
        encode_value(buf, value, depth + 1)?;
    }
    Ok(())
}

fn encode_value(buf: &mut BytesMut, value: &Value, depth: usize) -> CodecResult<()> {
    match value {
        Value::Null => buf.put_u8(TAG_NULL),
        Value::Bool(true) => buf.put_u8(TAG_TRUE),
        Value::Bool(false) => buf.put_u8(TAG_FALSE),
        Value::Int(i) => {
            buf.put_u8(TAG_INT);
            buf.put_i64_le(*i);
        }
        Value::Float(f) => {
            buf.put_u8(TAG_FLOAT);
            buf.put_f64_le(*f);
        }
        Value::Str(s) => {
            buf.put_u8(TAG_STR);
            put_str(buf, s)?;
        }
        Value::Bytes(b) => {
            buf.put_u8(TAG_BYTES);
            put_len(buf, b.len())?;
            buf.put_slice(b);
        }
        Value::List(items) => {
            ensure!(depth < MAX_DEPTH, TooDeepSnafu { max: MAX_DEPTH });
            buf.put_u8(TAG_LIST);
            put_len(buf, items.len())?;
            for item in items {
                encode_value(buf, item, depth + 1)?;
            }
        }
        Value::Map(map) => encode_map(buf, map, depth)?,
    }
    Ok(())
}

fn need(data: &[u8], n: usize) -> CodecResult<()> {
    ensure!(
        data.len() >= n,
        UnexpectedEofSnafu {
            needed: n - data.len(),
        }
    );
    Ok(())
}

fn get_len(data: &mut &[u8]) -> CodecResult<usize> {
    need(data, 4)?;
    Ok(data.get_u32_le() as usize)
}

fn get_raw(data: &mut &[u8]) -> CodecResult<Vec<u8>> {
    let len = get_len(data)?;
    need(data, len)?;
    let raw = data[..len].to_vec();
    data.advance(len);
    Ok(raw)
}

fn get_string(data: &mut &[u8]) -> CodecResult<String> {
    String::from_utf8(get_raw(data)?).context(InvalidUtf8Snafu)
}

fn decode_value(data: &mut &[u8], depth: usize) -> CodecResult<Value> {
    need(data, 1)?;
    let tag = data.get_u8();
    let value = match tag {
        TAG_NULL => Value::Null,
        TAG_TRUE => Value::Bool(true),
        TAG_FALSE => Value::Bool(false),
        TAG_INT => {
            need(data, 8)?;
            Value::Int(data.get_i64_le())
        }
        TAG_FLOAT => {
            need(data, 8)?;
            Value::Float(data.get_f64_le())
        }
        TAG_STR => Value::Str(get_string(data)?),
        TAG_BYTES => Value::Bytes(get_raw(data)?),
        TAG_LIST => {
            ensure!(depth < MAX_DEPTH, TooDeepSnafu { max: MAX_DEPTH });
            let count = get_len(data)?;
            // Every element takes at least one byte; don't trust the count further.
            let mut items = Vec::with_capacity(count.min(data.len()));
            for _ in 0..count {
                items.push(decode_value(data, depth + 1)?);
            }
            Value::List(items)
        }
        TAG_MAP => {
            ensure!(depth < MAX_DEPTH, TooDeepSnafu { max: MAX_DEPTH });
            let count = get_len(data)?;
            let mut map = BTreeMap::new();
            for _ in 0..count {
                let key = get_string(data)?;
                let value = decode_value(data, depth + 1)?;
                map.insert(key, value);
            }
            Value::Map(map)
        }
        tag => return UnknownTagSnafu { tag }.fail(),
    };
    Ok(value)
}
