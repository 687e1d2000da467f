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

//! Codecs turn typed values into the bytes a [`BackingStore`] holds.
//!
//! [`BackingStore`]: crate::BackingStore

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use snafu::{ResultExt, Snafu};

use crate::{
    Result,
    error::{DeserializationSnafu, SerializationSnafu},
};

/// Serialize/deserialize pair between `T` and bytes.
///
/// `decode` must be the exact left inverse of `encode` for every byte string
/// `encode` produced. Encode failures surface as `Serialization`, decode
/// failures as `Deserialization`.
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<Bytes>;

    fn decode(&self, data: &[u8]) -> Result<T>;
}

/// Causes reported by the built-in codecs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodecError {
    #[snafu(display("{remaining} trailing bytes after the encoded value"))]
    TrailingBytes { remaining: usize },

    #[snafu(display("Unexpected end of input, needed {needed} more bytes"))]
    UnexpectedEof { needed: usize },

    #[snafu(display("Unknown type tag {tag:#04x}"))]
    UnknownTag { tag: u8 },

    #[snafu(display("String is not valid UTF-8"))]
    InvalidUtf8 { source: std::string::FromUtf8Error },

    #[snafu(display("Value nested deeper than {max} levels"))]
    TooDeep { max: usize },

    #[snafu(display("Length {len} does not fit in 32 bits"))]
    TooLong { len: usize },

    #[snafu(display("Unsupported format version {version}"))]
    UnsupportedVersion { version: u8 },

    #[snafu(display("Expected a mapping, found {found}"))]
    NotAMapping { found: &'static str },
}

/// General-purpose codec for any serde type, backed by bincode.
///
/// Handles arbitrary nesting and binary payloads. Types whose `Serialize`
/// impl refuses (or that bincode cannot represent, such as sequences of
/// unknown length) fail with `Serialization` and nothing is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for ObjectCodec {
    fn encode(&self, value: &T) -> Result<Bytes> {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map(Bytes::from)
            .boxed()
            .context(SerializationSnafu)
    }

    fn decode(&self, data: &[u8]) -> Result<T> {
        let (value, read) = bincode::serde::decode_from_slice(data, bincode::config::standard())
            .boxed()
            .context(DeserializationSnafu)?;
        if read != data.len() {
            return Err(CodecError::TrailingBytes {
                remaining: data.len() - read,
            })
            .boxed()
            .context(DeserializationSnafu);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::BTreeMap};

    use serde::{Deserialize, Serializer, ser::Error as _};

    use super::*;
    use crate::{QueueError, Value};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Request {
        url:      String,
        body:     Vec<u8>,
        priority: i32,
        meta:     BTreeMap<String, Value>,
    }

    #[test]
    fn test_struct_roundtrip() {
        let request = Request {
            url:      "http://example.com".into(),
            body:     vec![0, 159, 146, 150],
            priority: -3,
            meta:     BTreeMap::from([("depth".to_string(), Value::Int(2))]),
        };
        let bytes = ObjectCodec.encode(&request).unwrap();
        let decoded: Request = ObjectCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, request);
    }

    /// Stands in for a live resource that has no byte representation.
    struct Socket(Cell<u32>);

    impl Serialize for Socket {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom(format!("cannot serialize socket {}", self.0.get())))
        }
    }

    impl<'de> Deserialize<'de> for Socket {
        fn deserialize<D: serde::Deserializer<'de>>(_: D) -> std::result::Result<Self, D::Error> {
            Ok(Self(Cell::new(0)))
        }
    }

    #[test]
    fn test_unencodable_value_is_a_serialization_error() {
        let err = ObjectCodec.encode(&Socket(Cell::new(7))).unwrap_err();
        assert!(matches!(err, QueueError::Serialization { .. }));
        let source = snafu::ErrorCompat::iter_chain(&err).nth(1).unwrap().to_string();
        assert!(source.contains("cannot serialize socket 7"));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = Codec::<u32>::encode(&ObjectCodec, &7).unwrap().to_vec();
        bytes.push(0);
        let err = Codec::<u32>::decode(&ObjectCodec, &bytes).unwrap_err();
        assert!(err.is_corrupt_record());
    }

    #[test]
    fn test_garbage_is_a_deserialization_error() {
        let err = Codec::<String>::decode(&ObjectCodec, &[0xFF, 0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, QueueError::Deserialization { .. }));
    }
}
