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

//! Queues of domain work items stored as flat records.
//!
//! A [`RecordQueue`] never stores a work item directly: on push it asks a
//! [`RecordConverter`] for a [`FlatRecord`] and encodes that, on pop it
//! decodes a record and hands it back to the converter. The converter is
//! supplied by the caller, so this crate knows nothing about what a work item
//! looks like.

use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    BackingStore, Codec, CorruptPolicy, FlatRecord, Result, SerializingQueue, Value,
    error::{BoxError, ConversionDirection, RecordConversionSnafu},
};

/// Bidirectional conversion between a work item and a flat record.
pub trait RecordConverter {
    type Item;

    fn to_record(&self, item: &Self::Item) -> std::result::Result<FlatRecord, BoxError>;

    fn from_record(&self, record: FlatRecord) -> std::result::Result<Self::Item, BoxError>;
}

/// A [`RecordConverter`] made from a pair of closures.
///
/// Context the conversion needs (a spider handle, a callback registry) is
/// captured by the closures.
pub struct FnConverter<I, ToFn, FromFn> {
    to:      ToFn,
    from:    FromFn,
    _marker: std::marker::PhantomData<fn(I) -> I>,
}

impl<I, ToFn, FromFn> FnConverter<I, ToFn, FromFn>
where
    ToFn: Fn(&I) -> std::result::Result<FlatRecord, BoxError>,
    FromFn: Fn(FlatRecord) -> std::result::Result<I, BoxError>,
{
    pub const fn new(to: ToFn, from: FromFn) -> Self {
        Self {
            to,
            from,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<I, ToFn, FromFn> RecordConverter for FnConverter<I, ToFn, FromFn>
where
    ToFn: Fn(&I) -> std::result::Result<FlatRecord, BoxError>,
    FromFn: Fn(FlatRecord) -> std::result::Result<I, BoxError>,
{
    type Item = I;

    fn to_record(&self, item: &I) -> std::result::Result<FlatRecord, BoxError> { (self.to)(item) }

    fn from_record(&self, record: FlatRecord) -> std::result::Result<I, BoxError> {
        (self.from)(record)
    }
}

/// A queue of work items that stores each one as a flat record.
pub struct RecordQueue<S, C, R> {
    inner:     SerializingQueue<S, C, FlatRecord>,
    converter: R,
}

impl<S, C, R> RecordQueue<S, C, R>
where
    S: BackingStore,
    C: Codec<FlatRecord>,
    R: RecordConverter,
{
    pub const fn new(store: S, codec: C, converter: R) -> Self {
        Self {
            inner: SerializingQueue::new(store, codec),
            converter,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CorruptPolicy) -> Self {
        self.inner = self.inner.with_policy(policy);
        self
    }

    /// Flatten `item` and push the record. A converter or codec failure
    /// leaves the queue unchanged.
    pub fn push(&mut self, item: &R::Item) -> Result<()> {
        let record = self
            .converter
            .to_record(item)
            .context(RecordConversionSnafu {
                direction: ConversionDirection::ToRecord,
            })?;
        self.inner.push(&record)
    }

    pub fn pop(&mut self) -> Result<Option<R::Item>> {
        let converter = &self.converter;
        self.inner
            .take_next(|codec, data| rebuild(converter, codec.decode(data)?))
    }

    pub fn peek(&mut self) -> Result<Option<R::Item>> {
        let converter = &self.converter;
        self.inner
            .inspect_next(|codec, data| rebuild(converter, codec.decode(data)?))
    }

    pub fn len(&self) -> u64 { self.inner.len() }

    pub fn is_empty(&self) -> bool { self.inner.is_empty() }

    pub fn close(&mut self) -> Result<()> { self.inner.close() }

    pub const fn is_poisoned(&self) -> bool { self.inner.is_poisoned() }

    pub const fn converter(&self) -> &R { &self.converter }
}

fn rebuild<R: RecordConverter>(converter: &R, record: FlatRecord) -> Result<R::Item> {
    converter
        .from_record(record)
        .context(RecordConversionSnafu {
            direction: ConversionDirection::FromRecord,
        })
}

/// Why a field could not be read from a record.
#[derive(Debug, Snafu)]
pub enum FieldError {
    #[snafu(display("Missing field `{field}`"))]
    Missing { field: String },

    #[snafu(display("Field `{field}` should be {expected}, found {found}"))]
    WrongType {
        field:    String,
        expected: &'static str,
        found:    &'static str,
    },
}

/// Typed field extraction for writing `from_record` converters.
///
/// The `take_*` methods remove the field from the record. `Null` counts as
/// absent for the `take_opt_*` variants.
pub trait RecordExt {
    fn take_value(&mut self, field: &str) -> std::result::Result<Value, FieldError>;

    fn take_str(&mut self, field: &str) -> std::result::Result<String, FieldError> {
        match self.take_value(field)? {
            Value::Str(s) => Ok(s),
            other => wrong_type(field, "str", &other),
        }
    }

    fn take_opt_str(&mut self, field: &str) -> std::result::Result<Option<String>, FieldError> {
        self.take_opt(field, |value| match value {
            Value::Str(s) => Ok(s),
            other => wrong_type(field, "str", &other),
        })
    }

    fn take_i64(&mut self, field: &str) -> std::result::Result<i64, FieldError> {
        match self.take_value(field)? {
            Value::Int(i) => Ok(i),
            other => wrong_type(field, "int", &other),
        }
    }

    fn take_bool(&mut self, field: &str) -> std::result::Result<bool, FieldError> {
        match self.take_value(field)? {
            Value::Bool(b) => Ok(b),
            other => wrong_type(field, "bool", &other),
        }
    }

    fn take_bytes(&mut self, field: &str) -> std::result::Result<Vec<u8>, FieldError> {
        match self.take_value(field)? {
            Value::Bytes(b) => Ok(b),
            other => wrong_type(field, "bytes", &other),
        }
    }

    fn take_list(&mut self, field: &str) -> std::result::Result<Vec<Value>, FieldError> {
        match self.take_value(field)? {
            Value::List(items) => Ok(items),
            other => wrong_type(field, "list", &other),
        }
    }

    fn take_map(&mut self, field: &str) -> std::result::Result<FlatRecord, FieldError> {
        match self.take_value(field)? {
            Value::Map(map) => Ok(map),
            other => wrong_type(field, "map", &other),
        }
    }

    /// Take an optional field, converting it with `f` when present.
    fn take_opt<T>(
        &mut self,
        field: &str,
        f: impl FnOnce(Value) -> std::result::Result<T, FieldError>,
    ) -> std::result::Result<Option<T>, FieldError> {
        match self.take_value(field) {
            Ok(Value::Null) | Err(FieldError::Missing { .. }) => Ok(None),
            Ok(value) => f(value).map(Some),
            Err(e) => Err(e),
        }
    }
}

impl RecordExt for FlatRecord {
    fn take_value(&mut self, field: &str) -> std::result::Result<Value, FieldError> {
        self.remove(field).context(MissingSnafu { field })
    }
}

fn wrong_type<T>(
    field: &str,
    expected: &'static str,
    found: &Value,
) -> std::result::Result<T, FieldError> {
    WrongTypeSnafu {
        field,
        expected,
        found: found.kind(),
    }
    .fail()
}
