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

//! Typed queue over a byte store.
//!
//! [`SerializingQueue`] pairs a [`BackingStore`] with a [`Codec`]: values are
//! encoded before they reach the store and decoded on the way out. A value
//! that fails to encode never touches the store.
//!
//! ## Usage
//!
//! ```
//! use frontq_queue::{MemoryStore, PrimitiveCodec, SerializingQueue, Value};
//!
//! let mut queue = SerializingQueue::new(MemoryStore::fifo(), PrimitiveCodec);
//! queue.push(&Value::from("a"))?;
//! queue.push(&Value::from("b"))?;
//!
//! assert_eq!(queue.pop()?, Some(Value::from("a")));
//! assert_eq!(queue.pop()?, Some(Value::from("b")));
//! assert_eq!(queue.pop()?, None);
//! # Ok::<(), frontq_queue::QueueError>(())
//! ```

use std::marker::PhantomData;

use snafu::ensure;
use tracing::{error, warn};

use crate::{BackingStore, Codec, CorruptPolicy, QueueError, Result, error::PoisonedSnafu};

/// A queue of `T` stored as bytes in `S`, encoded with `C`.
pub struct SerializingQueue<S, C, T> {
    store:    S,
    codec:    C,
    policy:   CorruptPolicy,
    poisoned: bool,
    _marker:  PhantomData<fn(T) -> T>,
}

impl<S, C, T> SerializingQueue<S, C, T>
where
    S: BackingStore,
    C: Codec<T>,
{
    /// Wrap `store` with the default [`CorruptPolicy::Discard`].
    pub const fn new(store: S, codec: C) -> Self {
        Self {
            store,
            codec,
            policy: CorruptPolicy::Discard,
            poisoned: false,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: CorruptPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Encode `value` and append it. On an encoding error the store is left
    /// untouched.
    pub fn push(&mut self, value: &T) -> Result<()> {
        self.ensure_healthy()?;
        let data = self.codec.encode(value)?;
        self.store.push(data)
    }

    /// Remove and decode the next value, or `Ok(None)` when empty.
    pub fn pop(&mut self) -> Result<Option<T>> { self.take_next(|codec, data| codec.decode(data)) }

    /// Decode the next value without removing it.
    pub fn peek(&mut self) -> Result<Option<T>> {
        self.inspect_next(|codec, data| codec.decode(data))
    }

    pub fn len(&self) -> u64 { self.store.len() }

    pub fn is_empty(&self) -> bool { self.store.is_empty() }

    /// Close the underlying store. Succeeds on a poisoned queue too.
    pub fn close(&mut self) -> Result<()> { self.store.close() }

    pub const fn policy(&self) -> CorruptPolicy { self.policy }

    pub const fn is_poisoned(&self) -> bool { self.poisoned }

    pub const fn store(&self) -> &S { &self.store }

    pub fn into_store(self) -> S { self.store }

    fn ensure_healthy(&self) -> Result<()> {
        ensure!(!self.poisoned, PoisonedSnafu);
        Ok(())
    }

    /// Pop the next record and turn it into a `U` with `decode`, applying the
    /// corrupt-record policy when the record fails its checksum or `decode`
    /// fails.
    pub(crate) fn take_next<U>(
        &mut self,
        decode: impl FnOnce(&C, &[u8]) -> Result<U>,
    ) -> Result<Option<U>> {
        self.ensure_healthy()?;
        match self.policy {
            CorruptPolicy::Discard => {
                let data = match self.store.pop() {
                    Ok(Some(data)) => data,
                    Ok(None) => return Ok(None),
                    // The store refuses to hand out the record, so skip it there.
                    Err(e @ QueueError::CorruptedRecord { .. }) => {
                        warn!(error = %e, "Discarding record that fails its checksum");
                        self.store.discard_next()?;
                        return Err(e);
                    }
                    Err(e) => return Err(e),
                };
                decode(&self.codec, &data).map(Some).inspect_err(|e| {
                    warn!(error = %e, len = data.len(), "Discarding corrupt record");
                })
            }
            CorruptPolicy::Halt => {
                let data = match self.store.peek() {
                    Ok(Some(data)) => data,
                    Ok(None) => return Ok(None),
                    // Without peek the record is consumed before it can be checked.
                    Err(e) if e.is_unsupported() => {
                        let data = match self.store.pop() {
                            Ok(Some(data)) => data,
                            Ok(None) => return Ok(None),
                            Err(e) => return Err(self.poison_if_damaged(e)),
                        };
                        let result = decode(&self.codec, &data);
                        return self.poison_on_error(result).map(Some);
                    }
                    Err(e) => return Err(self.poison_if_damaged(e)),
                };
                let result = decode(&self.codec, &data);
                let value = self.poison_on_error(result)?;
                self.store.pop()?;
                Ok(Some(value))
            }
        }
    }

    /// Peek the next record and turn it into a `U`. Never consumes.
    pub(crate) fn inspect_next<U>(
        &mut self,
        decode: impl FnOnce(&C, &[u8]) -> Result<U>,
    ) -> Result<Option<U>> {
        self.ensure_healthy()?;
        let data = match self.store.peek() {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(None),
            Err(e) if self.policy == CorruptPolicy::Halt => return Err(self.poison_if_damaged(e)),
            Err(e) => return Err(e),
        };
        let result = decode(&self.codec, &data);
        match self.policy {
            CorruptPolicy::Discard => result.map(Some),
            CorruptPolicy::Halt => self.poison_on_error(result).map(Some),
        }
    }

    /// Poison the handle if the store reported a record failing its checksum.
    fn poison_if_damaged(&mut self, e: QueueError) -> QueueError {
        if matches!(e, QueueError::CorruptedRecord { .. }) {
            self.poisoned = true;
            error!(error = %e, "Damaged record, halting queue");
        }
        e
    }

    fn poison_on_error<U>(&mut self, result: Result<U>) -> Result<U> {
        result.inspect_err(|e| {
            self.poisoned = true;
            error!(error = %e, "Corrupt record, halting queue");
        })
    }
}
