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

//! Ordered byte containers underneath every queue.

use bytes::Bytes;

use crate::{
    FifoDiskStore, LifoDiskStore, Medium, MemoryStore, QueueConfig, QueueOrder, Result,
    error::UnsupportedSnafu,
};

/// An ordered container of opaque byte records.
///
/// The order (FIFO or LIFO) is a property of the store, fixed when it is
/// opened. `pop` and `peek` return `Ok(None)` when the store is empty; errors
/// are reserved for real failures. After [`close`](Self::close) every other
/// operation fails with `Closed`.
pub trait BackingStore {
    fn push(&mut self, data: Bytes) -> Result<()>;

    fn pop(&mut self) -> Result<Option<Bytes>>;

    /// Return the next record without removing it.
    ///
    /// Stores whose format cannot be inspected without consuming keep this
    /// default and report `Unsupported`.
    fn peek(&mut self) -> Result<Option<Bytes>> { UnsupportedSnafu { operation: "peek" }.fail() }

    /// Remove the next record without decoding or verifying it.
    ///
    /// This is how a caller moves past a record that fails its checksum.
    /// Returns `false` when the store is empty. The default pops and drops,
    /// which is enough for stores that cannot hold a damaged record.
    fn discard_next(&mut self) -> Result<bool> { Ok(self.pop()?.is_some()) }

    /// Number of pending records.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool { self.len() == 0 }

    /// Flush and release the store. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// A store whose medium is chosen at runtime from a [`QueueConfig`].
#[derive(derive_more::From)]
pub enum Store {
    Memory(MemoryStore),
    FifoDisk(FifoDiskStore),
    LifoDisk(LifoDiskStore),
}

impl Store {
    pub fn open(config: &QueueConfig) -> Result<Self> {
        Ok(match (&config.medium, config.order) {
            (Medium::Memory, order) => Self::Memory(MemoryStore::new(order)),
            (Medium::Disk { path }, QueueOrder::Fifo) => Self::FifoDisk(FifoDiskStore::open(
                path,
                config.chunk_size,
                config.flush_mode,
            )?),
            (Medium::Disk { path }, QueueOrder::Lifo) => {
                Self::LifoDisk(LifoDiskStore::open(path, config.flush_mode)?)
            }
        })
    }

    pub const fn order(&self) -> QueueOrder {
        match self {
            Self::Memory(store) => store.order(),
            Self::FifoDisk(_) => QueueOrder::Fifo,
            Self::LifoDisk(_) => QueueOrder::Lifo,
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            Store::Memory($store) => $call,
            Store::FifoDisk($store) => $call,
            Store::LifoDisk($store) => $call,
        }
    };
}

impl BackingStore for Store {
    fn push(&mut self, data: Bytes) -> Result<()> { delegate!(self, s => BackingStore::push(s, data)) }

    fn pop(&mut self) -> Result<Option<Bytes>> { delegate!(self, s => BackingStore::pop(s)) }

    fn peek(&mut self) -> Result<Option<Bytes>> { delegate!(self, s => BackingStore::peek(s)) }

    fn discard_next(&mut self) -> Result<bool> {
        delegate!(self, s => BackingStore::discard_next(s))
    }

    fn len(&self) -> u64 { delegate!(self, s => BackingStore::len(s)) }

    fn close(&mut self) -> Result<()> { delegate!(self, s => BackingStore::close(s)) }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::QueueError;

    /// A store that can only be drained destructively.
    struct PopOnly(Vec<Bytes>);

    impl BackingStore for PopOnly {
        fn push(&mut self, data: Bytes) -> Result<()> {
            self.0.push(data);
            Ok(())
        }

        fn pop(&mut self) -> Result<Option<Bytes>> { Ok(self.0.pop()) }

        fn len(&self) -> u64 { self.0.len() as u64 }

        fn close(&mut self) -> Result<()> { Ok(()) }
    }

    #[test]
    fn test_default_peek_is_unsupported() {
        let mut store = PopOnly(vec![Bytes::from_static(b"a")]);
        let err = store.peek().unwrap_err();
        assert!(err.is_unsupported());
        // Nothing was consumed.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_default_discard_next_pops() {
        let mut store = PopOnly(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        assert!(store.discard_next().unwrap());
        assert_eq!(store.pop().unwrap().as_deref(), Some(&b"a"[..]));
        assert!(!store.discard_next().unwrap());
    }

    #[test_case(QueueOrder::Fifo, b"a" ; "fifo")]
    #[test_case(QueueOrder::Lifo, b"c" ; "lifo")]
    fn test_open_from_config(order: QueueOrder, first: &[u8]) {
        let temp_dir = tempfile::tempdir().unwrap();
        for medium in [
            Medium::Memory,
            Medium::Disk {
                path: temp_dir.path().join(order.to_string()),
            },
        ] {
            let config = QueueConfig {
                medium,
                order,
                ..QueueConfig::default()
            };
            let mut store = Store::open(&config).unwrap();
            assert_eq!(store.order(), order);

            for item in [b"a", b"b", b"c"] {
                store.push(Bytes::from_static(item)).unwrap();
            }
            assert_eq!(store.len(), 3);
            assert_eq!(store.pop().unwrap().as_deref(), Some(first));
            assert!(store.discard_next().unwrap());
            assert_eq!(store.len(), 1);
            store.close().unwrap();
            assert!(matches!(store.pop(), Err(QueueError::Closed { .. })));
        }
    }
}
