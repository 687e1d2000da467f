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

use std::path::PathBuf;

use crate::{
    Codec, CorruptPolicy, FlatRecord, FlushMode, Medium, QueueConfig, QueueOrder, RecordConverter,
    RecordQueue, Result, SerializingQueue, Store,
};

/// Opens queues from a [`QueueConfig`].
///
/// ```
/// use frontq_queue::{ObjectCodec, QueueBuilder, QueueOrder};
///
/// let dir = tempfile::tempdir()?;
/// let mut queue = QueueBuilder::disk(dir.path().join("requests"), QueueOrder::Lifo)
///     .chunk_size(1000)
///     .build(ObjectCodec)?;
/// queue.push(&"http://example.com".to_string())?;
/// assert_eq!(queue.pop()?.as_deref(), Some("http://example.com"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    pub const fn new(config: QueueConfig) -> Self { Self { config } }

    pub fn memory(order: QueueOrder) -> Self {
        Self::new(QueueConfig {
            medium: Medium::Memory,
            order,
            ..Default::default()
        })
    }

    pub fn disk<P: Into<PathBuf>>(path: P, order: QueueOrder) -> Self {
        Self::new(QueueConfig {
            medium: Medium::Disk { path: path.into() },
            order,
            ..Default::default()
        })
    }

    #[must_use]
    pub const fn order(mut self, order: QueueOrder) -> Self {
        self.config.order = order;
        self
    }

    /// Records per chunk file for FIFO disk queues.
    #[must_use]
    pub const fn chunk_size(mut self, chunk_size: u32) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub const fn flush_mode(mut self, mode: FlushMode) -> Self {
        self.config.flush_mode = mode;
        self
    }

    #[must_use]
    pub const fn corrupt_policy(mut self, policy: CorruptPolicy) -> Self {
        self.config.corrupt_policy = policy;
        self
    }

    pub const fn config(&self) -> &QueueConfig { &self.config }

    /// Open the raw byte store. Disk queues provision their directory here.
    pub fn open_store(&self) -> Result<Store> { Store::open(&self.config) }

    /// Open a queue of `T` encoded with `codec`.
    pub fn build<C, T>(self, codec: C) -> Result<SerializingQueue<Store, C, T>>
    where
        C: Codec<T>,
    {
        Ok(SerializingQueue::new(self.open_store()?, codec).with_policy(self.config.corrupt_policy))
    }

    /// Open a queue of work items stored as flat records.
    pub fn build_records<C, R>(self, codec: C, converter: R) -> Result<RecordQueue<Store, C, R>>
    where
        C: Codec<FlatRecord>,
        R: RecordConverter,
    {
        Ok(RecordQueue::new(self.open_store()?, codec, converter)
            .with_policy(self.config.corrupt_policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackingStore, DEFAULT_CHUNK_SIZE, PrimitiveCodec, Value};

    #[test]
    fn test_builder_default_config() {
        let builder = QueueBuilder::disk("/tmp/test_queue", QueueOrder::Fifo);
        assert_eq!(
            builder.config().medium,
            Medium::Disk {
                path: PathBuf::from("/tmp/test_queue"),
            }
        );
        assert_eq!(builder.config().chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(builder.config().flush_mode, FlushMode::Async);
        assert_eq!(builder.config().corrupt_policy, CorruptPolicy::Discard);
    }

    #[test]
    fn test_builder_custom_config() {
        let builder = QueueBuilder::memory(QueueOrder::Fifo)
            .order(QueueOrder::Lifo)
            .chunk_size(64)
            .flush_mode(FlushMode::Sync)
            .corrupt_policy(CorruptPolicy::Halt);

        assert_eq!(builder.config().medium, Medium::Memory);
        assert_eq!(builder.config().order, QueueOrder::Lifo);
        assert_eq!(builder.config().chunk_size, 64);
        assert!(matches!(builder.config().flush_mode, FlushMode::Sync));
        assert_eq!(builder.config().corrupt_policy, CorruptPolicy::Halt);
    }

    #[test]
    fn test_build_applies_policy() {
        let queue = QueueBuilder::memory(QueueOrder::Fifo)
            .corrupt_policy(CorruptPolicy::Halt)
            .build::<_, Value>(PrimitiveCodec)
            .unwrap();
        assert_eq!(queue.policy(), CorruptPolicy::Halt);
    }

    #[test]
    fn test_open_store_provisions_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("a").join("b").join("q");

        let store = QueueBuilder::disk(&path, QueueOrder::Lifo)
            .open_store()
            .unwrap();
        assert!(path.is_dir());
        assert!(store.is_empty());
    }
}
