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

//! Work queues for a crawl frontier.
//!
//! Three layers compose into a queue:
//!
//! - a [`BackingStore`] keeps opaque byte records in FIFO or LIFO order,
//!   either in memory ([`MemoryStore`]) or on disk ([`FifoDiskStore`],
//!   [`LifoDiskStore`]);
//! - a [`Codec`] turns typed values into bytes ([`ObjectCodec`] for any serde
//!   type, [`PrimitiveCodec`] for the [`Value`] model);
//! - a [`RecordConverter`] turns domain work items into [`FlatRecord`]s.
//!
//! [`SerializingQueue`] combines the first two, [`RecordQueue`] all three.
//! [`QueueBuilder`] opens either from a [`QueueConfig`].

mod builder;
mod codec;
mod config;
mod crc;
mod error;
mod fifo_disk;
mod file;
mod frame;
mod lifo_disk;
mod manifest;
mod manifest_writer;
mod memory;
pub mod path;
mod primitive;
pub mod provision;
mod queue;
mod record;
mod recovery;
mod store;
mod value;

pub use builder::QueueBuilder;
pub use codec::{Codec, CodecError, ObjectCodec};
pub use config::{CorruptPolicy, DEFAULT_CHUNK_SIZE, FlushMode, Medium, QueueConfig, QueueOrder};
pub use error::{BoxError, ConversionDirection, QueueError, Result};
pub use fifo_disk::FifoDiskStore;
pub use lifo_disk::LifoDiskStore;
pub use memory::{MemoryQueue, MemoryStore};
pub use primitive::{MAX_DEPTH, PrimitiveCodec};
pub use queue::SerializingQueue;
pub use record::{FieldError, FnConverter, RecordConverter, RecordExt, RecordQueue};
pub use store::{BackingStore, Store};
pub use value::{FlatRecord, Value};

/// Request queue storing records with [`ObjectCodec`].
pub type ObjectRecordQueue<R> = RecordQueue<Store, ObjectCodec, R>;

/// Request queue storing records with [`PrimitiveCodec`].
pub type PrimitiveRecordQueue<R> = RecordQueue<Store, PrimitiveCodec, R>;
