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

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Default number of records per FIFO chunk file.
pub const DEFAULT_CHUNK_SIZE: u32 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct QueueConfig {
    pub medium:         Medium,
    pub order:          QueueOrder,
    /// Records per chunk file. Only used by FIFO disk queues.
    #[default(DEFAULT_CHUNK_SIZE)]
    pub chunk_size:     u32,
    pub flush_mode:     FlushMode,
    pub corrupt_policy: CorruptPolicy,
}

/// Pop order of a queue. Fixed for the lifetime of a handle.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    /// Pop from the head: first pushed, first popped.
    #[default]
    #[display("fifo")]
    Fifo,
    /// Pop from the tail: last pushed, first popped.
    #[display("lifo")]
    Lifo,
}

/// Where a queue keeps its records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Medium {
    #[default]
    Memory,
    /// A directory at `path` owned by this queue.
    Disk { path: PathBuf },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Writes reach the OS on every push; fsync only on close.
    #[default]
    Async,
    /// fsync after every push and pop.
    Sync,
    /// fsync once `bytes` have been written or `interval_ms` has elapsed
    /// since the last sync, whichever comes first.
    Batch { bytes: usize, interval_ms: u64 },
}

impl FlushMode {
    /// Whether a disk store should fsync now, given the bytes written and the
    /// time passed since its last sync.
    #[must_use]
    pub fn should_sync(&self, pending_bytes: usize, since_last_sync: Duration) -> bool {
        match self {
            Self::Async => false,
            Self::Sync => true,
            Self::Batch { bytes, interval_ms } => {
                pending_bytes >= *bytes || since_last_sync >= Duration::from_millis(*interval_ms)
            }
        }
    }
}

/// What a queue does when a stored record cannot be decoded or converted back
/// into a work item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptPolicy {
    /// Consume the record, report the error, keep serving.
    #[default]
    Discard,
    /// Report the error and refuse all further operations until reopened.
    /// The record stays in the store when the store supports peek.
    Halt,
}
