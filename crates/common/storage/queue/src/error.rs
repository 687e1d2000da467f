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

use snafu::Snafu;

/// Boxed error used for causes that come from outside this crate (codecs,
/// record converters).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which way a work item was being converted when a converter failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ConversionDirection {
    #[display("to record")]
    ToRecord,
    #[display("from record")]
    FromRecord,
}

/// Queue operation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueueError {
    /// The queue could not be opened (bad path, permission denied, ...).
    #[snafu(display("Failed to open queue at {}", path.display()))]
    Construction {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// Filesystem I/O failure on an already open queue.
    #[snafu(display("IO error on {}", path.display()))]
    Io {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// The value could not be encoded. Nothing was enqueued.
    #[snafu(display("Failed to serialize value"))]
    Serialization {
        source: BoxError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// Stored bytes do not decode with the queue's codec.
    #[snafu(display("Failed to deserialize stored record"))]
    Deserialization {
        source: BoxError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// The record converter rejected a work item or a stored record.
    #[snafu(display("Failed to convert work item {direction}"))]
    RecordConversion {
        direction: ConversionDirection,
        source:    BoxError,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },

    /// The backing store cannot perform this operation.
    #[snafu(display("Operation `{operation}` is not supported by this store"))]
    Unsupported {
        operation: &'static str,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },

    /// A payload does not fit the on-disk length prefix.
    #[snafu(display("Record of {len} bytes exceeds the maximum record size"))]
    RecordTooLarge {
        len: usize,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// CRC or framing mismatch while reading a disk record.
    #[snafu(display("Corrupted record in {} at offset {offset}", path.display()))]
    CorruptedRecord {
        path:   PathBuf,
        offset: u64,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Manifest corrupted: {reason}"))]
    ManifestCorrupted {
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Unsupported manifest version: {version}"))]
    UnsupportedManifestVersion {
        version: u32,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("Queue is closed"))]
    Closed {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// A corrupt record halted the queue; it must be reopened.
    #[snafu(display("Queue halted on a corrupt record"))]
    Poisoned {
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

impl QueueError {
    /// Returns `true` if the error means a stored record could not be turned
    /// back into a value, either because its bytes fail their checksum or
    /// because they do not decode.
    #[must_use]
    pub const fn is_corrupt_record(&self) -> bool {
        matches!(
            self,
            Self::CorruptedRecord { .. }
                | Self::Deserialization { .. }
                | Self::RecordConversion {
                    direction: ConversionDirection::FromRecord,
                    ..
                }
        )
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool { matches!(self, Self::Unsupported { .. }) }
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
