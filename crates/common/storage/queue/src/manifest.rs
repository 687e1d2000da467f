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

//! Manifest of a FIFO disk store.
//!
//! The manifest records where the head (next record to pop) and the tail
//! (next append position) of the queue are, so a reopened store resumes
//! without scanning consumed chunks. Records appended after the last manifest
//! write are found by scanning the tail chunk forward from the recorded tail.
//!
//! ## Binary Format
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ Header (24 bytes)                                       │
//! ├──────────────────┬─────────────────────────────────────┤
//! │ magic: [u8; 4]   │ "FQMF"                              │
//! │ version: u32     │ Format version, currently 1         │
//! │ generation: u64  │ Bumped on every write               │
//! │ checksum: u32    │ CRC32 of the body                   │
//! │ reserved: [u8;4] │                                     │
//! ├──────────────────┴─────────────────────────────────────┤
//! │ Body (44 bytes)                                         │
//! │ chunk_size: u32                                         │
//! │ head: chunk u64, offset u64, records u32               │
//! │ tail: chunk u64, offset u64, records u32               │
//! └────────────────────────────────────────────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use snafu::ensure;

use crate::{
    Result,
    crc::calculate_block_crc,
    error::{ManifestCorruptedSnafu, UnsupportedManifestVersionSnafu},
};

/// Magic bytes identifying a manifest file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"FQMF";

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Size of the manifest header in bytes.
pub const MANIFEST_HEADER_SIZE: usize = 24;

const CURSOR_SIZE: usize = 8 + 8 + 4;
const MANIFEST_BODY_SIZE: usize = 4 + 2 * CURSOR_SIZE;

/// Total manifest size in bytes.
pub const MANIFEST_SIZE: usize = MANIFEST_HEADER_SIZE + MANIFEST_BODY_SIZE;

/// A position inside the chunk sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkCursor {
    /// Chunk file number.
    pub chunk:   u64,
    /// Byte offset inside the chunk.
    pub offset:  u64,
    /// Records before `offset` in this chunk.
    pub records: u32,
}

impl ChunkCursor {
    /// Cursor at the start of `chunk`.
    pub const fn start_of(chunk: u64) -> Self {
        Self {
            chunk,
            offset: 0,
            records: 0,
        }
    }

    fn write_to(self, buf: &mut BytesMut) {
        buf.put_u64_le(self.chunk);
        buf.put_u64_le(self.offset);
        buf.put_u32_le(self.records);
    }

    fn read_from(buf: &mut &[u8]) -> Self {
        Self {
            chunk:   buf.get_u64_le(),
            offset:  buf.get_u64_le(),
            records: buf.get_u32_le(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version:    u32,
    /// Monotonic write counter; the newest valid slot wins on recovery.
    pub generation: u64,
    /// Records per chunk, fixed when the queue is first created.
    pub chunk_size: u32,
    /// Next record to pop.
    pub head:       ChunkCursor,
    /// Next append position.
    pub tail:       ChunkCursor,
}

impl Manifest {
    /// Manifest of an empty queue.
    pub const fn new(chunk_size: u32) -> Self {
        Self {
            version: MANIFEST_VERSION,
            generation: 0,
            chunk_size,
            head: ChunkCursor::start_of(0),
            tail: ChunkCursor::start_of(0),
        }
    }

    /// Number of records between head and tail.
    pub fn pending(&self) -> u64 {
        let chunk_size = u64::from(self.chunk_size);
        if self.head.chunk == self.tail.chunk {
            return u64::from(self.tail.records.saturating_sub(self.head.records));
        }
        let full_chunks = self.tail.chunk - self.head.chunk - 1;
        (chunk_size - u64::from(self.head.records))
            + full_chunks * chunk_size
            + u64::from(self.tail.records)
    }

    pub fn serialize(&self) -> Bytes {
        let mut body = BytesMut::with_capacity(MANIFEST_BODY_SIZE);
        body.put_u32_le(self.chunk_size);
        self.head.write_to(&mut body);
        self.tail.write_to(&mut body);

        let mut buf = BytesMut::with_capacity(MANIFEST_SIZE);
        buf.put_slice(&MANIFEST_MAGIC);
        buf.put_u32_le(self.version);
        buf.put_u64_le(self.generation);
        buf.put_u32_le(calculate_block_crc(&body));
        buf.put_u32_le(0);
        buf.put_slice(&body);
        buf.freeze()
    }

    /// Validates magic, version and checksum before decoding the body.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() == MANIFEST_SIZE,
            ManifestCorruptedSnafu {
                reason: format!(
                    "unexpected size: {} bytes, expected {MANIFEST_SIZE}",
                    data.len()
                ),
            }
        );

        let mut header = &data[..MANIFEST_HEADER_SIZE];
        let magic = &header[..4];
        ensure!(
            magic == MANIFEST_MAGIC,
            ManifestCorruptedSnafu {
                reason: format!("invalid magic: {magic:?}"),
            }
        );
        header.advance(4);

        let version = header.get_u32_le();
        ensure!(
            version == MANIFEST_VERSION,
            UnsupportedManifestVersionSnafu { version }
        );
        let generation = header.get_u64_le();
        let stored_checksum = header.get_u32_le();

        let body = &data[MANIFEST_HEADER_SIZE..];
        let computed_checksum = calculate_block_crc(body);
        ensure!(
            stored_checksum == computed_checksum,
            ManifestCorruptedSnafu {
                reason: format!(
                    "checksum mismatch: stored={stored_checksum:#x}, \
                     computed={computed_checksum:#x}"
                ),
            }
        );

        let mut body = body;
        let chunk_size = body.get_u32_le();
        let head = ChunkCursor::read_from(&mut body);
        let tail = ChunkCursor::read_from(&mut body);

        ensure!(
            chunk_size > 0 && head.chunk <= tail.chunk,
            ManifestCorruptedSnafu {
                reason: format!(
                    "inconsistent cursors: chunk_size={chunk_size}, head={head:?}, tail={tail:?}"
                ),
            }
        );

        Ok(Self {
            version,
            generation,
            chunk_size,
            head,
            tail,
        })
    }
}
