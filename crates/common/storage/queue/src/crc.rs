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

//! CRC32 checksums for disk records.
//!
//! The checksum covers the length prefix as well as the payload, so a record
//! whose length field was damaged is rejected even when the bytes it now
//! points at happen to look like a payload.

use crc32fast::Hasher;

/// Checksum of a record with the given payload length and payload.
#[inline]
pub(crate) fn calculate_record_crc(length: u32, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&length.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

#[inline]
pub(crate) fn verify_record_crc(length: u32, payload: &[u8], expected: u32) -> bool {
    calculate_record_crc(length, payload) == expected
}

/// Checksum of an arbitrary byte block (manifest bodies).
#[inline]
pub(crate) fn calculate_block_crc(block: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(block);
    hasher.finalize()
}
