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

//! On-disk record framing.
//!
//! FIFO chunk files store records front to back and only ever read forward:
//!
//! ```text
//! ┌─────────────────┬──────────────────────┬─────────────────┐
//! │  Length (4B)    │   Payload (variable) │   CRC32 (4B)    │
//! └─────────────────┴──────────────────────┴─────────────────┘
//! ```
//!
//! The LIFO stack file pops from the end, so its frame repeats the length
//! after the checksum. A reversible frame is only intact when both lengths
//! agree, which catches a top record whose tail was overwritten:
//!
//! ```text
//! ┌──────────────┬────────────────────┬──────────────┬──────────────┐
//! │ Length (4B)  │ Payload (variable) │ CRC32 (4B)   │ Length (4B)  │
//! └──────────────┴────────────────────┴──────────────┴──────────────┘
//! ```
//!
//! All integers are little-endian. The CRC covers the length and the payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use snafu::OptionExt;

use crate::{
    Result,
    crc::{calculate_record_crc, verify_record_crc},
    error::{CorruptedRecordSnafu, RecordTooLargeSnafu},
    file::DataFile,
};

/// Size of the length prefix in bytes.
pub(crate) const LENGTH_SIZE: usize = 4;

/// Size of the CRC32 checksum in bytes.
pub(crate) const CRC_SIZE: usize = 4;

/// What a data file holds at a given offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FrameStatus {
    /// A whole frame whose checksum matches.
    Intact { payload: Bytes, size: u64 },
    /// A whole frame that fails its checksum. It still occupies `size` bytes.
    Corrupt { size: u64 },
    /// The length prefix, or the frame it announces, runs past the end of
    /// the file.
    Incomplete,
}

/// Frame layout of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameLayout {
    /// `len | payload | crc`
    Forward,
    /// `len | payload | crc | len`
    Reversible,
}

impl FrameLayout {
    /// Total on-disk size of a record with a payload of `payload_len` bytes.
    #[inline]
    pub const fn frame_size(self, payload_len: usize) -> usize {
        match self {
            Self::Forward => LENGTH_SIZE + payload_len + CRC_SIZE,
            Self::Reversible => LENGTH_SIZE + payload_len + CRC_SIZE + LENGTH_SIZE,
        }
    }

    pub fn encode(self, payload: &[u8]) -> Result<Bytes> {
        let length = u32::try_from(payload.len())
            .ok()
            .context(RecordTooLargeSnafu { len: payload.len() })?;
        let mut buf = BytesMut::with_capacity(self.frame_size(payload.len()));
        buf.put_u32_le(length);
        buf.put_slice(payload);
        buf.put_u32_le(calculate_record_crc(length, payload));
        if self == Self::Reversible {
            buf.put_u32_le(length);
        }
        Ok(buf.freeze())
    }

    /// Inspect the frame starting at `offset` without failing on bad data.
    ///
    /// Only a frame that fits in the file gets its checksum checked, so a
    /// torn write at the end of a file is never mistaken for a damaged
    /// record in the middle of it.
    pub fn frame_at(self, file: &mut DataFile, offset: u64) -> Result<FrameStatus> {
        if offset + LENGTH_SIZE as u64 > file.len() {
            return Ok(FrameStatus::Incomplete);
        }
        let mut length_buf = [0u8; LENGTH_SIZE];
        file.read_at(offset, &mut length_buf)?;
        let length = u32::from_le_bytes(length_buf);

        let size = self.frame_size(length as usize) as u64;
        if offset + size > file.len() {
            return Ok(FrameStatus::Incomplete);
        }

        let mut rest = vec![0u8; self.frame_size(length as usize) - LENGTH_SIZE];
        file.read_at(offset + LENGTH_SIZE as u64, &mut rest)?;
        if !self.verify(length, &rest) {
            return Ok(FrameStatus::Corrupt { size });
        }

        rest.truncate(length as usize);
        Ok(FrameStatus::Intact {
            payload: Bytes::from(rest),
            size,
        })
    }

    /// Read and verify the record starting at `offset`.
    ///
    /// Returns the payload and the frame size. A frame that runs past the end
    /// of the file or fails its checksum is reported as corrupted.
    pub fn read_at(self, file: &mut DataFile, offset: u64) -> Result<(Bytes, u64)> {
        match self.frame_at(file, offset)? {
            FrameStatus::Intact { payload, size } => Ok((payload, size)),
            FrameStatus::Corrupt { .. } | FrameStatus::Incomplete => CorruptedRecordSnafu {
                path: file.path(),
                offset,
            }
            .fail(),
        }
    }

    /// Check the checksum (and trailing length) of a frame whose bytes after
    /// the leading length are in `rest`.
    fn verify(self, length: u32, rest: &[u8]) -> bool {
        let (payload, mut trailer) = rest.split_at(length as usize);
        let stored_crc = trailer.get_u32_le();
        let trailing_ok = match self {
            Self::Forward => true,
            Self::Reversible => trailer.get_u32_le() == length,
        };
        trailing_ok && verify_record_crc(length, payload, stored_crc)
    }
}
