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

//! Crash recovery for disk stores.
//!
//! A store that was not closed cleanly may end with a partially written
//! record. Recovery scans a data file forward from a known-good offset and
//! cuts it back at the first frame that runs past the end of the file.
//!
//! A whole frame that fails its checksum is not a torn write. It is kept and
//! counted, so it surfaces as a corrupted record when it reaches the head
//! and the records behind it stay reachable.

use tracing::{debug, warn};

use crate::{
    Result,
    file::DataFile,
    frame::{FrameLayout, FrameStatus},
};

/// Outcome of scanning a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanOutcome {
    /// Complete records found after the start offset, corrupt ones included.
    pub records: u64,
    /// How many of `records` fail their checksum.
    pub corrupt: u64,
    /// Offset right after the last complete record.
    pub end:     u64,
}

/// Walk complete frames from `start` until the end of the file or the first
/// incomplete frame. `on_frame` sees the start offset of every complete one.
pub(crate) fn scan_records(
    file: &mut DataFile,
    start: u64,
    layout: FrameLayout,
    mut on_frame: impl FnMut(u64),
) -> Result<ScanOutcome> {
    let mut position = start;
    let mut records = 0u64;
    let mut corrupt = 0u64;

    while position < file.len() {
        let size = match layout.frame_at(file, position)? {
            FrameStatus::Intact { size, .. } => size,
            FrameStatus::Corrupt { size } => {
                warn!(
                    path = ?file.path(),
                    offset = position,
                    size,
                    "Record fails its checksum, keeping it in place"
                );
                corrupt += 1;
                size
            }
            FrameStatus::Incomplete => {
                warn!(
                    path = ?file.path(),
                    offset = position,
                    file_size = file.len(),
                    "Incomplete record found, stopping scan at this point"
                );
                break;
            }
        };
        on_frame(position);
        position += size;
        records += 1;
    }

    debug!(path = ?file.path(), records, corrupt, position, "File scan complete");
    Ok(ScanOutcome {
        records,
        corrupt,
        end: position,
    })
}

/// Scan from `start` and truncate an incomplete frame left at the end.
pub(crate) fn repair_tail(
    file: &mut DataFile,
    start: u64,
    layout: FrameLayout,
    on_frame: impl FnMut(u64),
) -> Result<ScanOutcome> {
    let outcome = scan_records(file, start, layout, on_frame)?;
    if outcome.end < file.len() {
        warn!(
            path = ?file.path(),
            valid_end = outcome.end,
            file_size = file.len(),
            discarded = file.len() - outcome.end,
            "Truncating torn tail"
        );
        file.truncate(outcome.end)?;
        file.sync()?;
    }
    Ok(outcome)
}
