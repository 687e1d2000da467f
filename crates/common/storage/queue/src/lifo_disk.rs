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

//! Durable LIFO store: a single `stack.data` file inside the queue directory.
//! Push appends a frame, pop reads the last frame and truncates it away.
//!
//! The start offset of every frame is kept in memory, rebuilt by scanning the
//! file on open. A damaged top frame can then be cut off without trusting its
//! trailing length.

use std::{
    fs,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use snafu::{OptionExt, ResultExt};
use tracing::{info, warn};

use crate::{
    BackingStore, FlushMode, Result,
    error::{ClosedSnafu, IoSnafu},
    file::DataFile,
    frame::FrameLayout,
    path::stack_file_path,
    provision, recovery,
};

const LAYOUT: FrameLayout = FrameLayout::Reversible;

pub struct LifoDiskStore {
    path:       PathBuf,
    flush_mode: FlushMode,
    /// `None` once closed.
    file:       Option<DataFile>,
    /// Start offset of each pending frame, bottom first.
    frames:     Vec<u64>,
}

impl LifoDiskStore {
    pub fn open<P: AsRef<Path>>(path: P, flush_mode: FlushMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        provision::ensure_queue_dir(&path)?;

        let mut file = DataFile::open(stack_file_path(&path))?;
        let mut frames = Vec::new();
        let outcome = recovery::repair_tail(&mut file, 0, LAYOUT, |offset| frames.push(offset))?;

        info!(
            path = ?path,
            pending = outcome.records,
            corrupt = outcome.corrupt,
            "LIFO disk store opened"
        );
        Ok(Self {
            path,
            flush_mode,
            file: Some(file),
            frames,
        })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn file(&mut self) -> Result<&mut DataFile> { self.file.as_mut().context(ClosedSnafu) }

    /// Read the top record and the offset it starts at.
    fn read_top(&mut self) -> Result<Option<(Bytes, u64)>> {
        let top = self.frames.last().copied();
        let file = self.file()?;
        let Some(start) = top else {
            return Ok(None);
        };
        let (payload, _) = LAYOUT.read_at(file, start)?;
        Ok(Some((payload, start)))
    }

    /// Cut the top frame off the file.
    fn truncate_top(&mut self, start: u64) -> Result<()> {
        let flush_mode = self.flush_mode;
        let file = self.file()?;
        file.truncate(start)?;
        file.maybe_sync(flush_mode)?;
        self.frames.pop();
        Ok(())
    }
}

impl BackingStore for LifoDiskStore {
    fn push(&mut self, data: Bytes) -> Result<()> {
        let flush_mode = self.flush_mode;
        let file = self.file()?;
        let frame = LAYOUT.encode(&data)?;
        let offset = file.append(&frame)?;
        file.maybe_sync(flush_mode)?;
        self.frames.push(offset);
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Bytes>> {
        let Some((payload, start)) = self.read_top()? else {
            return Ok(None);
        };
        self.truncate_top(start)?;
        Ok(Some(payload))
    }

    fn peek(&mut self) -> Result<Option<Bytes>> {
        Ok(self.read_top()?.map(|(payload, _)| payload))
    }

    fn discard_next(&mut self) -> Result<bool> {
        let top = self.frames.last().copied();
        self.file()?;
        let Some(start) = top else {
            return Ok(false);
        };
        warn!(path = ?self.path, offset = start, "Discarding top record");
        self.truncate_top(start)?;
        Ok(true)
    }

    fn len(&self) -> u64 { self.frames.len() as u64 }

    fn close(&mut self) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.sync()?;
        self.file = None;

        if self.frames.is_empty() {
            let stack = stack_file_path(&self.path);
            fs::remove_file(&stack).context(IoSnafu { path: stack })?;
            let is_empty = fs::read_dir(&self.path)
                .context(IoSnafu { path: &self.path })?
                .next()
                .is_none();
            if is_empty {
                fs::remove_dir(&self.path).context(IoSnafu { path: &self.path })?;
            }
        }

        info!(path = ?self.path, pending = self.len(), "LIFO disk store closed");
        Ok(())
    }
}

impl Drop for LifoDiskStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = ?self.path, error = %e, "Failed to close LIFO disk store");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::QueueError;

    fn item(i: usize) -> Bytes { Bytes::from(format!("http://example.com/{i}")) }

    #[test]
    fn test_push_pop_reversed() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = LifoDiskStore::open(temp_dir.path().join("q"), FlushMode::Async).unwrap();

        for i in 0..5 {
            store.push(item(i)).unwrap();
        }
        assert_eq!(store.len(), 5);
        assert_eq!(store.peek().unwrap(), Some(item(4)));
        for i in (0..5).rev() {
            assert_eq!(store.pop().unwrap(), Some(item(i)));
        }
        assert_eq!(store.pop().unwrap(), None);
        assert_eq!(store.peek().unwrap(), None);
    }

    #[test]
    fn test_interleaved_push_pop() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = LifoDiskStore::open(temp_dir.path().join("q"), FlushMode::Sync).unwrap();

        store.push(item(1)).unwrap();
        store.push(item(2)).unwrap();
        assert_eq!(store.pop().unwrap(), Some(item(2)));
        store.push(item(3)).unwrap();
        assert_eq!(store.pop().unwrap(), Some(item(3)));
        assert_eq!(store.pop().unwrap(), Some(item(1)));
    }

    #[test]
    fn test_reopen_continues_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("q");

        {
            let mut store = LifoDiskStore::open(&path, FlushMode::Async).unwrap();
            store.push(item(1)).unwrap();
            store.push(item(2)).unwrap();
            store.close().unwrap();
        }

        let mut store = LifoDiskStore::open(&path, FlushMode::Async).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.pop().unwrap(), Some(item(2)));
        assert_eq!(store.pop().unwrap(), Some(item(1)));
    }

    #[test]
    fn test_torn_tail_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("q");

        {
            let mut store = LifoDiskStore::open(&path, FlushMode::Async).unwrap();
            store.push(item(1)).unwrap();
            store.close().unwrap();
        }

        let stack = stack_file_path(&path);
        let frame = LAYOUT.encode(&item(2)).unwrap();
        let mut bytes = fs::read(&stack).unwrap();
        bytes.extend_from_slice(&frame[..frame.len() - 2]);
        fs::write(&stack, &bytes).unwrap();

        let mut store = LifoDiskStore::open(&path, FlushMode::Async).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.pop().unwrap(), Some(item(1)));
    }

    /// Flip one payload byte of the frame starting at `offset`.
    fn corrupt_frame_at(path: &Path, offset: usize) {
        let stack = stack_file_path(path);
        let mut bytes = fs::read(&stack).unwrap();
        bytes[offset + 4] ^= 0xFF;
        fs::write(&stack, &bytes).unwrap();
    }

    #[test]
    fn test_corrupt_bottom_record_keeps_the_rest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("q");

        {
            let mut store = LifoDiskStore::open(&path, FlushMode::Async).unwrap();
            for i in 1..=3 {
                store.push(item(i)).unwrap();
            }
            store.close().unwrap();
        }
        corrupt_frame_at(&path, 0);

        let mut store = LifoDiskStore::open(&path, FlushMode::Async).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.pop().unwrap(), Some(item(3)));
        assert_eq!(store.pop().unwrap(), Some(item(2)));
        assert!(matches!(
            store.pop(),
            Err(QueueError::CorruptedRecord { offset: 0, .. })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_discard_next_drops_corrupt_top() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("q");

        {
            let mut store = LifoDiskStore::open(&path, FlushMode::Async).unwrap();
            store.push(item(1)).unwrap();
            store.push(item(2)).unwrap();
            store.close().unwrap();
        }
        let bottom_size = LAYOUT.frame_size(item(1).len());
        corrupt_frame_at(&path, bottom_size);

        let mut store = LifoDiskStore::open(&path, FlushMode::Async).unwrap();
        assert!(matches!(store.peek(), Err(QueueError::CorruptedRecord { .. })));
        assert!(store.discard_next().unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.pop().unwrap(), Some(item(1)));
        assert!(!store.discard_next().unwrap());
    }

    #[test]
    fn test_close_empty_queue_removes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("q");

        let mut store = LifoDiskStore::open(&path, FlushMode::Async).unwrap();
        store.push(item(1)).unwrap();
        store.pop().unwrap();
        store.close().unwrap();
        store.close().unwrap();

        assert!(!path.exists());
        assert!(matches!(store.peek(), Err(QueueError::Closed { .. })));
    }
}
