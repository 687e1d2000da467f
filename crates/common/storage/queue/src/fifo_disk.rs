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

//! Durable FIFO store.
//!
//! ## Layout
//!
//! ```text
//! {path}/
//! ├── chunk-00000003.data   <- head chunk, partially consumed
//! ├── chunk-00000004.data
//! ├── chunk-00000005.data   <- tail chunk, receives pushes
//! ├── manifest.1
//! └── manifest.2
//! ```
//!
//! Every chunk holds at most `chunk_size` records. Pushes append to the tail
//! chunk and roll to a new one when it is full; pops read at the head cursor
//! and delete a chunk once all of its records are consumed.
//!
//! The manifest is written on every pop, on roll and on close. Pushes are not
//! recorded in it: on open the tail chunk is scanned forward from the
//! manifest's tail cursor, which recovers records appended since the last
//! manifest write and cuts off a torn final record.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use snafu::{OptionExt, ResultExt};
use tracing::{debug, info, warn};

use crate::{
    BackingStore, FlushMode, Result,
    error::{ClosedSnafu, CorruptedRecordSnafu, IoSnafu},
    file::DataFile,
    frame::{FrameLayout, FrameStatus},
    manifest::{ChunkCursor, Manifest},
    manifest_writer::ManifestWriter,
    path::{chunk_file_path, scan_chunk_files},
    provision, recovery,
};

pub struct FifoDiskStore {
    path:            PathBuf,
    flush_mode:      FlushMode,
    /// Head, tail and chunk size; persisted as the manifest.
    state:           Manifest,
    manifest_writer: ManifestWriter,
    /// Open tail chunk. `None` once closed.
    tail_file:       Option<DataFile>,
    /// Open head chunk when it differs from the tail chunk.
    head_file:       Option<(u64, DataFile)>,
    /// Fully consumed chunks, deleted after the next manifest write.
    consumed:        Vec<u64>,
}

impl FifoDiskStore {
    /// Open (or create) the queue directory at `path`.
    ///
    /// `chunk_size` only applies to a new queue; an existing one keeps the
    /// size recorded in its manifest.
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: u32, flush_mode: FlushMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        provision::ensure_queue_dir(&path)?;

        let mut manifest_writer = ManifestWriter::new(&path);
        let mut state = match manifest_writer.read_latest()? {
            Some(manifest) => {
                if manifest.chunk_size != chunk_size {
                    debug!(
                        recorded = manifest.chunk_size,
                        requested = chunk_size,
                        "Keeping chunk size recorded in manifest"
                    );
                }
                manifest
            }
            None => {
                let first = scan_chunk_files(&path)?.first().copied().unwrap_or(0);
                Manifest {
                    head: ChunkCursor::start_of(first),
                    tail: ChunkCursor::start_of(first),
                    ..Manifest::new(chunk_size.max(1))
                }
            }
        };

        let tail_file = recover_tail(&path, &mut state)?;
        let consumed = scan_chunk_files(&path)?
            .into_iter()
            .filter(|chunk| *chunk < state.head.chunk)
            .collect();

        let mut store = Self {
            path,
            flush_mode,
            state,
            manifest_writer,
            tail_file: Some(tail_file),
            head_file: None,
            consumed,
        };
        store.write_manifest(true)?;
        store.purge_consumed()?;

        info!(
            path = ?store.path,
            pending = store.state.pending(),
            head_chunk = store.state.head.chunk,
            tail_chunk = store.state.tail.chunk,
            "FIFO disk store opened"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path { &self.path }

    pub const fn chunk_size(&self) -> u32 { self.state.chunk_size }

    fn tail_file(&mut self) -> Result<&mut DataFile> { self.tail_file.as_mut().context(ClosedSnafu) }

    fn ensure_open(&self) -> Result<()> {
        self.tail_file.as_ref().map(|_| ()).context(ClosedSnafu)
    }

    /// The file the head cursor points into.
    fn head_reader(&mut self) -> Result<&mut DataFile> {
        if self.state.head.chunk == self.state.tail.chunk {
            return self.tail_file();
        }
        let head_chunk = self.state.head.chunk;
        if self
            .head_file
            .as_ref()
            .is_none_or(|(chunk, _)| *chunk != head_chunk)
        {
            let file = DataFile::open(chunk_file_path(&self.path, head_chunk))?;
            self.head_file = Some((head_chunk, file));
        }
        self.head_file
            .as_mut()
            .map(|(_, file)| file)
            .context(ClosedSnafu)
    }

    /// Start a new tail chunk.
    fn roll(&mut self) -> Result<()> {
        let old_chunk = self.state.tail.chunk;
        let next_chunk = old_chunk + 1;
        self.tail_file()?.sync()?;

        let file = DataFile::open(chunk_file_path(&self.path, next_chunk))?;
        let old_file = self.tail_file.replace(file);
        if self.state.head.chunk == old_chunk {
            self.head_file = old_file.map(|file| (old_chunk, file));
        }
        self.state.tail = ChunkCursor::start_of(next_chunk);
        self.write_manifest(true)?;

        debug!(path = ?self.path, chunk = next_chunk, "Rolled to new chunk");
        Ok(())
    }

    /// Move the head past chunks whose records are all consumed.
    fn advance_head_if_exhausted(&mut self) {
        let exhausted = skip_exhausted_chunks(&mut self.state);
        self.release_chunks(exhausted);
    }

    /// Queue `chunks` for deletion and drop the head handle if it is one of
    /// them.
    fn release_chunks(&mut self, chunks: Vec<u64>) {
        if self
            .head_file
            .as_ref()
            .is_some_and(|(chunk, _)| chunks.contains(chunk))
        {
            self.head_file = None;
        }
        self.consumed.extend(chunks);
    }

    /// Move the head past a frame of `frame_size` bytes.
    ///
    /// The new head is persisted before it replaces the in-memory one, so a
    /// failed manifest write leaves the record pending.
    fn consume_head(&mut self, frame_size: u64) -> Result<()> {
        let mut next = self.state.clone();
        next.head.offset += frame_size;
        next.head.records += 1;
        let exhausted = skip_exhausted_chunks(&mut next);

        self.manifest_writer
            .write(&mut next, self.flush_mode == FlushMode::Sync)?;
        self.state = next;
        self.release_chunks(exhausted);

        // Leftover chunks are found again on the next open.
        if let Err(e) = self.purge_consumed() {
            warn!(path = ?self.path, error = %e, "Failed to delete consumed chunk");
        }
        Ok(())
    }

    fn purge_consumed(&mut self) -> Result<()> {
        for chunk in self.consumed.drain(..) {
            let path = chunk_file_path(&self.path, chunk);
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = ?path, "Deleted consumed chunk"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).context(IoSnafu { path }),
            }
        }
        Ok(())
    }

    fn write_manifest(&mut self, sync: bool) -> Result<()> {
        self.manifest_writer.write(&mut self.state, sync)
    }

    fn read_head(&mut self) -> Result<Option<(Bytes, u64)>> {
        self.ensure_open()?;
        self.advance_head_if_exhausted();
        if self.state.pending() == 0 {
            return Ok(None);
        }
        let offset = self.state.head.offset;
        let record = FrameLayout::Forward.read_at(self.head_reader()?, offset)?;
        Ok(Some(record))
    }

    /// Remove every file of an empty queue, and the directory if nothing else
    /// lives in it.
    fn remove_files(&self) -> Result<()> {
        for chunk in scan_chunk_files(&self.path)? {
            let path = chunk_file_path(&self.path, chunk);
            fs::remove_file(&path).context(IoSnafu { path })?;
        }
        self.manifest_writer.remove_all()?;

        let is_empty = fs::read_dir(&self.path)
            .context(IoSnafu { path: &self.path })?
            .next()
            .is_none();
        if is_empty {
            fs::remove_dir(&self.path).context(IoSnafu { path: &self.path })?;
        }
        Ok(())
    }
}

impl BackingStore for FifoDiskStore {
    fn push(&mut self, data: Bytes) -> Result<()> {
        self.ensure_open()?;
        let frame = FrameLayout::Forward.encode(&data)?;
        if self.state.tail.records >= self.state.chunk_size {
            self.roll()?;
        }

        let flush_mode = self.flush_mode;
        let file = self.tail_file()?;
        let offset = file.append(&frame)?;
        file.maybe_sync(flush_mode)?;

        self.state.tail.offset = offset + frame.len() as u64;
        self.state.tail.records += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Bytes>> {
        let Some((payload, frame_size)) = self.read_head()? else {
            return Ok(None);
        };
        self.consume_head(frame_size)?;
        Ok(Some(payload))
    }

    fn peek(&mut self) -> Result<Option<Bytes>> {
        Ok(self.read_head()?.map(|(payload, _)| payload))
    }

    fn discard_next(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.advance_head_if_exhausted();
        if self.state.pending() == 0 {
            return Ok(false);
        }

        let offset = self.state.head.offset;
        let file = self.head_reader()?;
        let frame_size = match FrameLayout::Forward.frame_at(file, offset)? {
            FrameStatus::Intact { size, .. } | FrameStatus::Corrupt { size } => size,
            FrameStatus::Incomplete => {
                return CorruptedRecordSnafu {
                    path: file.path(),
                    offset,
                }
                .fail();
            }
        };

        warn!(
            path = ?self.path,
            chunk = self.state.head.chunk,
            offset,
            "Discarding head record"
        );
        self.consume_head(frame_size)?;
        Ok(true)
    }

    fn len(&self) -> u64 { self.state.pending() }

    fn close(&mut self) -> Result<()> {
        let Some(tail_file) = self.tail_file.as_mut() else {
            return Ok(());
        };
        tail_file.sync()?;

        // Handles stay open until the close work has succeeded.
        let pending = self.state.pending();
        if pending == 0 {
            self.tail_file = None;
            self.head_file = None;
            self.consumed.clear();
            self.remove_files()?;
        } else {
            self.write_manifest(true)?;
            self.purge_consumed()?;
            self.tail_file = None;
            self.head_file = None;
        }

        info!(path = ?self.path, pending, "FIFO disk store closed");
        Ok(())
    }
}

impl Drop for FifoDiskStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = ?self.path, error = %e, "Failed to close FIFO disk store");
        }
    }
}

/// Step `state.head` past fully consumed chunks and return their numbers.
fn skip_exhausted_chunks(state: &mut Manifest) -> Vec<u64> {
    let mut exhausted = Vec::new();
    while state.head.chunk < state.tail.chunk && state.head.records >= state.chunk_size {
        exhausted.push(state.head.chunk);
        state.head = ChunkCursor::start_of(state.head.chunk + 1);
    }
    exhausted
}

/// Bring the tail cursor up to date with what is actually on disk and return
/// the open tail chunk.
fn recover_tail(path: &Path, state: &mut Manifest) -> Result<DataFile> {
    loop {
        let mut file = DataFile::open(chunk_file_path(path, state.tail.chunk))?;
        if state.tail.offset > file.len() {
            warn!(
                path = ?file.path(),
                recorded = state.tail.offset,
                file_size = file.len(),
                "Tail chunk is shorter than recorded, rescanning from start"
            );
            state.tail = ChunkCursor::start_of(state.tail.chunk);
        }

        let outcome =
            recovery::repair_tail(&mut file, state.tail.offset, FrameLayout::Forward, |_| {})?;
        if outcome.records > 0 {
            info!(
                path = ?file.path(),
                recovered = outcome.records,
                "Recovered records written after last manifest"
            );
        }
        state.tail.offset = outcome.end;
        state.tail.records = state
            .tail
            .records
            .saturating_add(u32::try_from(outcome.records).unwrap_or(u32::MAX));

        if state.head.chunk == state.tail.chunk && state.head.offset > state.tail.offset {
            state.head = state.tail;
        }

        let next = state.tail.chunk + 1;
        if state.tail.records < state.chunk_size || !chunk_file_path(path, next).exists() {
            return Ok(file);
        }
        state.tail = ChunkCursor::start_of(next);
    }
}
